//! Local episode watch progress.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Fraction of an episode that must be played for it to count as watched.
pub const WATCHED_THRESHOLD: f64 = 0.90;

/// Watch position of one local episode.
///
/// Positions are milliseconds. A fully watched episode carries `i64::MAX` in
/// both fields, which reads as 100% regardless of the real duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeProgress {
    /// 1-based position of the episode within its season
    pub ordinal: u32,
    pub current_position_ms: i64,
    pub total_duration_ms: i64,
}

impl EpisodeProgress {
    pub fn new(ordinal: u32, current_position_ms: i64, total_duration_ms: i64) -> Self {
        Self {
            ordinal,
            current_position_ms,
            total_duration_ms,
        }
    }

    /// Episode that has never been played.
    pub fn unwatched(ordinal: u32) -> Self {
        Self::new(ordinal, 0, 0)
    }

    /// Played fraction in `[0.0, 1.0]`.
    ///
    /// Zero when either field is unset; a position past the end counts as
    /// fully played.
    pub fn watched_fraction(&self) -> f64 {
        if self.current_position_ms <= 0 || self.total_duration_ms <= 0 {
            return 0.0;
        }
        if self.current_position_ms > self.total_duration_ms {
            return 1.0;
        }
        (self.current_position_ms as f64 / self.total_duration_ms as f64).clamp(0.0, 1.0)
    }

    pub fn is_considered_watched(&self) -> bool {
        self.watched_fraction() >= WATCHED_THRESHOLD
    }

    pub fn mark_fully_watched(&mut self) {
        self.current_position_ms = i64::MAX;
        self.total_duration_ms = i64::MAX;
    }
}

/// `| Episode 12 |`, `(Ep. 3)`, `{ep4}` and friends.
static EPISODE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[|({]\s*Ep(?:\.|isode)?\s*(\d+)\s*[|)}]")
        .expect("episode marker pattern should compile")
});

/// Episode number for a listing entry.
///
/// Looks for an episode marker in the title first, then falls back to the
/// list number (or the digits in it).
pub fn episode_number_from_title(title: &str, list_number: &str) -> Option<u32> {
    EPISODE_MARKER
        .captures(title)
        .and_then(|captures| captures.get(1))
        .and_then(|number| number.as_str().parse::<u32>().ok())
        .or_else(|| parse_list_number(list_number))
}

fn parse_list_number(list_number: &str) -> Option<u32> {
    let trimmed = list_number.trim();
    trimmed.parse::<u32>().ok().or_else(|| {
        let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
        digits.parse::<u32>().ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watched_fraction_edges() {
        assert_eq!(EpisodeProgress::new(1, 0, 1000).watched_fraction(), 0.0);
        assert_eq!(EpisodeProgress::new(1, 500, 0).watched_fraction(), 0.0);
        assert_eq!(EpisodeProgress::new(1, 1500, 1000).watched_fraction(), 1.0);
        assert_eq!(EpisodeProgress::new(1, 250, 1000).watched_fraction(), 0.25);
    }

    #[test]
    fn test_ninety_percent_threshold() {
        assert!(EpisodeProgress::new(1, 900, 1000).is_considered_watched());
        assert!(!EpisodeProgress::new(1, 899, 1000).is_considered_watched());
    }

    #[test]
    fn test_mark_fully_watched_uses_sentinel() {
        let mut episode = EpisodeProgress::unwatched(3);
        assert!(!episode.is_considered_watched());

        episode.mark_fully_watched();

        assert_eq!(episode.current_position_ms, i64::MAX);
        assert_eq!(episode.total_duration_ms, i64::MAX);
        assert_eq!(episode.watched_fraction(), 1.0);
        assert!(episode.is_considered_watched());
    }

    #[test]
    fn test_episode_marker_variants() {
        assert_eq!(episode_number_from_title("Some Show | Episode 12 |", "1"), Some(12));
        assert_eq!(episode_number_from_title("Some Show (Ep. 3)", "1"), Some(3));
        assert_eq!(episode_number_from_title("Some Show {ep4}", "1"), Some(4));
        assert_eq!(episode_number_from_title("Some Show ( EPISODE  7 )", "1"), Some(7));
        assert_eq!(episode_number_from_title("Some Show |EP.10|", "1"), Some(10));
        // "Epilogue" is not a marker
        assert_eq!(episode_number_from_title("Some Show (Epilogue 2)", "4"), Some(4));
    }

    #[test]
    fn test_episode_number_falls_back_to_list_number() {
        assert_eq!(episode_number_from_title("Some Show", "5"), Some(5));
        assert_eq!(episode_number_from_title("Some Show (Ep. 3", "#06"), Some(6));
        assert_eq!(episode_number_from_title("Episode 9", "x"), None);
    }

    #[test]
    fn test_unclosed_marker_is_skipped_for_later_one() {
        assert_eq!(
            episode_number_from_title("Recap (Ep 1 of season) | Ep 2 |", "0"),
            Some(2)
        );
    }
}
