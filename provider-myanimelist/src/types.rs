//! MyAnimeList API response types
//!
//! Only the fields the sync engine reads are modelled.

use crate::error::{MyAnimeListError, Result};
use core_sync::{RemoteTrackerEntry, RemoteViewer, TrackerStatus};
use serde::Deserialize;

/// Anime resource with the `my_list_status` field requested.
///
/// See: https://myanimelist.net/apiconfig/references/api/v2#operation/anime_anime_id_get
#[derive(Debug, Clone, Deserialize)]
pub struct AnimeNode {
    pub id: u64,

    pub title: String,

    /// Only present when requested through `fields`
    #[serde(default)]
    pub alternative_titles: Option<AlternativeTitles>,

    /// Absent when the anime is not on the user's list
    #[serde(default)]
    pub my_list_status: Option<MyListStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlternativeTitles {
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub en: String,
    #[serde(default)]
    pub ja: String,
}

/// The user's list entry for an anime.
#[derive(Debug, Clone, Deserialize)]
pub struct MyListStatus {
    pub status: String,

    #[serde(default)]
    pub num_episodes_watched: u32,

    #[serde(default)]
    pub is_rewatching: bool,
}

/// `GET /anime?q=` response
#[derive(Debug, Deserialize)]
pub struct AnimeSearchResponse {
    #[serde(default)]
    pub data: Vec<AnimeSearchItem>,
}

#[derive(Debug, Deserialize)]
pub struct AnimeSearchItem {
    pub node: AnimeNode,
}

/// `GET /users/@me` response
#[derive(Debug, Deserialize)]
pub struct UserResponse {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
}

impl From<UserResponse> for RemoteViewer {
    fn from(user: UserResponse) -> Self {
        RemoteViewer {
            id: user.id,
            name: user.name,
            avatar_url: user.picture,
        }
    }
}

/// Error body returned by the API
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl AnimeNode {
    /// Case-insensitive match against the main and alternative titles.
    pub fn matches_title(&self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let same = |candidate: &str| candidate.trim().eq_ignore_ascii_case(name);

        same(&self.title)
            || self.alternative_titles.as_ref().is_some_and(|alt| {
                same(&alt.en) || same(&alt.ja) || alt.synonyms.iter().any(|s| same(s))
            })
    }

    pub fn into_entry(self) -> Result<RemoteTrackerEntry> {
        match self.my_list_status {
            None => Ok(RemoteTrackerEntry::unlisted(self.id)),
            Some(list) => Ok(RemoteTrackerEntry {
                remote_id: self.id,
                watched_count: list.num_episodes_watched,
                status: parse_status(&list.status, list.is_rewatching)?,
            }),
        }
    }
}

/// Normalize a list status string (case-insensitive).
pub fn parse_status(status: &str, is_rewatching: bool) -> Result<TrackerStatus> {
    let normalized = status.trim().to_ascii_lowercase();
    let parsed = match normalized.as_str() {
        "watching" | "completed" if is_rewatching => TrackerStatus::Rewatching,
        "watching" => TrackerStatus::InProgress,
        "completed" => TrackerStatus::Completed,
        "on_hold" => TrackerStatus::Paused,
        "dropped" => TrackerStatus::Dropped,
        "plan_to_watch" => TrackerStatus::NotStarted,
        _ => return Err(MyAnimeListError::UnknownStatus(status.to_string())),
    };
    Ok(parsed)
}

/// Wire status and `is_rewatching` flag for an update.
pub fn status_to_wire(status: TrackerStatus) -> (&'static str, bool) {
    match status {
        TrackerStatus::NotStarted => ("plan_to_watch", false),
        TrackerStatus::InProgress => ("watching", false),
        TrackerStatus::Completed => ("completed", false),
        TrackerStatus::Rewatching => ("watching", true),
        TrackerStatus::Paused => ("on_hold", false),
        TrackerStatus::Dropped => ("dropped", false),
    }
}
