//! Remote tracker model and client seam.
//!
//! Provider crates translate their wire formats into [`RemoteTrackerEntry`]
//! and normalize status strings into [`TrackerStatus`] before anything reaches
//! the reconciliation engine.

use crate::error::Result;
use async_trait::async_trait;
use core_auth::ProviderKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Watch-list status, normalized across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackerStatus {
    NotStarted,
    InProgress,
    Completed,
    Rewatching,
    Paused,
    Dropped,
}

impl TrackerStatus {
    /// Statuses that already reflect a finished series.
    pub fn is_finished(&self) -> bool {
        matches!(self, TrackerStatus::Completed | TrackerStatus::Rewatching)
    }
}

impl fmt::Display for TrackerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackerStatus::NotStarted => "not_started",
            TrackerStatus::InProgress => "in_progress",
            TrackerStatus::Completed => "completed",
            TrackerStatus::Rewatching => "rewatching",
            TrackerStatus::Paused => "paused",
            TrackerStatus::Dropped => "dropped",
        };
        f.write_str(name)
    }
}

/// A title's entry on a remote tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTrackerEntry {
    /// Provider-side media id
    pub remote_id: u64,
    pub watched_count: u32,
    pub status: TrackerStatus,
}

impl RemoteTrackerEntry {
    /// Media known to the tracker but absent from the user's list.
    pub fn unlisted(remote_id: u64) -> Self {
        Self {
            remote_id,
            watched_count: 0,
            status: TrackerStatus::NotStarted,
        }
    }
}

/// Account the access token belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteViewer {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Local series being synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedTitle {
    /// Host identifier of the series, handed back to the progress writer
    pub series_id: String,
    /// Display title used for remote search
    pub name: String,
    /// Known MyAnimeList media id, skips the title search
    #[serde(default)]
    pub myanimelist_id: Option<u64>,
    /// Known AniList media id, skips the title search
    #[serde(default)]
    pub anilist_id: Option<u64>,
}

impl TrackedTitle {
    pub fn new(series_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            series_id: series_id.into(),
            name: name.into(),
            myanimelist_id: None,
            anilist_id: None,
        }
    }

    pub fn with_myanimelist_id(mut self, id: u64) -> Self {
        self.myanimelist_id = Some(id);
        self
    }

    pub fn with_anilist_id(mut self, id: u64) -> Self {
        self.anilist_id = Some(id);
        self
    }

    /// Media id already known for `provider`.
    pub fn remote_id(&self, provider: ProviderKind) -> Option<u64> {
        match provider {
            ProviderKind::MyAnimeList => self.myanimelist_id,
            ProviderKind::AniList => self.anilist_id,
        }
    }
}

/// Reads and writes a user's watch-list entries on one tracker.
///
/// Implementations must not retry writes on their own; the caller decides.
#[async_trait]
pub trait RemoteTrackerClient: Send + Sync {
    fn provider(&self) -> ProviderKind;

    /// Look up `title`. `Ok(None)` when the tracker does not know the media.
    async fn fetch_entry(
        &self,
        access_token: &str,
        title: &TrackedTitle,
    ) -> Result<Option<RemoteTrackerEntry>>;

    /// Set the watched count and status of `remote_id` in the user's list.
    async fn write_entry(
        &self,
        access_token: &str,
        remote_id: u64,
        watched_count: u32,
        status: TrackerStatus,
    ) -> Result<()>;

    /// Profile of the authenticated user.
    async fn fetch_viewer(&self, access_token: &str) -> Result<RemoteViewer>;
}
