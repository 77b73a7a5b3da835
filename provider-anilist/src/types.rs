//! AniList GraphQL types
//!
//! Queries, variables and response shapes for media lookup, list updates and
//! the authenticated viewer.

use crate::error::{AniListError, Result};
use core_sync::{RemoteTrackerEntry, RemoteViewer, TrackerStatus};
use serde::{Deserialize, Serialize};

/// Media lookup with the viewer's list entry. Either `id` or `search` is set.
pub const MEDIA_QUERY: &str = "query ($id: Int, $search: String) { \
Media(id: $id, search: $search, type: ANIME) { id title { romaji english } \
mediaListEntry { id progress status } } }";

pub const SAVE_ENTRY_MUTATION: &str = "mutation ($mediaId: Int, $progress: Int, $status: MediaListStatus) { \
SaveMediaListEntry(mediaId: $mediaId, progress: $progress, status: $status) { id progress status } }";

pub const VIEWER_QUERY: &str = "query { Viewer { id name avatar { medium } } }";

/// Request body posted to the GraphQL endpoint
#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a, V: Serialize> {
    pub query: &'a str,
    pub variables: V,
}

#[derive(Debug, Serialize)]
pub struct MediaVariables<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<&'a str>,
}

/// Serializes as `{}` for queries without variables
#[derive(Debug, Serialize)]
pub struct NoVariables {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEntryVariables {
    pub media_id: u64,
    pub progress: u32,
    pub status: &'static str,
}

/// Response envelope; `data` may be partially null alongside `errors`.
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub status: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct MediaData {
    #[serde(rename = "Media")]
    pub media: Option<Media>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: u64,
    #[serde(default)]
    pub title: Option<MediaTitle>,
    #[serde(default)]
    pub media_list_entry: Option<MediaListEntry>,
}

#[derive(Debug, Deserialize)]
pub struct MediaTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MediaListEntry {
    #[serde(default)]
    pub progress: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveEntryData {
    #[serde(rename = "SaveMediaListEntry")]
    pub saved: Option<SavedEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SavedEntry {
    pub id: u64,
    #[serde(default)]
    pub progress: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ViewerData {
    #[serde(rename = "Viewer")]
    pub viewer: Option<Viewer>,
}

#[derive(Debug, Deserialize)]
pub struct Viewer {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<ViewerAvatar>,
}

#[derive(Debug, Deserialize)]
pub struct ViewerAvatar {
    #[serde(default)]
    pub medium: Option<String>,
}

impl From<Viewer> for RemoteViewer {
    fn from(viewer: Viewer) -> Self {
        RemoteViewer {
            id: viewer.id,
            name: viewer.name,
            avatar_url: viewer.avatar.and_then(|avatar| avatar.medium),
        }
    }
}

impl Media {
    pub fn into_entry(self) -> Result<RemoteTrackerEntry> {
        let Some(list) = self.media_list_entry else {
            return Ok(RemoteTrackerEntry::unlisted(self.id));
        };
        let status = match list.status.as_deref() {
            Some(status) => parse_status(status)?,
            None => TrackerStatus::NotStarted,
        };
        Ok(RemoteTrackerEntry {
            remote_id: self.id,
            watched_count: list.progress.unwrap_or(0),
            status,
        })
    }
}

/// Normalize a `MediaListStatus` value (case-insensitive).
pub fn parse_status(status: &str) -> Result<TrackerStatus> {
    let parsed = match status.trim().to_ascii_uppercase().as_str() {
        "CURRENT" => TrackerStatus::InProgress,
        "COMPLETED" => TrackerStatus::Completed,
        "REPEATING" => TrackerStatus::Rewatching,
        "PAUSED" => TrackerStatus::Paused,
        "DROPPED" => TrackerStatus::Dropped,
        "PLANNING" => TrackerStatus::NotStarted,
        _ => return Err(AniListError::UnknownStatus(status.to_string())),
    };
    Ok(parsed)
}

pub fn status_to_wire(status: TrackerStatus) -> &'static str {
    match status {
        TrackerStatus::NotStarted => "PLANNING",
        TrackerStatus::InProgress => "CURRENT",
        TrackerStatus::Completed => "COMPLETED",
        TrackerStatus::Rewatching => "REPEATING",
        TrackerStatus::Paused => "PAUSED",
        TrackerStatus::Dropped => "DROPPED",
    }
}
