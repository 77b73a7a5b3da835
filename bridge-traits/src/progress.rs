//! Local Progress Persistence
//!
//! The host owns the episode records; the sync engine only needs to flag an
//! episode as fully watched when a remote tracker is ahead of the device.

use async_trait::async_trait;

use crate::error::Result;

/// Writes watch progress back into the host's episode storage.
///
/// Writes must be idempotent: marking an already fully-watched episode again
/// leaves it unchanged.
#[async_trait]
pub trait LocalProgressWriter: Send + Sync {
    /// Mark the episode with the given ordinal of `series` as fully watched.
    ///
    /// `series` is the host's own key for the title being synced. Hosts usually
    /// store the "fully watched" sentinel (`i64::MAX`) in both the position and
    /// duration fields.
    async fn mark_fully_watched(&self, series: &str, episode_ordinal: u32) -> Result<()>;
}
