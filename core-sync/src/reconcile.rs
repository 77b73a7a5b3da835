//! # Reconciliation Engine
//!
//! Decides which side of a local/remote pair is ahead and applies the
//! corresponding mutation.
//!
//! ## Rules
//!
//! 1. Count local episodes at or above the watched threshold.
//! 2. Local ahead: push the local count to the tracker. When every local
//!    episode is watched and this is the final season the status becomes
//!    `Completed` (an existing `Completed`/`Rewatching` is kept); otherwise the
//!    remote status is kept, with `NotStarted` promoted to `InProgress`.
//! 3. Remote ahead: mark the first `gap` unwatched local episodes (ascending
//!    ordinal) as fully watched.
//! 4. Equal: nothing to do.
//!
//! Progress only moves forward: a remote count is never lowered and a local
//! episode is never un-watched.

use crate::error::{Result, SyncError};
use crate::progress::EpisodeProgress;
use crate::remote::{RemoteTrackerClient, RemoteTrackerEntry, TrackedTitle, TrackerStatus};
use bridge_traits::progress::LocalProgressWriter;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Mutation chosen for one title/provider pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncDecision {
    NoOp,
    PushLocalToRemote {
        new_count: u32,
        new_status: TrackerStatus,
    },
    PullRemoteToLocal {
        /// Ordinals to mark, ascending
        episodes_to_mark_watched: Vec<u32>,
    },
}

impl SyncDecision {
    /// Short name used in events and logs.
    pub fn action(&self) -> &'static str {
        match self {
            SyncDecision::NoOp => "noop",
            SyncDecision::PushLocalToRemote { .. } => "push",
            SyncDecision::PullRemoteToLocal { .. } => "pull",
        }
    }

    /// Remote count written, or number of local episodes marked.
    pub fn affected(&self) -> u32 {
        match self {
            SyncDecision::NoOp => 0,
            SyncDecision::PushLocalToRemote { new_count, .. } => *new_count,
            SyncDecision::PullRemoteToLocal {
                episodes_to_mark_watched,
            } => episodes_to_mark_watched.len() as u32,
        }
    }
}

pub struct ReconciliationEngine {
    progress_writer: Arc<dyn LocalProgressWriter>,
}

impl ReconciliationEngine {
    pub fn new(progress_writer: Arc<dyn LocalProgressWriter>) -> Self {
        Self { progress_writer }
    }

    /// Pure decision for `local` against `remote`.
    pub fn decide(
        local: &[EpisodeProgress],
        is_final_season: bool,
        remote: &RemoteTrackerEntry,
    ) -> SyncDecision {
        let local_watched = local.iter().filter(|e| e.is_considered_watched()).count();
        let local_watched = u32::try_from(local_watched).unwrap_or(u32::MAX);

        if local_watched > remote.watched_count {
            let all_watched = local_watched as usize >= local.len();
            let new_status = if all_watched && is_final_season {
                if remote.status.is_finished() {
                    remote.status
                } else {
                    TrackerStatus::Completed
                }
            } else if remote.status == TrackerStatus::NotStarted {
                TrackerStatus::InProgress
            } else {
                remote.status
            };

            return SyncDecision::PushLocalToRemote {
                new_count: local_watched,
                new_status,
            };
        }

        if remote.watched_count > local_watched {
            let gap = (remote.watched_count - local_watched) as usize;
            let mut unwatched: Vec<u32> = local
                .iter()
                .filter(|e| !e.is_considered_watched())
                .map(|e| e.ordinal)
                .collect();
            unwatched.sort_unstable();
            unwatched.truncate(gap);

            if unwatched.is_empty() {
                return SyncDecision::NoOp;
            }
            return SyncDecision::PullRemoteToLocal {
                episodes_to_mark_watched: unwatched,
            };
        }

        SyncDecision::NoOp
    }

    /// Carry out `decision`.
    ///
    /// A push is exactly one remote write and is never retried here. A pull
    /// marks every episode concurrently and waits for all of them; writes that
    /// succeeded stay applied even when others fail.
    #[instrument(skip_all, fields(title = %title.name, action = decision.action()))]
    pub async fn apply(
        &self,
        decision: &SyncDecision,
        tracker: &dyn RemoteTrackerClient,
        access_token: &str,
        title: &TrackedTitle,
        remote: &RemoteTrackerEntry,
    ) -> Result<()> {
        match decision {
            SyncDecision::NoOp => {
                debug!(title = %title.name, "Already in sync");
                Ok(())
            }
            SyncDecision::PushLocalToRemote {
                new_count,
                new_status,
            } => {
                info!(
                    title = %title.name,
                    remote_id = remote.remote_id,
                    from = remote.watched_count,
                    to = new_count,
                    status = %new_status,
                    "Pushing local progress"
                );
                tracker
                    .write_entry(access_token, remote.remote_id, *new_count, *new_status)
                    .await
                    .map_err(|e| match e {
                        SyncError::RemoteWriteFailed(_) => e,
                        other => SyncError::RemoteWriteFailed(other.to_string()),
                    })
            }
            SyncDecision::PullRemoteToLocal {
                episodes_to_mark_watched,
            } => self.mark_watched(&title.series_id, episodes_to_mark_watched).await,
        }
    }

    async fn mark_watched(&self, series_id: &str, ordinals: &[u32]) -> Result<()> {
        info!(series = series_id, episodes = ?ordinals, "Pulling remote progress");

        let writes = ordinals.iter().map(|&ordinal| async move {
            let result = self
                .progress_writer
                .mark_fully_watched(series_id, ordinal)
                .await;
            (ordinal, result)
        });

        let mut written = Vec::new();
        let mut failed = Vec::new();
        let mut last_error = None;
        for (ordinal, result) in join_all(writes).await {
            match result {
                Ok(()) => written.push(ordinal),
                Err(e) => {
                    warn!(series = series_id, ordinal, error = %e, "Failed to mark episode watched");
                    failed.push(ordinal);
                    last_error = Some(e.to_string());
                }
            }
        }

        let Some(message) = last_error else {
            return Ok(());
        };
        if written.is_empty() {
            Err(SyncError::LocalWriteFailed { failed, message })
        } else {
            Err(SyncError::PartialLocalWriteFailure {
                written,
                failed,
                message,
            })
        }
    }
}
