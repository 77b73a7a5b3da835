//! # Tracker Sync
//!
//! Reconciles local episode watch positions with the watched-episode count and
//! status stored on a remote anime tracker.
//!
//! ## Components
//!
//! - **Progress** (`progress`): per-episode watch position and the 90% rule
//! - **Remote model** (`remote`): normalized tracker entries and the
//!   [`RemoteTrackerClient`] seam implemented by provider crates
//! - **Reconciliation** (`reconcile`): decides push / pull / no-op and applies it
//! - **Orchestrator** (`orchestrator`): per-title entry point tying authorization,
//!   remote fetch and reconciliation together

pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod reconcile;
pub mod remote;

pub use error::{Result, SyncError};
pub use orchestrator::{SkipReason, SyncOrchestrator, SyncOutcome};
pub use progress::{episode_number_from_title, EpisodeProgress, WATCHED_THRESHOLD};
pub use reconcile::{ReconciliationEngine, SyncDecision};
pub use remote::{
    RemoteTrackerClient, RemoteTrackerEntry, RemoteViewer, TrackedTitle, TrackerStatus,
};
