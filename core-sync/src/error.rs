use core_auth::AuthError;
use thiserror::Error;

/// Failures of a single title/provider reconciliation.
///
/// `Clone` so outcomes can be both returned and published as events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Title {title} is not tracked on {provider}")]
    NotTracked { provider: String, title: String },

    #[error("Failed to fetch remote entry: {0}")]
    RemoteFetchFailed(String),

    #[error("Failed to write remote entry: {0}")]
    RemoteWriteFailed(String),

    #[error("Failed to mark episodes {failed:?} as watched: {message}")]
    LocalWriteFailed { failed: Vec<u32>, message: String },

    #[error("Marked episodes {written:?} as watched but episodes {failed:?} failed: {message}")]
    PartialLocalWriteFailure {
        written: Vec<u32>,
        failed: Vec<u32>,
        message: String,
    },

    #[error("Unknown tracker status: {0}")]
    UnknownStatus(String),

    #[error("Provider {0} is not configured")]
    NotConfigured(String),

    #[error("Authorization error: {0}")]
    Auth(#[from] AuthError),
}

impl SyncError {
    /// Whether re-running the same sync later may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SyncError::RemoteFetchFailed(_)
            | SyncError::RemoteWriteFailed(_)
            | SyncError::LocalWriteFailed { .. }
            | SyncError::PartialLocalWriteFailure { .. } => true,
            SyncError::Auth(e) => e.is_recoverable(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
