//! Error types for the MyAnimeList provider

use bridge_traits::error::BridgeError;
use core_sync::SyncError;
use thiserror::Error;

/// MyAnimeList provider errors
#[derive(Error, Debug)]
pub enum MyAnimeListError {
    /// Access token missing, expired or revoked
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error
    #[error("MyAnimeList API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// List status outside the documented set
    #[error("Unknown list status: {0}")]
    UnknownStatus(String),

    /// Transport failure
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for MyAnimeList operations
pub type Result<T> = std::result::Result<T, MyAnimeListError>;

impl From<MyAnimeListError> for SyncError {
    fn from(error: MyAnimeListError) -> Self {
        match error {
            MyAnimeListError::UnknownStatus(status) => SyncError::UnknownStatus(status),
            other => SyncError::RemoteFetchFailed(other.to_string()),
        }
    }
}

impl From<MyAnimeListError> for BridgeError {
    fn from(error: MyAnimeListError) -> Self {
        match error {
            MyAnimeListError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
