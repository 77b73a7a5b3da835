//! Error types for the AniList provider

use bridge_traits::error::BridgeError;
use core_sync::SyncError;
use thiserror::Error;

/// AniList provider errors
#[derive(Error, Debug)]
pub enum AniListError {
    /// Access token missing, expired or revoked
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// HTTP-level failure
    #[error("AniList API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// The response carried a GraphQL `errors` array
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after_seconds} seconds")]
    RateLimitExceeded { retry_after_seconds: u64 },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// `MediaListStatus` outside the documented set
    #[error("Unknown list status: {0}")]
    UnknownStatus(String),

    /// Transport failure
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for AniList operations
pub type Result<T> = std::result::Result<T, AniListError>;

impl From<AniListError> for SyncError {
    fn from(error: AniListError) -> Self {
        match error {
            AniListError::UnknownStatus(status) => SyncError::UnknownStatus(status),
            other => SyncError::RemoteFetchFailed(other.to_string()),
        }
    }
}

impl From<AniListError> for BridgeError {
    fn from(error: AniListError) -> Self {
        match error {
            AniListError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = AniListError::RateLimitExceeded {
            retry_after_seconds: 60,
        };
        assert_eq!(
            error.to_string(),
            "Rate limit exceeded, retry after 60 seconds"
        );
    }

    #[test]
    fn test_sync_conversion() {
        let error: SyncError = AniListError::GraphQl("Invalid token".to_string()).into();
        assert!(matches!(error, SyncError::RemoteFetchFailed(_)));
    }
}
