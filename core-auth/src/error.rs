use thiserror::Error;

/// Failures of the authorization and token lifecycle.
///
/// Errors are `Clone` so a single refresh result can be handed to every
/// caller waiting on the same in-flight request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization denied by {provider}: {reason}")]
    AuthorizationDenied { provider: String, reason: String },

    #[error("OAuth state mismatch: expected {expected}, got {actual}")]
    StateMismatch { expected: String, actual: String },

    #[error("No authorization is pending")]
    NoAuthorizationPending,

    #[error("Browser {0} is not allowed for authorization")]
    BrowserDenied(String),

    #[error("Authorization cancelled")]
    Cancelled,

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// The token endpoint answered `invalid_grant`; the refresh token is dead.
    #[error("Refresh token rejected: {0}")]
    RefreshRejected(String),

    #[error("Not authorized")]
    Unauthorized,

    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AuthError {
    /// Stable identifier recorded in the persisted `last_error`.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::AuthorizationDenied { .. } => "AuthorizationDenied",
            AuthError::StateMismatch { .. } => "StateMismatch",
            AuthError::NoAuthorizationPending => "NoAuthorizationPending",
            AuthError::BrowserDenied(_) => "BrowserDenied",
            AuthError::Cancelled => "Cancelled",
            AuthError::TokenExchangeFailed(_) => "TokenExchangeFailed",
            AuthError::RefreshFailed(_) => "RefreshFailed",
            AuthError::RefreshRejected(_) => "RefreshRejected",
            AuthError::Unauthorized => "Unauthorized",
            AuthError::Storage(_) => "Storage",
            AuthError::Serialization(_) => "Serialization",
            AuthError::InvalidConfig(_) => "InvalidConfig",
        }
    }

    /// Whether a later retry may succeed without user interaction.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AuthError::RefreshFailed(_) | AuthError::TokenExchangeFailed(_) | AuthError::Storage(_)
        )
    }

    /// The token could not be obtained through the refresh grant.
    pub fn is_refresh_failure(&self) -> bool {
        matches!(
            self,
            AuthError::RefreshFailed(_) | AuthError::RefreshRejected(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
