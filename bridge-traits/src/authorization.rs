//! External Authorization Agent
//!
//! OAuth authorization happens outside the core: the host opens the provider's
//! consent page in a system browser (or custom tab), waits for the redirect and
//! hands the result back. This module defines the request the core produces,
//! the response the host returns, and the agent trait tying them together.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BridgeError, Result};

/// Authorization request ready to be dispatched to a browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// Provider identifier (e.g. `myanimelist`)
    pub provider: String,
    /// Fully built authorization URL including all query parameters
    pub url: String,
    /// Redirect URI the agent should wait for
    pub redirect_uri: String,
    /// Opaque CSRF state expected back in the redirect
    pub state: String,
}

/// Result of the external authorization step.
///
/// Mirrors the query parameters of an OAuth 2.0 redirect: either a `code`
/// (plus echoed `state`) or an `error` with optional description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl AuthorizationResponse {
    /// Successful response carrying an authorization code.
    pub fn with_code(code: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            state: Some(state.into()),
            ..Self::default()
        }
    }

    /// Error response as returned by the authorization server.
    pub fn with_error(error: impl Into<String>, description: Option<String>) -> Self {
        Self {
            error: Some(error.into()),
            error_description: description,
            ..Self::default()
        }
    }

    /// Parse the redirect URL the browser landed on.
    ///
    /// # Example
    ///
    /// ```
    /// use bridge_traits::authorization::AuthorizationResponse;
    ///
    /// let response = AuthorizationResponse::from_redirect_url(
    ///     "episync://callback?code=abc&state=xyz",
    /// ).unwrap();
    /// assert_eq!(response.code.as_deref(), Some("abc"));
    /// assert_eq!(response.state.as_deref(), Some("xyz"));
    /// ```
    pub fn from_redirect_url(redirect: &str) -> Result<Self> {
        let url = Url::parse(redirect).map_err(|e| {
            BridgeError::OperationFailed(format!("Invalid redirect URL: {}", e))
        })?;

        let mut response = Self::default();
        for (key, value) in url.query_pairs() {
            let value = value.into_owned();
            match key.as_ref() {
                "code" if !value.is_empty() => response.code = Some(value),
                "state" => response.state = Some(value),
                "error" => response.error = Some(value),
                "error_description" => response.error_description = Some(value),
                _ => {}
            }
        }
        Ok(response)
    }
}

/// Host-side agent that performs the interactive authorization step.
///
/// Implementations launch a browser for [`AuthorizationRequest::url`] and
/// resolve once the redirect to [`AuthorizationRequest::redirect_uri`] is
/// observed. User cancellation should be reported as
/// [`BridgeError::Cancelled`].
#[async_trait]
pub trait AuthorizationAgent: Send + Sync {
    /// Package/bundle identifier of the browser this agent will launch, if known.
    ///
    /// Used to enforce the browser denylist before dispatching a request.
    fn browser_package(&self) -> Option<String> {
        None
    }

    /// Run the interactive authorization and return the redirect result.
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<AuthorizationResponse>;
}
