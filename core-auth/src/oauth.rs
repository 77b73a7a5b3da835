//! OAuth 2.0 Authorization Client with PKCE Support
//!
//! Implements the provider-facing half of RFC 6749 (OAuth 2.0) and RFC 7636
//! (PKCE) for the supported trackers.
//!
//! # Overview
//!
//! [`ProviderAuthClient`] handles:
//! - Building authorization requests (with a PKCE challenge when configured)
//! - Exchanging authorization codes for tokens
//! - Refreshing access tokens, retrying transient server failures
//!
//! Provider differences are driven entirely by [`ProviderConfig`]:
//! MyAnimeList uses PKCE with the `plain` method and sends its client id in the
//! request body; AniList authenticates at the token endpoint with
//! client-secret-basic.
//!
//! # Security
//!
//! - Code verifier and CSRF state are generated from a CSPRNG
//! - Codes, verifiers and tokens are never logged

use crate::error::{AuthError, Result};
use crate::types::{OAuthTokens, ProviderKind};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use bridge_traits::authorization::AuthorizationRequest;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::time::Clock;
use bytes::Bytes;
use core_runtime::config::{CodeChallengeMethod, ProviderConfig};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// PKCE code verifier plus CSRF state for one authorization attempt.
///
/// # Security
///
/// The verifier must never reach the authorization endpoint; only the
/// challenge derived from it is sent there.
#[derive(Clone)]
pub struct PkceVerifier {
    verifier: String,
    state: String,
}

impl PkceVerifier {
    /// Generate a 32-byte verifier (43 base64url chars, within the 43-128
    /// range of RFC 7636) and a 16-byte state.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        let mut verifier_bytes = [0u8; 32];
        rng.fill(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill(&mut state_bytes);
        let state = URL_SAFE_NO_PAD.encode(state_bytes);

        Self { verifier, state }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// Compute the code challenge for `method`.
    ///
    /// `plain` sends the verifier itself; `S256` sends
    /// BASE64URL(SHA256(code_verifier)).
    pub fn challenge(&self, method: CodeChallengeMethod) -> String {
        match method {
            CodeChallengeMethod::Plain => self.verifier.clone(),
            CodeChallengeMethod::S256 => {
                let mut hasher = Sha256::new();
                hasher.update(self.verifier.as_bytes());
                URL_SAFE_NO_PAD.encode(hasher.finalize())
            }
        }
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PkceVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkceVerifier")
            .field("verifier", &"[REDACTED]")
            .field("state", &self.state)
            .finish()
    }
}

/// An authorization request that has been handed out and not yet completed.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pkce: PkceVerifier,
    uses_pkce: bool,
}

impl PendingAuthorization {
    /// CSRF state the redirect must echo back.
    pub fn state(&self) -> &str {
        self.pkce.state()
    }

    /// Code verifier to send with the exchange, if PKCE is in use.
    pub fn code_verifier(&self) -> Option<&str> {
        self.uses_pkce.then(|| self.pkce.verifier())
    }
}

/// Provider-specific OAuth client.
///
/// Stateless apart from configuration: the authorization state machine owns
/// tokens and pending requests.
pub struct ProviderAuthClient {
    provider: ProviderKind,
    config: ProviderConfig,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    retry_policy: RetryPolicy,
}

impl ProviderAuthClient {
    pub fn new(
        provider: ProviderKind,
        config: ProviderConfig,
        http_client: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            config,
            http_client,
            clock,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Override the retry policy used for token refresh.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Build the authorization request the host should open in a browser.
    ///
    /// Returns the request plus the pending authorization that must be kept
    /// until the redirect comes back.
    #[instrument(skip(self), fields(provider = %self.provider))]
    pub fn build_authorization_request(
        &self,
    ) -> Result<(AuthorizationRequest, PendingAuthorization)> {
        let pkce = PkceVerifier::new();

        let mut url = Url::parse(&self.config.authorization_endpoint)
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid authorization URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", &self.config.response_type);
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("redirect_uri", &self.config.redirect_uri);
            query.append_pair("state", pkce.state());
            if !self.config.scopes.is_empty() {
                query.append_pair("scope", &self.config.scopes.join(" "));
            }
            if let Some(method) = self.config.code_challenge_method {
                query.append_pair("code_challenge", &pkce.challenge(method));
                query.append_pair("code_challenge_method", method.as_str());
            }
        }

        debug!(pkce = self.config.code_challenge_method.is_some(), "Built authorization URL");

        let request = AuthorizationRequest {
            provider: self.provider.as_str().to_string(),
            url: url.to_string(),
            redirect_uri: self.config.redirect_uri.clone(),
            state: pkce.state().to_string(),
        };
        let pending = PendingAuthorization {
            pkce,
            uses_pkce: self.config.code_challenge_method.is_some(),
        };

        Ok((request, pending))
    }

    /// Exchange an authorization code for tokens.
    ///
    /// The caller has already verified the CSRF state against `pending`.
    #[instrument(skip(self, code, pending), fields(provider = %self.provider))]
    pub async fn exchange_code(
        &self,
        code: &str,
        pending: &PendingAuthorization,
    ) -> Result<OAuthTokens> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
        ];
        if let Some(verifier) = pending.code_verifier() {
            params.push(("code_verifier", verifier));
        }

        debug!("Exchanging authorization code for tokens");

        let request = self.token_request(&params)?;
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(e.to_string()))?;

        if !response.is_success() {
            let error = describe_error_response(&response);
            warn!(status = response.status, error = %error, "Token exchange failed");
            return Err(AuthError::TokenExchangeFailed(format!(
                "Token endpoint returned {}: {}",
                response.status, error
            )));
        }

        let tokens = self
            .parse_token_response(&response, None)
            .map_err(AuthError::TokenExchangeFailed)?;

        info!(expires_at = ?tokens.expires_at, "Exchanged authorization code for tokens");
        Ok(tokens)
    }

    /// Refresh an access token.
    ///
    /// 5xx responses are retried with backoff according to the retry policy;
    /// 4xx responses fail immediately. An `invalid_grant` answer yields
    /// [`AuthError::RefreshRejected`].
    #[instrument(skip(self, refresh_token), fields(provider = %self.provider))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];

        debug!("Refreshing access token");

        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;

            let request = self.token_request(&params)?;
            let response = self
                .http_client
                .execute(request)
                .await
                .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

            if response.is_success() {
                let tokens = self
                    .parse_token_response(&response, Some(refresh_token))
                    .map_err(AuthError::RefreshFailed)?;

                info!(expires_at = ?tokens.expires_at, "Refreshed access token");
                return Ok(tokens);
            }

            let status = response.status;

            if response.is_client_error() {
                let body: Option<OAuthErrorResponse> = response.json().ok();
                let error = describe_error_response(&response);

                warn!(status = status, error = %error, "Token refresh failed without retry");

                let message = format!("Token endpoint returned {}: {}", status, error);
                if body.is_some_and(|b| b.error == "invalid_grant") {
                    return Err(AuthError::RefreshRejected(message));
                }
                return Err(AuthError::RefreshFailed(message));
            }

            if attempts >= max_attempts {
                return Err(AuthError::RefreshFailed(format!(
                    "Token refresh failed after {} attempts. Last error: {} - {}",
                    attempts,
                    status,
                    describe_error_response(&response)
                )));
            }

            let delay = self.retry_policy.delay_for(attempts);
            warn!(
                status = status,
                attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                "Token refresh failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Form-encoded POST to the token endpoint, with client-secret-basic
    /// authentication when a secret is configured.
    fn token_request(&self, params: &[(&str, &str)]) -> Result<HttpRequest> {
        let encoded_body = serde_urlencoded::to_string(params)
            .map_err(|e| AuthError::Serialization(format!("Failed to encode token request: {}", e)))?;

        let mut request = HttpRequest::new(HttpMethod::Post, self.config.token_endpoint.clone())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .body(Bytes::from(encoded_body));

        if let Some(secret) = &self.config.client_secret {
            let credentials = format!(
                "{}:{}",
                urlencoding::encode(&self.config.client_id),
                urlencoding::encode(secret)
            );
            request = request.basic_auth(STANDARD.encode(credentials));
        }

        Ok(request)
    }

    fn parse_token_response(
        &self,
        response: &HttpResponse,
        previous_refresh_token: Option<&str>,
    ) -> std::result::Result<OAuthTokens, String> {
        let token_response: TokenResponse = response
            .json()
            .map_err(|e| format!("Failed to parse token response: {}", e))?;

        if token_response.access_token.is_empty() {
            return Err("Token response carried an empty access token".to_string());
        }

        let mut tokens = OAuthTokens::issued_at(
            self.clock.now(),
            token_response.access_token,
            token_response
                .refresh_token
                .or_else(|| previous_refresh_token.map(str::to_string)),
            token_response.expires_in,
        );
        tokens.id_token = token_response.id_token;
        Ok(tokens)
    }
}

fn describe_error_response(response: &HttpResponse) -> String {
    match response.json::<OAuthErrorResponse>() {
        Ok(body) => match body.error_description {
            Some(description) => format!("{} ({})", body.error, description),
            None => body.error,
        },
        Err(_) => response
            .text()
            .unwrap_or_else(|_| "Unable to read error response".to_string()),
    }
}

/// Token response from the OAuth provider.
#[derive(Debug, Deserialize, Serialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
}

/// RFC 6749 §5.2 error body.
#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}
