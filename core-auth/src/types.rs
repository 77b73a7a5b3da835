use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AuthError, Result};

/// Supported watch-list trackers.
///
/// # Examples
///
/// ```
/// use core_auth::ProviderKind;
///
/// let provider = ProviderKind::MyAnimeList;
/// assert_eq!(provider.display_name(), "MyAnimeList");
/// assert_eq!(provider.as_str(), "myanimelist");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderKind {
    /// MyAnimeList (PKCE `plain`, public client)
    MyAnimeList,
    /// AniList (confidential client, client-secret-basic)
    AniList,
}

impl ProviderKind {
    /// Every supported provider, in a stable order.
    pub const ALL: [ProviderKind; 2] = [ProviderKind::MyAnimeList, ProviderKind::AniList];

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::MyAnimeList => "MyAnimeList",
            ProviderKind::AniList => "AniList",
        }
    }

    /// Identifier used as the credential store key, in logs and in events.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::MyAnimeList => "myanimelist",
            ProviderKind::AniList => "anilist",
        }
    }

    /// Parse a provider kind from a string identifier
    ///
    /// ```
    /// use core_auth::ProviderKind;
    ///
    /// assert_eq!(ProviderKind::parse("MAL"), Some(ProviderKind::MyAnimeList));
    /// assert_eq!(ProviderKind::parse("AniList"), Some(ProviderKind::AniList));
    /// assert_eq!(ProviderKind::parse("kitsu"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "myanimelist" | "my_anime_list" | "mal" => Some(ProviderKind::MyAnimeList),
            "anilist" | "ani_list" => Some(ProviderKind::AniList),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Derived lifecycle state of a provider's authorization.
///
/// ```text
/// Empty -> AuthorizationPending -> Authorized <-> RefreshPending
///                                      |
///                                      v
///                                   Revoked
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthStatus {
    /// Nothing stored, no flow in progress
    Empty,
    /// An authorization request was handed out and not completed yet
    AuthorizationPending,
    /// Usable access token present
    Authorized,
    /// A token refresh is in flight
    RefreshPending,
    /// The provider rejected the refresh token; re-authorization required
    Revoked,
}

impl AuthStatus {
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthStatus::Authorized | AuthStatus::RefreshPending)
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStatus::Empty => write!(f, "Not Connected"),
            AuthStatus::AuthorizationPending => write!(f, "Authorizing..."),
            AuthStatus::Authorized => write!(f, "Connected"),
            AuthStatus::RefreshPending => write!(f, "Refreshing Token..."),
            AuthStatus::Revoked => write!(f, "Reconnect Required"),
        }
    }
}

/// Token set returned by a code exchange or refresh.
///
/// # Security
///
/// The `Debug` implementation redacts every token.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    /// `None` when the provider did not send `expires_in`
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthTokens {
    /// Build a token set whose expiry is `expires_in` seconds after `now`.
    pub fn issued_at(
        now: DateTime<Utc>,
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<i64>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            id_token: None,
            expires_at: expires_in.map(|secs| now + Duration::seconds(secs)),
        }
    }
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Serializable record of the last authorization failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthFailure {
    pub kind: String,
    pub message: String,
}

impl From<&AuthError> for AuthFailure {
    fn from(error: &AuthError) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// Persisted authorization state of one provider.
///
/// Serialized to JSON on every mutation and handed to the host's
/// `CredentialStore`. An empty string deserializes to the empty state.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub authorization_endpoint: String,
    #[serde(default)]
    pub token_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<AuthFailure>,
    #[serde(default)]
    pub revoked: bool,
}

impl AuthState {
    /// Empty state bound to a provider's endpoints.
    pub fn new(authorization_endpoint: impl Into<String>, token_endpoint: impl Into<String>) -> Self {
        Self {
            authorization_endpoint: authorization_endpoint.into(),
            token_endpoint: token_endpoint.into(),
            ..Self::default()
        }
    }

    /// Access token present and not revoked.
    pub fn is_authorized(&self) -> bool {
        self.access_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
            && !self.revoked
    }

    /// Whether the access token must be refreshed before use.
    ///
    /// With a known expiry, true once `expires_at <= now + margin`. Without
    /// one, true only when there is no access token at all.
    pub fn needs_refresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now + margin,
            None => self.access_token.is_none(),
        }
    }

    /// Nothing worth persisting: no tokens and no recorded failure.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none()
            && self.refresh_token.is_none()
            && self.id_token.is_none()
            && self.last_error.is_none()
            && !self.revoked
    }

    /// Store a freshly issued token set.
    ///
    /// A refresh response without a new refresh token keeps the current one.
    pub fn apply_tokens(&mut self, tokens: OAuthTokens) {
        self.access_token = Some(tokens.access_token);
        if tokens.refresh_token.is_some() {
            self.refresh_token = tokens.refresh_token;
        }
        if tokens.id_token.is_some() {
            self.id_token = tokens.id_token;
        }
        self.expires_at = tokens.expires_at;
        self.last_error = None;
        self.revoked = false;
    }

    /// Record a failure without touching the tokens.
    pub fn record_error(&mut self, error: &AuthError) {
        self.last_error = Some(AuthFailure::from(error));
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| AuthError::Serialization(e.to_string()))
    }

    /// Parse a persisted state; an empty or blank string yields `AuthState::default()`.
    pub fn from_json(serialized: &str) -> Result<Self> {
        if serialized.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(serialized).map_err(|e| AuthError::Serialization(e.to_string()))
    }
}

impl fmt::Debug for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("AuthState")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("id_token", &redact(&self.id_token))
            .field("expires_at", &self.expires_at)
            .field("authorization_endpoint", &self.authorization_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("last_error", &self.last_error)
            .field("revoked", &self.revoked)
            .finish()
    }
}
