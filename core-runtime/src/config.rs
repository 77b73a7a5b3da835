//! # Core Configuration Module
//!
//! Provides configuration management for the tracker sync core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding the injected host bridges, one [`ProviderConfig`] per configured
//! tracker and the timing knobs of the authorization machines. It enforces
//! fail-fast validation so a misconfigured host learns about it at startup,
//! not on the first sync.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - token endpoint and tracker API calls (desktop default: reqwest)
//! - `CredentialStore` - persisted per-provider auth state (desktop default: keyring)
//!
//! When the `desktop-shims` feature is enabled, desktop defaults are injected
//! automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, ProviderConfig};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .http_client(Arc::new(MyHttpClient))
//!     .credential_store(Arc::new(MyVault))
//!     .myanimelist(ProviderConfig::myanimelist("mal-client-id"))
//!     .anilist(ProviderConfig::anilist("1234", "anilist-secret"))
//!     .deny_browser("com.example.broken.browser")
//!     .build()?;
//! ```
//!
//! ## Environment
//!
//! [`ProviderConfig::from_env`] reads client credentials from:
//!
//! | Variable | Provider |
//! |---|---|
//! | `EPISYNC_MAL_CLIENT_ID` | MyAnimeList |
//! | `EPISYNC_MAL_REDIRECT_URI` | MyAnimeList (optional) |
//! | `EPISYNC_ANILIST_CLIENT_ID` | AniList |
//! | `EPISYNC_ANILIST_CLIENT_SECRET` | AniList |
//! | `EPISYNC_ANILIST_REDIRECT_URI` | AniList (optional) |

use crate::error::{Error, Result};
use bridge_traits::{CredentialStore, HttpClient};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const MAL_AUTHORIZATION_ENDPOINT: &str = "https://myanimelist.net/v1/oauth2/authorize";
pub const MAL_TOKEN_ENDPOINT: &str = "https://myanimelist.net/v1/oauth2/token";
pub const MAL_API_BASE_URL: &str = "https://api.myanimelist.net/v2";
pub const MAL_DEFAULT_REDIRECT_URI: &str = "episync://myanimelist/callback";

pub const ANILIST_AUTHORIZATION_ENDPOINT: &str = "https://anilist.co/api/v2/oauth/authorize";
pub const ANILIST_TOKEN_ENDPOINT: &str = "https://anilist.co/api/v2/oauth/token";
pub const ANILIST_API_BASE_URL: &str = "https://graphql.anilist.co";
pub const ANILIST_DEFAULT_REDIRECT_URI: &str = "episync://anilist/callback";

/// Tokens expiring within this window are refreshed before use.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);
/// Upper bound for a single code exchange or refresh round-trip.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(120);
/// Per-request timeout for tracker API calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const MAL_CLIENT_ID_ENV: &str = "EPISYNC_MAL_CLIENT_ID";
const MAL_REDIRECT_URI_ENV: &str = "EPISYNC_MAL_REDIRECT_URI";
const ANILIST_CLIENT_ID_ENV: &str = "EPISYNC_ANILIST_CLIENT_ID";
const ANILIST_CLIENT_SECRET_ENV: &str = "EPISYNC_ANILIST_CLIENT_SECRET";
const ANILIST_REDIRECT_URI_ENV: &str = "EPISYNC_ANILIST_REDIRECT_URI";

/// PKCE code challenge method advertised in the authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
    /// Challenge equals the verifier (the only method MyAnimeList accepts)
    Plain,
    /// Challenge is the base64url SHA-256 of the verifier
    S256,
}

impl CodeChallengeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeChallengeMethod::Plain => "plain",
            CodeChallengeMethod::S256 => "S256",
        }
    }
}

/// OAuth and API settings for one tracker.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub client_id: String,
    /// When set, the token endpoint is called with client-secret-basic auth.
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub response_type: String,
    /// When set, authorization uses PKCE with this method.
    pub code_challenge_method: Option<CodeChallengeMethod>,
    pub scopes: Vec<String>,
    /// Base URL of the tracker's list API.
    pub api_base_url: String,
}

impl ProviderConfig {
    /// MyAnimeList defaults: PKCE `plain`, client id sent in the token request body.
    pub fn myanimelist(client_id: impl Into<String>) -> Self {
        Self {
            authorization_endpoint: MAL_AUTHORIZATION_ENDPOINT.to_string(),
            token_endpoint: MAL_TOKEN_ENDPOINT.to_string(),
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: MAL_DEFAULT_REDIRECT_URI.to_string(),
            response_type: "code".to_string(),
            code_challenge_method: Some(CodeChallengeMethod::Plain),
            scopes: Vec::new(),
            api_base_url: MAL_API_BASE_URL.to_string(),
        }
    }

    /// AniList defaults: no PKCE, client-secret-basic at the token endpoint.
    pub fn anilist(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            authorization_endpoint: ANILIST_AUTHORIZATION_ENDPOINT.to_string(),
            token_endpoint: ANILIST_TOKEN_ENDPOINT.to_string(),
            client_id: client_id.into(),
            client_secret: Some(client_secret.into()),
            redirect_uri: ANILIST_DEFAULT_REDIRECT_URI.to_string(),
            response_type: "code".to_string(),
            code_challenge_method: None,
            scopes: Vec::new(),
            api_base_url: ANILIST_API_BASE_URL.to_string(),
        }
    }

    /// Load the MyAnimeList and AniList configurations from the environment.
    ///
    /// A provider whose client id variable is unset is returned as `None`.
    /// AniList requires its secret whenever its client id is present.
    pub fn from_env() -> Result<(Option<Self>, Option<Self>)> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<(Option<Self>, Option<Self>)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let myanimelist = non_empty(MAL_CLIENT_ID_ENV).map(|client_id| {
            let mut config = Self::myanimelist(client_id);
            if let Some(redirect) = non_empty(MAL_REDIRECT_URI_ENV) {
                config.redirect_uri = redirect;
            }
            config
        });

        let anilist = match non_empty(ANILIST_CLIENT_ID_ENV) {
            Some(client_id) => {
                let secret = non_empty(ANILIST_CLIENT_SECRET_ENV)
                    .ok_or_else(|| Error::MissingEnv(ANILIST_CLIENT_SECRET_ENV.to_string()))?;
                let mut config = Self::anilist(client_id, secret);
                if let Some(redirect) = non_empty(ANILIST_REDIRECT_URI_ENV) {
                    config.redirect_uri = redirect;
                }
                Some(config)
            }
            None => None,
        };

        Ok((myanimelist, anilist))
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_endpoints(
        mut self,
        authorization_endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
    ) -> Self {
        self.authorization_endpoint = authorization_endpoint.into();
        self.token_endpoint = token_endpoint.into();
        self
    }

    /// Checks that endpoints parse as URLs and the client is identified.
    pub fn validate(&self, provider: &str) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Config(format!("{}: client_id cannot be empty", provider)));
        }

        for (name, value) in [
            ("authorization_endpoint", &self.authorization_endpoint),
            ("token_endpoint", &self.token_endpoint),
            ("api_base_url", &self.api_base_url),
        ] {
            url::Url::parse(value).map_err(|e| {
                Error::Config(format!("{}: invalid {} '{}': {}", provider, name, value, e))
            })?;
        }

        if self.redirect_uri.trim().is_empty() {
            return Err(Error::Config(format!("{}: redirect_uri cannot be empty", provider)));
        }

        if self
            .client_secret
            .as_ref()
            .is_some_and(|secret| secret.trim().is_empty())
        {
            return Err(Error::Config(format!(
                "{}: client_secret is set but empty",
                provider
            )));
        }

        Ok(())
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("authorization_endpoint", &self.authorization_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("response_type", &self.response_type)
            .field("code_challenge_method", &self.code_challenge_method)
            .field("scopes", &self.scopes)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

/// Core configuration for the tracker sync core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// HTTP client for token endpoints and tracker APIs (required)
    pub http_client: Arc<dyn HttpClient>,

    /// Persisted per-provider authorization state (required)
    pub credential_store: Arc<dyn CredentialStore>,

    /// MyAnimeList settings; `None` disables the provider
    pub myanimelist: Option<ProviderConfig>,

    /// AniList settings; `None` disables the provider
    pub anilist: Option<ProviderConfig>,

    /// Browser packages that must never be used for authorization
    pub browser_denylist: Vec<String>,

    /// Tokens expiring within this window are refreshed before use
    pub refresh_margin: Duration,

    /// Timeout for one code exchange or refresh
    pub auth_timeout: Duration,

    /// Timeout for one tracker API request
    pub request_timeout: Duration,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("credential_store", &"CredentialStore { ... }")
            .field("myanimelist", &self.myanimelist)
            .field("anilist", &self.anilist)
            .field("browser_denylist", &self.browser_denylist)
            .field("refresh_margin", &self.refresh_margin)
            .field("auth_timeout", &self.auth_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - At least one provider is configured
    /// - Each provider configuration is well-formed
    /// - Timeouts are non-zero
    pub fn validate(&self) -> Result<()> {
        if self.myanimelist.is_none() && self.anilist.is_none() {
            return Err(Error::Config(
                "No tracker configured. Use .myanimelist() or .anilist() to add one.".to_string(),
            ));
        }

        if let Some(config) = &self.myanimelist {
            config.validate("myanimelist")?;
        }
        if let Some(config) = &self.anilist {
            config.validate("anilist")?;
        }

        if self.auth_timeout.is_zero() {
            return Err(Error::Config("Auth timeout must be greater than 0".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Case-insensitive check against the configured browser denylist.
    pub fn is_browser_denied(&self, package: &str) -> bool {
        is_denied(&self.browser_denylist, package)
    }
}

/// Case-insensitive denylist membership.
pub fn is_denied(denylist: &[String], package: &str) -> bool {
    denylist
        .iter()
        .any(|denied| denied.eq_ignore_ascii_case(package.trim()))
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestHttpClient. \
                 Mobile: inject the platform-native HTTP adapter."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn credential_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "CredentialStore".to_string(),
        message: "CredentialStore implementation is required for authorization state persistence. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default KeyringCredentialStore. \
                 Mobile: inject platform-native secure storage (Keychain/Keystore)."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout).map_err(|e| {
        Error::Internal(format!("Failed to create default HttpClient: {}", e))
    })?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_credential_store() -> Result<Arc<dyn CredentialStore>> {
    use bridge_desktop::KeyringCredentialStore;

    Ok(Arc::new(KeyringCredentialStore::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_credential_store() -> Result<Arc<dyn CredentialStore>> {
    Err(credential_store_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    credential_store: Option<Arc<dyn CredentialStore>>,
    myanimelist: Option<ProviderConfig>,
    anilist: Option<ProviderConfig>,
    browser_denylist: Vec<String>,
    refresh_margin: Option<Duration>,
    auth_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl CoreConfigBuilder {
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credential_store = Some(store);
        self
    }

    pub fn myanimelist(mut self, config: ProviderConfig) -> Self {
        self.myanimelist = Some(config);
        self
    }

    pub fn anilist(mut self, config: ProviderConfig) -> Self {
        self.anilist = Some(config);
        self
    }

    /// Adds providers loaded with [`ProviderConfig::from_env`].
    pub fn providers_from_env(mut self) -> Result<Self> {
        let (myanimelist, anilist) = ProviderConfig::from_env()?;
        if myanimelist.is_some() {
            self.myanimelist = myanimelist;
        }
        if anilist.is_some() {
            self.anilist = anilist;
        }
        Ok(self)
    }

    /// Refuse authorization through the browser with this package identifier.
    pub fn deny_browser(mut self, package: impl Into<String>) -> Self {
        self.browser_denylist.push(package.into());
        self
    }

    pub fn browser_denylist(mut self, packages: Vec<String>) -> Self {
        self.browser_denylist = packages;
        self
    }

    pub fn refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = Some(margin);
        self
    }

    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = Some(timeout);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Missing bridges fall back to desktop defaults when the `desktop-shims`
    /// feature is enabled; otherwise an actionable `CapabilityMissing` error
    /// is returned.
    pub fn build(self) -> Result<CoreConfig> {
        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let credential_store = match self.credential_store {
            Some(store) => store,
            None => provide_default_credential_store()?,
        };

        let config = CoreConfig {
            http_client,
            credential_store,
            myanimelist: self.myanimelist,
            anilist: self.anilist,
            browser_denylist: self.browser_denylist,
            refresh_margin: self.refresh_margin.unwrap_or(DEFAULT_REFRESH_MARGIN),
            auth_timeout: self.auth_timeout.unwrap_or(DEFAULT_AUTH_TIMEOUT),
            request_timeout,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{HttpRequest, HttpResponse};
    use std::collections::HashMap;

    struct MockHttpClient;

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Ok(HttpResponse {
                status: 200,
                headers: HashMap::new(),
                body: bytes::Bytes::new(),
            })
        }
    }

    struct MockCredentialStore;

    #[async_trait]
    impl CredentialStore for MockCredentialStore {
        async fn load_auth_state(&self, _provider: &str) -> BridgeResult<String> {
            Ok(String::new())
        }

        async fn save_auth_state(&self, _provider: &str, _state: &str) -> BridgeResult<()> {
            Ok(())
        }
    }

    fn builder_with_bridges() -> CoreConfigBuilder {
        CoreConfig::builder()
            .http_client(Arc::new(MockHttpClient))
            .credential_store(Arc::new(MockCredentialStore))
    }

    #[test]
    fn test_builder_applies_defaults() {
        let config = builder_with_bridges()
            .myanimelist(ProviderConfig::myanimelist("mal-id"))
            .build()
            .unwrap();

        assert_eq!(config.refresh_margin, DEFAULT_REFRESH_MARGIN);
        assert_eq!(config.auth_timeout, DEFAULT_AUTH_TIMEOUT);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(config.anilist.is_none());
        assert!(config.browser_denylist.is_empty());
    }

    #[test]
    fn test_builder_requires_a_provider() {
        let err = builder_with_bridges().build().unwrap_err();
        assert!(err.to_string().contains("No tracker configured"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_credential_store() {
        let err = CoreConfig::builder()
            .http_client(Arc::new(MockHttpClient))
            .anilist(ProviderConfig::anilist("1", "secret"))
            .build()
            .unwrap_err();

        match err {
            Error::CapabilityMissing { capability, message } => {
                assert_eq!(capability, "CredentialStore");
                assert!(message.contains("desktop-shims"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_http_client() {
        let err = CoreConfig::builder()
            .credential_store(Arc::new(MockCredentialStore))
            .anilist(ProviderConfig::anilist("1", "secret"))
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::CapabilityMissing { ref capability, .. } if capability == "HttpClient"));
    }

    #[test]
    fn test_provider_defaults() {
        let mal = ProviderConfig::myanimelist("mal-id");
        assert_eq!(mal.code_challenge_method, Some(CodeChallengeMethod::Plain));
        assert!(mal.client_secret.is_none());
        assert_eq!(mal.response_type, "code");

        let anilist = ProviderConfig::anilist("42", "shh");
        assert_eq!(anilist.code_challenge_method, None);
        assert_eq!(anilist.client_secret.as_deref(), Some("shh"));
        assert_eq!(anilist.token_endpoint, ANILIST_TOKEN_ENDPOINT);
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        let err = builder_with_bridges()
            .myanimelist(ProviderConfig::myanimelist("id").with_endpoints("not a url", MAL_TOKEN_ENDPOINT))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("authorization_endpoint"));
    }

    #[test]
    fn test_validate_rejects_empty_client_id() {
        let err = builder_with_bridges()
            .anilist(ProviderConfig::anilist(" ", "secret"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("client_id"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let err = builder_with_bridges()
            .anilist(ProviderConfig::anilist("1", "secret"))
            .auth_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Auth timeout"));
    }

    #[test]
    fn test_browser_denylist_is_case_insensitive() {
        let config = builder_with_bridges()
            .anilist(ProviderConfig::anilist("1", "secret"))
            .deny_browser("com.Example.Browser")
            .build()
            .unwrap();

        assert!(config.is_browser_denied("com.example.browser"));
        assert!(config.is_browser_denied("COM.EXAMPLE.BROWSER"));
        assert!(!config.is_browser_denied("org.mozilla.firefox"));
    }

    #[test]
    fn test_from_lookup_reads_both_providers() {
        let env: HashMap<&str, &str> = [
            ("EPISYNC_MAL_CLIENT_ID", "mal-id"),
            ("EPISYNC_ANILIST_CLIENT_ID", "42"),
            ("EPISYNC_ANILIST_CLIENT_SECRET", "secret"),
            ("EPISYNC_ANILIST_REDIRECT_URI", "http://localhost:9000/cb"),
        ]
        .into_iter()
        .collect();

        let (mal, anilist) =
            ProviderConfig::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();

        let mal = mal.unwrap();
        assert_eq!(mal.client_id, "mal-id");
        assert_eq!(mal.redirect_uri, MAL_DEFAULT_REDIRECT_URI);

        let anilist = anilist.unwrap();
        assert_eq!(anilist.client_secret.as_deref(), Some("secret"));
        assert_eq!(anilist.redirect_uri, "http://localhost:9000/cb");
    }

    #[test]
    fn test_from_lookup_requires_anilist_secret() {
        let err = ProviderConfig::from_lookup(|key| {
            (key == "EPISYNC_ANILIST_CLIENT_ID").then(|| "42".to_string())
        })
        .unwrap_err();

        assert!(matches!(err, Error::MissingEnv(ref name) if name == "EPISYNC_ANILIST_CLIENT_SECRET"));
    }

    #[test]
    fn test_from_lookup_skips_unset_providers() {
        let (mal, anilist) = ProviderConfig::from_lookup(|_| None).unwrap();
        assert!(mal.is_none());
        assert!(anilist.is_none());
    }

    #[test]
    fn test_debug_redacts_client_secret() {
        let debug = format!("{:?}", ProviderConfig::anilist("42", "very-secret"));
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
