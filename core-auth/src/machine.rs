//! # Authorization State Machine
//!
//! One [`AuthStateMachine`] per tracker owns that tracker's tokens, the
//! pending authorization (if any) and the persisted snapshot.
//!
//! ## Overview
//!
//! - `begin_authorization` / `complete_authorization` drive the code flow
//! - `current_access_token` hands out a usable token, refreshing first when
//!   the cached one is about to expire
//! - every mutation is serialized to JSON and saved through the host's
//!   [`CredentialStore`]
//! - lifecycle changes are published as [`AuthEvent`]s
//!
//! ## Concurrency
//!
//! `current_access_token` may be called from many tasks at once. Refresh is
//! single-flight: the first caller starts the token request and every caller
//! arriving while it runs awaits the same shared future and observes the same
//! result. Snapshot writes are serialized so the store always ends up with
//! the latest state. A logout that lands while a refresh is in flight wins:
//! the refresh result is dropped instead of being stored.
//!
//! ## Usage
//!
//! ```ignore
//! use core_auth::{AuthOptions, AuthStateMachine, ProviderKind};
//!
//! let machine = AuthStateMachine::new(
//!     ProviderKind::AniList,
//!     ProviderConfig::anilist("1234", "secret"),
//!     http_client,
//!     credential_store,
//!     event_bus,
//!     AuthOptions::default(),
//! );
//! machine.load().await?;
//!
//! let request = machine.begin_authorization().await?;
//! // host opens request.url and captures the redirect
//! machine.complete_authorization(response).await?;
//!
//! let token = machine.current_access_token().await?;
//! ```

use crate::error::{AuthError, Result};
use crate::oauth::{PendingAuthorization, ProviderAuthClient};
use crate::types::{AuthFailure, AuthState, AuthStatus, ProviderKind};
use bridge_traits::authorization::{AuthorizationAgent, AuthorizationRequest, AuthorizationResponse};
use bridge_traits::error::BridgeError;
use bridge_traits::http::HttpClient;
use bridge_traits::storage::CredentialStore;
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::config::{self, CoreConfig, ProviderConfig};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use core_runtime::logging::redact_url_query;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

type RefreshFlight = Shared<BoxFuture<'static, Result<String>>>;

/// The refresh currently running, tagged so a finished flight only clears
/// its own slot.
struct InFlight {
    id: u64,
    flight: RefreshFlight,
}

/// Tunables shared by every state machine.
#[derive(Clone)]
pub struct AuthOptions {
    /// Tokens expiring within this window are refreshed before use
    pub refresh_margin: Duration,
    /// Upper bound for one code exchange or refresh
    pub auth_timeout: Duration,
    /// Browser packages refused by [`AuthStateMachine::authorize_with`]
    pub browser_denylist: Vec<String>,
    /// Time source for expiry checks
    pub clock: Arc<dyn Clock>,
}

impl AuthOptions {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            refresh_margin: config.refresh_margin,
            auth_timeout: config.auth_timeout,
            browser_denylist: config.browser_denylist.clone(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    pub fn with_auth_timeout(mut self, auth_timeout: Duration) -> Self {
        self.auth_timeout = auth_timeout;
        self
    }

    pub fn with_browser_denylist(mut self, denylist: Vec<String>) -> Self {
        self.browser_denylist = denylist;
        self
    }
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            refresh_margin: config::DEFAULT_REFRESH_MARGIN,
            auth_timeout: config::DEFAULT_AUTH_TIMEOUT,
            browser_denylist: Vec::new(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthOptions")
            .field("refresh_margin", &self.refresh_margin)
            .field("auth_timeout", &self.auth_timeout)
            .field("browser_denylist", &self.browser_denylist)
            .finish()
    }
}

/// Per-provider authorization and token lifecycle.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct AuthStateMachine {
    inner: Arc<Inner>,
}

struct Inner {
    provider: ProviderKind,
    client: ProviderAuthClient,
    store: Arc<dyn CredentialStore>,
    event_bus: EventBus,
    options: AuthOptions,
    state: RwLock<AuthState>,
    pending: Mutex<Option<PendingAuthorization>>,
    refresh_flight: Mutex<Option<InFlight>>,
    next_flight_id: AtomicU64,
    /// Bumped under the state write lock whenever credentials are replaced
    /// (logout, load, a new authorization). A refresh started under an older
    /// generation drops its result.
    generation: AtomicU64,
    persist_lock: Mutex<()>,
}

impl AuthStateMachine {
    /// Create a machine in the empty state.
    ///
    /// Call [`load`](Self::load) to rehydrate persisted state.
    pub fn new(
        provider: ProviderKind,
        config: ProviderConfig,
        http_client: Arc<dyn HttpClient>,
        store: Arc<dyn CredentialStore>,
        event_bus: EventBus,
        options: AuthOptions,
    ) -> Self {
        let client =
            ProviderAuthClient::new(provider, config, http_client, Arc::clone(&options.clock));
        Self::with_client(client, store, event_bus, options)
    }

    /// Create a machine around an already configured client.
    pub fn with_client(
        client: ProviderAuthClient,
        store: Arc<dyn CredentialStore>,
        event_bus: EventBus,
        options: AuthOptions,
    ) -> Self {
        let state = AuthState::new(
            client.config().authorization_endpoint.clone(),
            client.config().token_endpoint.clone(),
        );
        Self {
            inner: Arc::new(Inner {
                provider: client.provider(),
                client,
                store,
                event_bus,
                options,
                state: RwLock::new(state),
                pending: Mutex::new(None),
                refresh_flight: Mutex::new(None),
                next_flight_id: AtomicU64::new(0),
                generation: AtomicU64::new(0),
                persist_lock: Mutex::new(()),
            }),
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.inner.provider
    }

    /// Rehydrate from the credential store.
    #[instrument(skip(self), fields(provider = %self.inner.provider))]
    pub async fn load(&self) -> Result<()> {
        let serialized = self
            .inner
            .store
            .load_auth_state(self.inner.provider.as_str())
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        self.load_from(&serialized).await
    }

    /// Replace the in-memory state with a serialized snapshot.
    ///
    /// An empty string loads the empty state. Nothing is persisted.
    pub async fn load_from(&self, serialized: &str) -> Result<()> {
        let mut loaded = AuthState::from_json(serialized)?;
        let config = self.inner.client.config();
        if loaded.authorization_endpoint.is_empty() {
            loaded.authorization_endpoint = config.authorization_endpoint.clone();
        }
        if loaded.token_endpoint.is_empty() {
            loaded.token_endpoint = config.token_endpoint.clone();
        }

        debug!(
            provider = %self.inner.provider,
            authorized = loaded.is_authorized(),
            "Loaded authorization state"
        );
        let mut state = self.inner.state.write().await;
        *state = loaded;
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Serialize the current state.
    pub async fn snapshot(&self) -> Result<String> {
        self.inner.state.read().await.to_json()
    }

    pub async fn status(&self) -> AuthStatus {
        if self.inner.refresh_flight.lock().await.is_some() {
            return AuthStatus::RefreshPending;
        }
        if self.inner.pending.lock().await.is_some() {
            return AuthStatus::AuthorizationPending;
        }

        let state = self.inner.state.read().await;
        if state.revoked {
            AuthStatus::Revoked
        } else if state.is_authorized() {
            AuthStatus::Authorized
        } else {
            AuthStatus::Empty
        }
    }

    pub async fn is_authorized(&self) -> bool {
        self.inner.state.read().await.is_authorized()
    }

    pub async fn needs_refresh(&self) -> bool {
        self.inner.needs_refresh(&*self.inner.state.read().await)
    }

    pub async fn last_error(&self) -> Option<AuthFailure> {
        self.inner.state.read().await.last_error.clone()
    }

    /// Build an authorization request and remember it as pending.
    ///
    /// A previous pending request is discarded.
    #[instrument(skip(self), fields(provider = %self.inner.provider))]
    pub async fn begin_authorization(&self) -> Result<AuthorizationRequest> {
        let (request, pending) = self.inner.client.build_authorization_request()?;

        if self.inner.pending.lock().await.replace(pending).is_some() {
            debug!("Replaced an earlier pending authorization");
        }

        info!(url = %redact_url_query(&request.url), "Authorization started");
        self.inner.emit(AuthEvent::AuthorizationStarted {
            provider: self.inner.provider.as_str().to_string(),
        });

        Ok(request)
    }

    /// Drop the pending authorization. Returns whether one existed.
    pub async fn cancel_authorization(&self) -> bool {
        let cancelled = self.inner.pending.lock().await.take().is_some();
        if cancelled {
            info!(provider = %self.inner.provider, "Authorization cancelled");
            self.inner.emit(AuthEvent::AuthorizationCancelled {
                provider: self.inner.provider.as_str().to_string(),
            });
        }
        cancelled
    }

    /// Finish the code flow with the redirect result.
    ///
    /// On failure the previous tokens are retained and the error is recorded
    /// in `last_error`.
    #[instrument(skip(self, response), fields(provider = %self.inner.provider))]
    pub async fn complete_authorization(&self, response: AuthorizationResponse) -> Result<()> {
        let pending = self
            .inner
            .pending
            .lock()
            .await
            .take()
            .ok_or(AuthError::NoAuthorizationPending)?;

        let code = match (response.error, response.code) {
            (Some(error), _) => {
                let reason = match response.error_description {
                    Some(description) => format!("{}: {}", error, description),
                    None => error,
                };
                return Err(self.inner.fail_authorization(self.denied(reason)).await);
            }
            (None, None) => {
                let reason = "Redirect carried no authorization code".to_string();
                return Err(self.inner.fail_authorization(self.denied(reason)).await);
            }
            (None, Some(code)) => code,
        };

        let returned_state = response.state.unwrap_or_default();
        if returned_state != pending.state() {
            error!("State parameter mismatch - possible CSRF attack");
            let err = AuthError::StateMismatch {
                expected: pending.state().to_string(),
                actual: returned_state,
            };
            return Err(self.inner.fail_authorization(err).await);
        }

        let exchange = timeout(
            self.inner.options.auth_timeout,
            self.inner.client.exchange_code(&code, &pending),
        )
        .await
        .unwrap_or_else(|_| {
            Err(AuthError::TokenExchangeFailed(format!(
                "Token exchange timed out after {}s",
                self.inner.options.auth_timeout.as_secs()
            )))
        });

        let tokens = match exchange {
            Ok(tokens) => tokens,
            Err(err) => return Err(self.inner.fail_authorization(err).await),
        };

        let expires_at = tokens.expires_at.map(|at| at.timestamp());
        {
            let mut state = self.inner.state.write().await;
            state.apply_tokens(tokens);
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.persist().await?;

        info!("Authorization completed");
        self.inner.emit(AuthEvent::Authorized {
            provider: self.inner.provider.as_str().to_string(),
            expires_at,
        });
        Ok(())
    }

    /// Run the whole interactive flow through a host agent.
    ///
    /// Refuses denylisted browsers before anything is dispatched.
    #[instrument(skip(self, agent), fields(provider = %self.inner.provider))]
    pub async fn authorize_with(&self, agent: &dyn AuthorizationAgent) -> Result<()> {
        let request = self.begin_authorization().await?;

        if let Some(package) = agent.browser_package() {
            if config::is_denied(&self.inner.options.browser_denylist, &package) {
                warn!(browser = %package, "Refusing denylisted browser");
                self.cancel_authorization().await;
                return Err(AuthError::BrowserDenied(package));
            }
        }

        let response = match agent.authorize(&request).await {
            Ok(response) => response,
            Err(BridgeError::Cancelled(_)) => {
                self.cancel_authorization().await;
                return Err(AuthError::Cancelled);
            }
            Err(e) => {
                self.inner.pending.lock().await.take();
                let err = self.denied(e.to_string());
                return Err(self.inner.fail_authorization(err).await);
            }
        };

        self.complete_authorization(response).await
    }

    /// Return a usable access token, refreshing it first if needed.
    ///
    /// Fails with `Unauthorized` without touching the network when nothing
    /// usable is stored. Refresh failures never clear stored tokens.
    pub async fn current_access_token(&self) -> Result<String> {
        {
            let state = self.inner.state.read().await;
            if !state.is_authorized() {
                return Err(AuthError::Unauthorized);
            }
            if !self.inner.needs_refresh(&state) {
                if let Some(token) = state.access_token.clone() {
                    return Ok(token);
                }
            }
        }

        self.refresh_single_flight().await
    }

    async fn refresh_single_flight(&self) -> Result<String> {
        let mut guard = {
            let mut slot = self.inner.refresh_flight.lock().await;
            match slot.as_ref() {
                Some(current) => {
                    debug!(provider = %self.inner.provider, "Joining in-flight token refresh");
                    FlightGuard {
                        inner: &self.inner,
                        id: current.id,
                        flight: current.flight.clone(),
                    }
                }
                None => {
                    let id = self.inner.next_flight_id.fetch_add(1, Ordering::SeqCst);
                    let inner = Arc::clone(&self.inner);
                    let flight = async move {
                        let result = inner.refresh().await;
                        inner.clear_flight(id).await;
                        result
                    }
                    .boxed()
                    .shared();
                    *slot = Some(InFlight {
                        id,
                        flight: flight.clone(),
                    });
                    FlightGuard {
                        inner: &self.inner,
                        id,
                        flight,
                    }
                }
            }
        };

        (&mut guard.flight).await
    }

    /// Forget everything and persist the empty state.
    #[instrument(skip(self), fields(provider = %self.inner.provider))]
    pub async fn logout(&self) -> Result<()> {
        self.inner.pending.lock().await.take();
        // A refresh still running keeps going for its callers, but its result
        // is dropped because the generation moves on below.
        if self.inner.refresh_flight.lock().await.take().is_some() {
            debug!("Detached in-flight token refresh");
        }
        {
            let config = self.inner.client.config();
            let mut state = self.inner.state.write().await;
            *state = AuthState::new(
                config.authorization_endpoint.clone(),
                config.token_endpoint.clone(),
            );
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.persist().await?;

        info!("Logged out");
        self.inner.emit(AuthEvent::LoggedOut {
            provider: self.inner.provider.as_str().to_string(),
        });
        Ok(())
    }

    fn denied(&self, reason: String) -> AuthError {
        AuthError::AuthorizationDenied {
            provider: self.inner.provider.as_str().to_string(),
            reason,
        }
    }
}

impl fmt::Debug for AuthStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthStateMachine")
            .field("provider", &self.inner.provider)
            .field("options", &self.inner.options)
            .finish()
    }
}

/// Held by each caller awaiting a refresh. When the last caller goes away
/// before the refresh completes, the abandoned flight is removed so the
/// machine stops reporting `RefreshPending`.
struct FlightGuard<'a> {
    inner: &'a Inner,
    id: u64,
    flight: RefreshFlight,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.flight.peek().is_some() {
            return;
        }
        // Two handles left: the slot and this guard.
        if Shared::strong_count(&self.flight) != Some(2) {
            return;
        }
        if let Ok(mut slot) = self.inner.refresh_flight.try_lock() {
            if slot.as_ref().map(|current| current.id) == Some(self.id) {
                slot.take();
                debug!(provider = %self.inner.provider, "Dropped abandoned token refresh");
            }
        }
    }
}

impl Inner {
    async fn clear_flight(&self, id: u64) {
        let mut slot = self.refresh_flight.lock().await;
        if slot.as_ref().map(|current| current.id) == Some(id) {
            slot.take();
        }
    }

    fn needs_refresh(&self, state: &AuthState) -> bool {
        let margin = chrono::Duration::from_std(self.options.refresh_margin)
            .unwrap_or_else(|_| chrono::Duration::seconds(60));
        state.needs_refresh(self.options.clock.now(), margin)
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.event_bus.emit(CoreEvent::Auth(event));
    }

    /// Record `err`, persist the state and publish the failure.
    ///
    /// Returns the error when persistence succeeded, otherwise the storage error.
    async fn fail_authorization(&self, err: AuthError) -> AuthError {
        warn!(provider = %self.provider, error = %err, "Authorization failed");
        self.state.write().await.record_error(&err);
        self.emit(AuthEvent::AuthError {
            provider: self.provider.as_str().to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        });

        match self.persist().await {
            Ok(()) => err,
            Err(storage) => storage,
        }
    }

    /// Refresh using the stored refresh token. Runs inside the single flight.
    #[instrument(skip(self), fields(provider = %self.provider))]
    async fn refresh(&self) -> Result<String> {
        let (refresh_token, generation) = {
            let state = self.state.read().await;
            if !state.is_authorized() {
                return Err(AuthError::Unauthorized);
            }
            if !self.needs_refresh(&state) {
                // Another flight finished between the caller's check and ours.
                if let Some(token) = state.access_token.clone() {
                    return Ok(token);
                }
            }
            match state.refresh_token.clone() {
                Some(token) if !token.is_empty() => {
                    (token, self.generation.load(Ordering::SeqCst))
                }
                _ => {
                    warn!("Access token expired and no refresh token is stored");
                    return Err(AuthError::Unauthorized);
                }
            }
        };

        info!("Token expired or expiring soon, refreshing");
        self.emit(AuthEvent::TokenRefreshing {
            provider: self.provider.as_str().to_string(),
        });

        let result = timeout(self.options.auth_timeout, self.client.refresh(&refresh_token))
            .await
            .unwrap_or_else(|_| {
                Err(AuthError::RefreshFailed(format!(
                    "Token refresh timed out after {}s",
                    self.options.auth_timeout.as_secs()
                )))
            });

        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            info!("Credentials replaced during refresh, discarding the refresh result");
            return match state.access_token.clone() {
                Some(token) if state.is_authorized() && !self.needs_refresh(&state) => Ok(token),
                _ => Err(AuthError::Unauthorized),
            };
        }

        match result {
            Ok(tokens) => {
                let access_token = tokens.access_token.clone();
                let expires_at = tokens.expires_at.map(|at| at.timestamp());
                state.apply_tokens(tokens);
                drop(state);
                self.persist_logged().await;

                self.emit(AuthEvent::TokenRefreshed {
                    provider: self.provider.as_str().to_string(),
                    expires_at,
                });
                Ok(access_token)
            }
            Err(err) => {
                error!(error = %err, "Token refresh failed");
                let revoked = matches!(err, AuthError::RefreshRejected(_));
                state.record_error(&err);
                if revoked {
                    state.revoked = true;
                }
                let now = self.options.clock.now();
                let stale = match (&state.access_token, state.expires_at) {
                    (Some(token), Some(expires_at)) if !revoked && expires_at > now => {
                        Some(token.clone())
                    }
                    _ => None,
                };
                drop(state);
                self.persist_logged().await;

                self.emit(AuthEvent::AuthError {
                    provider: self.provider.as_str().to_string(),
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                    recoverable: err.is_recoverable(),
                });
                if revoked {
                    self.emit(AuthEvent::Revoked {
                        provider: self.provider.as_str().to_string(),
                    });
                }

                match stale {
                    Some(token) => {
                        warn!("Refresh failed, using the access token until it expires");
                        Ok(token)
                    }
                    None => Err(err),
                }
            }
        }
    }

    /// Serialize the state and save it. Snapshot and save happen under one
    /// lock so the last write always carries the newest state.
    async fn persist(&self) -> Result<()> {
        let _guard = self.persist_lock.lock().await;

        let serialized = {
            let state = self.state.read().await;
            if state.is_empty() {
                String::new()
            } else {
                state.to_json()?
            }
        };

        self.store
            .save_auth_state(self.provider.as_str(), &serialized)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    /// Refresh paths keep the new token even when it cannot be saved.
    async fn persist_logged(&self) {
        if let Err(e) = self.persist().await {
            error!(provider = %self.provider, error = %e, "Failed to persist authorization state");
        }
    }
}
