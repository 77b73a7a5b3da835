//! Core service façade and bootstrap helpers.
//!
//! This crate wires a validated [`CoreConfig`] into one authorization state
//! machine and one tracker client per configured provider, and hands them to
//! the [`SyncOrchestrator`]. Desktop apps typically enable the
//! `desktop-shims` feature (which depends on `bridge-desktop`) so the HTTP
//! client and credential store default to reqwest and the OS keychain.
//!
//! Tracker connectors are compiled in through the `myanimelist` and `anilist`
//! features; configuring a provider whose connector is not compiled in fails
//! at bootstrap.
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, ProviderConfig};
//! use core_service::CoreService;
//!
//! let config = CoreConfig::builder()
//!     .anilist(ProviderConfig::anilist("1234", "secret"))
//!     .build()?;
//! let core = CoreService::bootstrap(config, progress_writer).await?;
//!
//! let request = core.begin_authorization(ProviderKind::AniList).await?;
//! // open request.url in a browser, capture the redirect...
//! core.complete_authorization_from_redirect(ProviderKind::AniList, &redirect).await?;
//!
//! let outcome = core.sync(ProviderKind::AniList, &title, &episodes, false).await;
//! ```

pub mod error;

pub use error::{CoreError, Result};

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub use bridge_desktop as desktop;

use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{
    authorization::{AuthorizationAgent, AuthorizationRequest, AuthorizationResponse},
    http::HttpClient,
    progress::LocalProgressWriter,
};
use core_auth::{AuthOptions, AuthStateMachine, AuthStatus, ProviderKind};
use core_runtime::config::{CoreConfig, ProviderConfig};
use core_runtime::events::{EventBus, EventStream};
use core_sync::{
    EpisodeProgress, ReconciliationEngine, RemoteTrackerClient, RemoteViewer, SyncOrchestrator,
    SyncOutcome, TrackedTitle,
};
use tracing::{info, instrument, warn};

/// Primary façade exposed to host applications.
///
/// Cloning is cheap; clones share the same machines and event bus.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    config: CoreConfig,
    event_bus: EventBus,
    orchestrator: SyncOrchestrator,
}

impl CoreService {
    /// Validate `config`, build every configured provider and rehydrate its
    /// persisted authorization state.
    pub async fn bootstrap(
        config: CoreConfig,
        progress_writer: Arc<dyn LocalProgressWriter>,
    ) -> Result<Self> {
        let options = AuthOptions::from_config(&config);
        Self::bootstrap_with(config, progress_writer, EventBus::default(), options).await
    }

    /// Like [`bootstrap`](Self::bootstrap) with an explicit event bus and
    /// auth options (e.g. a fixed clock).
    #[instrument(skip_all)]
    pub async fn bootstrap_with(
        config: CoreConfig,
        progress_writer: Arc<dyn LocalProgressWriter>,
        event_bus: EventBus,
        options: AuthOptions,
    ) -> Result<Self> {
        config.validate()?;

        let mut orchestrator =
            SyncOrchestrator::new(ReconciliationEngine::new(progress_writer), event_bus.clone());

        for provider in ProviderKind::ALL {
            let Some(provider_config) = provider_config(&config, provider) else {
                continue;
            };

            let tracker = tracker_client(
                provider,
                Arc::clone(&config.http_client),
                provider_config,
                config.request_timeout,
            )?;

            let auth = AuthStateMachine::new(
                provider,
                provider_config.clone(),
                Arc::clone(&config.http_client),
                Arc::clone(&config.credential_store),
                event_bus.clone(),
                options.clone(),
            );

            // Unreadable state leaves the machine empty; the user signs in again.
            if let Err(e) = auth.load().await {
                warn!(provider = %provider, error = %e, "Discarding unreadable auth state");
            }

            info!(provider = %provider, status = %auth.status().await, "Tracker registered");
            orchestrator.register(auth, tracker);
        }

        Ok(Self {
            inner: Arc::new(ServiceInner {
                config,
                event_bus,
                orchestrator,
            }),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    pub fn providers(&self) -> Vec<ProviderKind> {
        self.inner.orchestrator.providers()
    }

    /// Subscribe to auth and sync events.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.inner.event_bus.subscribe())
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    pub fn auth(&self, provider: ProviderKind) -> Result<&AuthStateMachine> {
        self.inner
            .orchestrator
            .auth(provider)
            .ok_or(CoreError::ProviderNotConfigured(provider))
    }

    pub async fn auth_status(&self, provider: ProviderKind) -> Result<AuthStatus> {
        Ok(self.auth(provider)?.status().await)
    }

    /// Profile of the account `provider` is signed in as.
    ///
    /// Goes through the token refresh path, so it doubles as a check that the
    /// stored authorization still works.
    pub async fn viewer(&self, provider: ProviderKind) -> Result<RemoteViewer> {
        self.auth(provider)?;
        Ok(self.inner.orchestrator.viewer(provider).await?)
    }

    pub async fn begin_authorization(&self, provider: ProviderKind) -> Result<AuthorizationRequest> {
        Ok(self.auth(provider)?.begin_authorization().await?)
    }

    pub async fn complete_authorization(
        &self,
        provider: ProviderKind,
        response: AuthorizationResponse,
    ) -> Result<()> {
        Ok(self.auth(provider)?.complete_authorization(response).await?)
    }

    /// Complete authorization from the full redirect URL captured by the host.
    pub async fn complete_authorization_from_redirect(
        &self,
        provider: ProviderKind,
        redirect_url: &str,
    ) -> Result<()> {
        let auth = self.auth(provider)?;
        let response = AuthorizationResponse::from_redirect_url(redirect_url)?;
        Ok(auth.complete_authorization(response).await?)
    }

    /// Run the whole browser flow through a host agent.
    pub async fn authorize_with(
        &self,
        provider: ProviderKind,
        agent: &dyn AuthorizationAgent,
    ) -> Result<()> {
        Ok(self.auth(provider)?.authorize_with(agent).await?)
    }

    pub async fn logout(&self, provider: ProviderKind) -> Result<()> {
        Ok(self.auth(provider)?.logout().await?)
    }

    pub async fn sync(
        &self,
        provider: ProviderKind,
        title: &TrackedTitle,
        local_episodes: &[EpisodeProgress],
        is_final_season: bool,
    ) -> SyncOutcome {
        self.inner
            .orchestrator
            .sync(provider, title, local_episodes, is_final_season)
            .await
    }

    pub async fn sync_all(
        &self,
        title: &TrackedTitle,
        local_episodes: &[EpisodeProgress],
        is_final_season: bool,
    ) -> Vec<(ProviderKind, SyncOutcome)> {
        self.inner
            .orchestrator
            .sync_all(title, local_episodes, is_final_season)
            .await
    }
}

fn provider_config(config: &CoreConfig, provider: ProviderKind) -> Option<&ProviderConfig> {
    match provider {
        ProviderKind::MyAnimeList => config.myanimelist.as_ref(),
        ProviderKind::AniList => config.anilist.as_ref(),
    }
}

fn tracker_client(
    provider: ProviderKind,
    http_client: Arc<dyn HttpClient>,
    config: &ProviderConfig,
    request_timeout: Duration,
) -> Result<Arc<dyn RemoteTrackerClient>> {
    match provider {
        ProviderKind::MyAnimeList => myanimelist_client(http_client, config, request_timeout),
        ProviderKind::AniList => anilist_client(http_client, config, request_timeout),
    }
}

#[cfg(feature = "myanimelist")]
fn myanimelist_client(
    http_client: Arc<dyn HttpClient>,
    config: &ProviderConfig,
    request_timeout: Duration,
) -> Result<Arc<dyn RemoteTrackerClient>> {
    Ok(Arc::new(provider_myanimelist::MyAnimeListClient::from_config(
        http_client,
        config,
        request_timeout,
    )))
}

#[cfg(not(feature = "myanimelist"))]
fn myanimelist_client(
    _http_client: Arc<dyn HttpClient>,
    _config: &ProviderConfig,
    _request_timeout: Duration,
) -> Result<Arc<dyn RemoteTrackerClient>> {
    Err(connector_missing("myanimelist"))
}

#[cfg(feature = "anilist")]
fn anilist_client(
    http_client: Arc<dyn HttpClient>,
    config: &ProviderConfig,
    request_timeout: Duration,
) -> Result<Arc<dyn RemoteTrackerClient>> {
    Ok(Arc::new(provider_anilist::AniListClient::from_config(
        http_client,
        config,
        request_timeout,
    )))
}

#[cfg(not(feature = "anilist"))]
fn anilist_client(
    _http_client: Arc<dyn HttpClient>,
    _config: &ProviderConfig,
    _request_timeout: Duration,
) -> Result<Arc<dyn RemoteTrackerClient>> {
    Err(connector_missing("anilist"))
}

#[cfg(any(not(feature = "myanimelist"), not(feature = "anilist")))]
fn connector_missing(feature: &str) -> CoreError {
    CoreError::CapabilityMissing {
        capability: format!("{}Connector", feature),
        message: format!(
            "The {} tracker is configured but its connector is not compiled in. \
             Enable the `{}` feature of core-service.",
            feature, feature
        ),
    }
}
