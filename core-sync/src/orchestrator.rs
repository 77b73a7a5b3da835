//! # Sync Orchestrator
//!
//! Per-title entry point: authorize, fetch, decide, apply.
//!
//! ## Workflow
//!
//! 1. Provider not authorized → `Skipped(NotAuthorized)` without network
//! 2. Obtain an access token (refreshing if needed); an auth failure skips
//! 3. Fetch the remote entry; unknown media skips with `NotTracked`
//! 4. Decide and apply via [`ReconciliationEngine`]
//!
//! Each call is independent; many syncs may run concurrently and share the
//! provider's single-flight token refresh.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let orchestrator = SyncOrchestrator::new(engine, event_bus)
//!     .with_provider(mal_auth, Arc::new(mal_tracker))
//!     .with_provider(anilist_auth, Arc::new(anilist_tracker));
//!
//! let outcomes = orchestrator.sync_all(&title, &episodes, true).await;
//! ```

use crate::error::SyncError;
use crate::progress::EpisodeProgress;
use crate::reconcile::{ReconciliationEngine, SyncDecision};
use crate::remote::{RemoteTrackerClient, RemoteViewer, TrackedTitle};
use core_auth::{AuthError, AuthStateMachine, ProviderKind};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Why a sync attempted nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotAuthorized,
    /// Token could not be obtained or refreshed
    AuthFailed(AuthError),
    /// The tracker does not know the title
    NotTracked,
    /// No client registered for the provider
    NotConfigured,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NotAuthorized => "not_authorized",
            SkipReason::AuthFailed(_) => "auth_failed",
            SkipReason::NotTracked => "not_tracked",
            SkipReason::NotConfigured => "not_configured",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AuthFailed(e) => write!(f, "auth_failed: {}", e),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Result of one title/provider sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    Applied(SyncDecision),
    Failed(SyncError),
}

impl SyncOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, SyncOutcome::Applied(_))
    }
}

struct TrackerHandle {
    auth: AuthStateMachine,
    tracker: Arc<dyn RemoteTrackerClient>,
}

/// Runs reconciliation for registered providers.
pub struct SyncOrchestrator {
    providers: BTreeMap<ProviderKind, TrackerHandle>,
    engine: ReconciliationEngine,
    event_bus: EventBus,
}

impl SyncOrchestrator {
    pub fn new(engine: ReconciliationEngine, event_bus: EventBus) -> Self {
        Self {
            providers: BTreeMap::new(),
            engine,
            event_bus,
        }
    }

    /// Register the auth machine and tracker client for a provider.
    ///
    /// The provider is taken from the tracker client; a later registration
    /// for the same provider replaces the earlier one.
    pub fn with_provider(
        mut self,
        auth: AuthStateMachine,
        tracker: Arc<dyn RemoteTrackerClient>,
    ) -> Self {
        self.register(auth, tracker);
        self
    }

    pub fn register(&mut self, auth: AuthStateMachine, tracker: Arc<dyn RemoteTrackerClient>) {
        let provider = tracker.provider();
        if auth.provider() != provider {
            warn!(
                auth = %auth.provider(),
                tracker = %provider,
                "Registering tracker with an auth machine for another provider"
            );
        }
        self.providers
            .insert(provider, TrackerHandle { auth, tracker });
    }

    pub fn providers(&self) -> Vec<ProviderKind> {
        self.providers.keys().copied().collect()
    }

    pub fn auth(&self, provider: ProviderKind) -> Option<&AuthStateMachine> {
        self.providers.get(&provider).map(|handle| &handle.auth)
    }

    /// Profile of the account `provider` is authorized as.
    ///
    /// Fetched with a fresh access token, so a successful call also confirms
    /// the authorization still works.
    #[instrument(skip(self), fields(provider = %provider))]
    pub async fn viewer(&self, provider: ProviderKind) -> crate::Result<RemoteViewer> {
        let handle = self
            .providers
            .get(&provider)
            .ok_or_else(|| SyncError::NotConfigured(provider.as_str().to_string()))?;

        let access_token = handle.auth.current_access_token().await?;
        let viewer = handle.tracker.fetch_viewer(&access_token).await?;
        debug!(viewer = %viewer.name, "Fetched viewer profile");
        Ok(viewer)
    }

    /// Reconcile one title against one provider.
    #[instrument(skip(self, title, local_episodes), fields(provider = %provider, title = %title.name))]
    pub async fn sync(
        &self,
        provider: ProviderKind,
        title: &TrackedTitle,
        local_episodes: &[EpisodeProgress],
        is_final_season: bool,
    ) -> SyncOutcome {
        let Some(handle) = self.providers.get(&provider) else {
            return self.skipped(provider, title, SkipReason::NotConfigured);
        };

        if !handle.auth.is_authorized().await {
            return self.skipped(provider, title, SkipReason::NotAuthorized);
        }

        self.emit(SyncEvent::Started {
            provider: provider.as_str().to_string(),
            title: title.name.clone(),
        });

        let access_token = match handle.auth.current_access_token().await {
            Ok(token) => token,
            Err(e) if e == AuthError::Unauthorized || e.is_refresh_failure() => {
                return self.skipped(provider, title, SkipReason::AuthFailed(e));
            }
            Err(e) => return self.failed(provider, title, SyncError::Auth(e)),
        };

        let remote = match handle.tracker.fetch_entry(&access_token, title).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return self.skipped(provider, title, SkipReason::NotTracked),
            Err(SyncError::NotTracked { .. }) => {
                return self.skipped(provider, title, SkipReason::NotTracked)
            }
            Err(e) => return self.failed(provider, title, e),
        };

        let decision = ReconciliationEngine::decide(local_episodes, is_final_season, &remote);
        debug!(
            remote_count = remote.watched_count,
            remote_status = %remote.status,
            action = decision.action(),
            "Computed sync decision"
        );

        if let Err(e) = self
            .engine
            .apply(&decision, handle.tracker.as_ref(), &access_token, title, &remote)
            .await
        {
            return self.failed(provider, title, e);
        }

        info!(action = decision.action(), affected = decision.affected(), "Sync applied");
        self.emit(SyncEvent::Applied {
            provider: provider.as_str().to_string(),
            title: title.name.clone(),
            action: decision.action().to_string(),
            affected: decision.affected(),
        });
        SyncOutcome::Applied(decision)
    }

    /// Reconcile one title against every registered provider concurrently.
    ///
    /// A failure for one provider never affects the others.
    pub async fn sync_all(
        &self,
        title: &TrackedTitle,
        local_episodes: &[EpisodeProgress],
        is_final_season: bool,
    ) -> Vec<(ProviderKind, SyncOutcome)> {
        let syncs = self.providers.keys().map(|&provider| async move {
            let outcome = self
                .sync(provider, title, local_episodes, is_final_season)
                .await;
            (provider, outcome)
        });
        join_all(syncs).await
    }

    fn skipped(&self, provider: ProviderKind, title: &TrackedTitle, reason: SkipReason) -> SyncOutcome {
        debug!(provider = %provider, title = %title.name, reason = %reason, "Sync skipped");
        self.emit(SyncEvent::Skipped {
            provider: provider.as_str().to_string(),
            title: title.name.clone(),
            reason: reason.to_string(),
        });
        SyncOutcome::Skipped(reason)
    }

    fn failed(&self, provider: ProviderKind, title: &TrackedTitle, error: SyncError) -> SyncOutcome {
        warn!(provider = %provider, title = %title.name, error = %error, "Sync failed");
        self.emit(SyncEvent::Failed {
            provider: provider.as_str().to_string(),
            title: title.name.clone(),
            message: error.to_string(),
            recoverable: error.is_recoverable(),
        });
        SyncOutcome::Failed(error)
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.event_bus.emit(CoreEvent::Sync(event));
    }
}
