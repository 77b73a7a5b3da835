#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::progress::LocalProgressWriter;
use bridge_traits::storage::CredentialStore;
use bytes::Bytes;
use chrono::{Duration as ChronoDuration, Utc};
use core_auth::{AuthOptions, AuthState, AuthStateMachine, ProviderKind};
use core_runtime::config::ProviderConfig;
use core_runtime::events::EventBus;
use core_sync::EpisodeProgress;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Token endpoint double that replays canned responses and counts calls.
#[derive(Default)]
pub struct CannedHttp {
    responses: Mutex<VecDeque<HttpResponse>>,
    calls: AtomicUsize,
}

impl CannedHttp {
    pub fn replying(responses: Vec<HttpResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for CannedHttp {
    async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BridgeError::OperationFailed("unexpected request".to_string()))
    }
}

pub fn response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        headers: HashMap::new(),
        body: Bytes::from(body.to_string()),
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn load_auth_state(&self, provider: &str) -> BridgeResult<String> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(provider)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_auth_state(&self, provider: &str, state: &str) -> BridgeResult<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(provider.to_string(), state.to_string());
        Ok(())
    }
}

/// Records every episode marked watched; ordinals in `failing` return errors.
#[derive(Default)]
pub struct RecordingWriter {
    pub marked: Mutex<Vec<(String, u32)>>,
    failing: HashSet<u32>,
}

impl RecordingWriter {
    pub fn failing_on(ordinals: &[u32]) -> Self {
        Self {
            marked: Mutex::new(Vec::new()),
            failing: ordinals.iter().copied().collect(),
        }
    }

    pub fn marked_ordinals(&self) -> Vec<u32> {
        let mut ordinals: Vec<u32> = self.marked.lock().unwrap().iter().map(|(_, o)| *o).collect();
        ordinals.sort_unstable();
        ordinals
    }
}

#[async_trait]
impl LocalProgressWriter for RecordingWriter {
    async fn mark_fully_watched(&self, series: &str, episode_ordinal: u32) -> BridgeResult<()> {
        if self.failing.contains(&episode_ordinal) {
            return Err(BridgeError::OperationFailed(format!(
                "disk full writing {}",
                episode_ordinal
            )));
        }
        self.marked
            .lock()
            .unwrap()
            .push((series.to_string(), episode_ordinal));
        Ok(())
    }
}

/// Auth machine for `provider` rehydrated with tokens expiring in `expires_in_secs`.
pub async fn auth_machine(
    provider: ProviderKind,
    http: Arc<CannedHttp>,
    expires_in_secs: Option<i64>,
) -> AuthStateMachine {
    let config = match provider {
        ProviderKind::MyAnimeList => ProviderConfig::myanimelist("mal-client"),
        ProviderKind::AniList => ProviderConfig::anilist("42", "secret"),
    };
    let machine = AuthStateMachine::new(
        provider,
        config,
        http,
        Arc::new(MemoryStore::default()),
        EventBus::default(),
        AuthOptions::default(),
    );

    if let Some(secs) = expires_in_secs {
        let state = AuthState {
            access_token: Some(format!("{}-token", provider.as_str())),
            refresh_token: Some("refresh".to_string()),
            expires_at: Some(Utc::now() + ChronoDuration::seconds(secs)),
            ..AuthState::default()
        };
        machine.load_from(&state.to_json().unwrap()).await.unwrap();
    }
    machine
}

/// `watched.len()` episodes with ordinals from 1; `true` entries at 95%.
pub fn season(watched: &[bool]) -> Vec<EpisodeProgress> {
    watched
        .iter()
        .enumerate()
        .map(|(i, &w)| {
            let position = if w { 95_000 } else { 0 };
            EpisodeProgress::new(i as u32 + 1, position, 100_000)
        })
        .collect()
}
