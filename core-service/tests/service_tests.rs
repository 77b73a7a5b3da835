use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::progress::LocalProgressWriter;
use bridge_traits::storage::CredentialStore;
use bytes::Bytes;
use chrono::{Duration as ChronoDuration, Utc};
use core_auth::{AuthState, AuthStatus, ProviderKind};
use core_runtime::config::{CoreConfig, ProviderConfig};
use core_service::{CoreError, CoreService};
use core_sync::{
    EpisodeProgress, SyncDecision, SyncError, SyncOutcome, TrackedTitle, TrackerStatus,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct ScriptedHttp {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttp {
    fn replying(bodies: &[(u16, &str)]) -> Arc<Self> {
        let responses = bodies
            .iter()
            .map(|(status, body)| HttpResponse {
                status: *status,
                headers: HashMap::new(),
                body: Bytes::from(body.to_string()),
            })
            .collect();
        Arc::new(Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn body(&self, index: usize) -> String {
        let requests = self.requests();
        String::from_utf8(requests[index].body.clone().unwrap_or_default().to_vec()).unwrap()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BridgeError::OperationFailed("unexpected request".to_string()))
    }
}

#[derive(Default)]
struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    fn with(provider: &str, state: &str) -> Arc<Self> {
        let store = Self::default();
        store
            .entries
            .lock()
            .unwrap()
            .insert(provider.to_string(), state.to_string());
        Arc::new(store)
    }

    fn get(&self, provider: &str) -> String {
        self.entries
            .lock()
            .unwrap()
            .get(provider)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn load_auth_state(&self, provider: &str) -> BridgeResult<String> {
        Ok(self.get(provider))
    }

    async fn save_auth_state(&self, provider: &str, state: &str) -> BridgeResult<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(provider.to_string(), state.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct NoopWriter;

#[async_trait]
impl LocalProgressWriter for NoopWriter {
    async fn mark_fully_watched(&self, _series: &str, _episode_ordinal: u32) -> BridgeResult<()> {
        Ok(())
    }
}

fn stored_tokens(access_token: &str) -> String {
    AuthState {
        access_token: Some(access_token.to_string()),
        refresh_token: Some("refresh".to_string()),
        expires_at: Some(Utc::now() + ChronoDuration::hours(1)),
        ..AuthState::default()
    }
    .to_json()
    .unwrap()
}

fn anilist_only(http: Arc<ScriptedHttp>, store: Arc<MemoryStore>) -> CoreConfig {
    CoreConfig::builder()
        .http_client(http)
        .credential_store(store)
        .anilist(ProviderConfig::anilist("42", "secret"))
        .build()
        .unwrap()
}

fn watched(count: u32) -> Vec<EpisodeProgress> {
    (1..=count)
        .map(|ordinal| EpisodeProgress::new(ordinal, 96_000, 100_000))
        .collect()
}

#[tokio::test]
async fn only_configured_providers_are_registered() {
    let http = ScriptedHttp::replying(&[]);
    let config = anilist_only(http, Arc::new(MemoryStore::default()));

    let core = CoreService::bootstrap(config, Arc::new(NoopWriter)).await.unwrap();

    assert_eq!(core.providers(), vec![ProviderKind::AniList]);
    assert!(matches!(
        core.auth(ProviderKind::MyAnimeList),
        Err(CoreError::ProviderNotConfigured(ProviderKind::MyAnimeList))
    ));
}

#[tokio::test]
async fn bootstrap_rehydrates_stored_tokens() {
    let store = MemoryStore::with("anilist", &stored_tokens("stored"));
    let config = anilist_only(ScriptedHttp::replying(&[]), store);

    let core = CoreService::bootstrap(config, Arc::new(NoopWriter)).await.unwrap();

    assert_eq!(
        core.auth_status(ProviderKind::AniList).await.unwrap(),
        AuthStatus::Authorized
    );
}

#[tokio::test]
async fn unreadable_stored_state_starts_empty() {
    let store = MemoryStore::with("anilist", "{not json");
    let config = anilist_only(ScriptedHttp::replying(&[]), store);

    let core = CoreService::bootstrap(config, Arc::new(NoopWriter)).await.unwrap();

    assert_eq!(
        core.auth_status(ProviderKind::AniList).await.unwrap(),
        AuthStatus::Empty
    );
}

#[tokio::test]
async fn redirect_completes_myanimelist_authorization() {
    let http = ScriptedHttp::replying(&[(
        200,
        r#"{"token_type":"Bearer","access_token":"mal-access","refresh_token":"mal-refresh","expires_in":2678400}"#,
    )]);
    let store = Arc::new(MemoryStore::default());
    let config = CoreConfig::builder()
        .http_client(http.clone())
        .credential_store(store.clone())
        .myanimelist(ProviderConfig::myanimelist("mal-client"))
        .build()
        .unwrap();
    let core = CoreService::bootstrap(config, Arc::new(NoopWriter)).await.unwrap();

    let request = core
        .begin_authorization(ProviderKind::MyAnimeList)
        .await
        .unwrap();
    assert!(request.url.contains("code_challenge_method=plain"));

    let redirect = format!("{}?code=auth-code&state={}", request.redirect_uri, request.state);
    core.complete_authorization_from_redirect(ProviderKind::MyAnimeList, &redirect)
        .await
        .unwrap();

    assert_eq!(
        core.auth_status(ProviderKind::MyAnimeList).await.unwrap(),
        AuthStatus::Authorized
    );
    assert!(http.body(0).contains("code=auth-code"));
    assert!(store.get("myanimelist").contains("mal-access"));
}

#[tokio::test]
async fn malformed_redirect_is_a_bridge_error() {
    let config = anilist_only(ScriptedHttp::replying(&[]), Arc::new(MemoryStore::default()));
    let core = CoreService::bootstrap(config, Arc::new(NoopWriter)).await.unwrap();
    core.begin_authorization(ProviderKind::AniList).await.unwrap();

    let err = core
        .complete_authorization_from_redirect(ProviderKind::AniList, "not a url")
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Bridge(_)));
}

#[tokio::test]
async fn sync_pushes_local_progress_to_anilist() {
    let http = ScriptedHttp::replying(&[
        (
            200,
            r#"{"data":{"Media":{"id":21,"mediaListEntry":{"id":9,"progress":1,"status":"CURRENT"}}}}"#,
        ),
        (
            200,
            r#"{"data":{"SaveMediaListEntry":{"id":9,"progress":3,"status":"COMPLETED"}}}"#,
        ),
    ]);
    let store = MemoryStore::with("anilist", &stored_tokens("stored"));
    let core = CoreService::bootstrap(anilist_only(http.clone(), store), Arc::new(NoopWriter))
        .await
        .unwrap();
    let title = TrackedTitle::new("series-1", "Mob Psycho 100").with_anilist_id(21);

    let outcome = core
        .sync(ProviderKind::AniList, &title, &watched(3), true)
        .await;

    assert_eq!(
        outcome,
        SyncOutcome::Applied(SyncDecision::PushLocalToRemote {
            new_count: 3,
            new_status: TrackerStatus::Completed,
        })
    );
    let requests = http.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[1].headers.get("Authorization").map(String::as_str),
        Some("Bearer stored")
    );
    assert!(http.body(1).contains("\"status\":\"COMPLETED\""));
}

#[tokio::test]
async fn logout_clears_stored_state() {
    let store = MemoryStore::with("anilist", &stored_tokens("stored"));
    let config = anilist_only(ScriptedHttp::replying(&[]), store.clone());
    let core = CoreService::bootstrap(config, Arc::new(NoopWriter)).await.unwrap();

    core.logout(ProviderKind::AniList).await.unwrap();

    assert_eq!(
        core.auth_status(ProviderKind::AniList).await.unwrap(),
        AuthStatus::Empty
    );
    assert_eq!(store.get("anilist"), "");
}

#[tokio::test]
async fn viewer_uses_stored_anilist_token() {
    let http = ScriptedHttp::replying(&[(
        200,
        r#"{"data":{"Viewer":{"id":31,"name":"mika","avatar":null}}}"#,
    )]);
    let store = MemoryStore::with("anilist", &stored_tokens("stored"));
    let core = CoreService::bootstrap(anilist_only(http.clone(), store), Arc::new(NoopWriter))
        .await
        .unwrap();

    let viewer = core.viewer(ProviderKind::AniList).await.unwrap();

    assert_eq!(viewer.id, 31);
    assert_eq!(viewer.name, "mika");
    assert_eq!(viewer.avatar_url, None);
    assert_eq!(
        http.requests()[0].headers.get("Authorization").map(String::as_str),
        Some("Bearer stored")
    );
}

#[tokio::test]
async fn viewer_without_sign_in_is_unauthorized() {
    let http = ScriptedHttp::replying(&[]);
    let config = anilist_only(http.clone(), Arc::new(MemoryStore::default()));
    let core = CoreService::bootstrap(config, Arc::new(NoopWriter)).await.unwrap();

    let err = core.viewer(ProviderKind::AniList).await.unwrap_err();

    assert!(matches!(
        err,
        CoreError::Sync(SyncError::Auth(core_auth::AuthError::Unauthorized))
    ));
    assert!(matches!(
        core.viewer(ProviderKind::MyAnimeList).await,
        Err(CoreError::ProviderNotConfigured(ProviderKind::MyAnimeList))
    ));
    assert!(http.requests().is_empty());
}
