//! MyAnimeList API connector implementation
//!
//! Implements the `RemoteTrackerClient` trait for MyAnimeList API v2.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_auth::ProviderKind;
use core_runtime::config::{ProviderConfig, DEFAULT_REQUEST_TIMEOUT, MAL_API_BASE_URL};
use core_sync::{
    RemoteTrackerClient, RemoteTrackerEntry, RemoteViewer, SyncError, TrackedTitle, TrackerStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{MyAnimeListError, Result};
use crate::types::{status_to_wire, AnimeNode, AnimeSearchResponse, ApiErrorBody, UserResponse};

/// Fields requested for anime resources
const ANIME_FIELDS: &str = "my_list_status";

/// Search also asks for alternative titles so English and Japanese names match
const SEARCH_FIELDS: &str = "my_list_status,alternative_titles";

/// Fields requested for the authenticated user
const USER_FIELDS: &str = "picture";

/// Search results considered when matching a title
const SEARCH_LIMIT: u32 = 10;

/// The search endpoint rejects longer queries
const MAX_QUERY_CHARS: usize = 64;

/// Attempts for read requests hitting rate limits or server errors
const MAX_READ_ATTEMPTS: u32 = 3;

/// MyAnimeList API connector
///
/// Stateless apart from the HTTP client; the access token is passed per call
/// so one connector serves every sync.
///
/// # Example
///
/// ```ignore
/// use provider_myanimelist::MyAnimeListClient;
///
/// let client = MyAnimeListClient::new(http_client);
/// let entry = client.fetch_entry(&token, &title).await?;
/// ```
pub struct MyAnimeListClient {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    request_timeout: Duration,
}

impl MyAnimeListClient {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            base_url: MAL_API_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Client pointed at the configured API base URL.
    pub fn from_config(
        http_client: Arc<dyn HttpClient>,
        config: &ProviderConfig,
        request_timeout: Duration,
    ) -> Self {
        Self::new(http_client)
            .with_base_url(config.api_base_url.clone())
            .with_request_timeout(request_timeout)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Anime by id; `None` on 404.
    #[instrument(skip(self, access_token))]
    pub async fn get_anime(&self, access_token: &str, anime_id: u64) -> Result<Option<AnimeNode>> {
        let url = format!("{}/anime/{}?fields={}", self.base_url, anime_id, ANIME_FIELDS);

        match self.get_with_retry(access_token, url).await? {
            Some(response) => response
                .json::<AnimeNode>()
                .map(Some)
                .map_err(|e| MyAnimeListError::ParseError(e.to_string())),
            None => Ok(None),
        }
    }

    /// Search result whose main or alternative title equals `name`
    /// (case-insensitive). `None` when nothing matches exactly, so progress is
    /// never written to a merely similar anime.
    #[instrument(skip(self, access_token))]
    pub async fn search_anime(&self, access_token: &str, name: &str) -> Result<Option<AnimeNode>> {
        let query: String = name.trim().chars().take(MAX_QUERY_CHARS).collect();
        let url = format!(
            "{}/anime?q={}&limit={}&fields={}",
            self.base_url,
            urlencoding::encode(&query),
            SEARCH_LIMIT,
            SEARCH_FIELDS
        );

        let Some(response) = self.get_with_retry(access_token, url).await? else {
            return Ok(None);
        };
        let results: AnimeSearchResponse = response
            .json()
            .map_err(|e| MyAnimeListError::ParseError(e.to_string()))?;

        debug!(results = results.data.len(), "Search returned");
        Ok(results
            .data
            .into_iter()
            .map(|item| item.node)
            .find(|node| node.matches_title(name)))
    }

    /// The authenticated user (`GET /users/@me`).
    #[instrument(skip(self, access_token))]
    pub async fn get_user(&self, access_token: &str) -> Result<UserResponse> {
        let url = format!("{}/users/@me?fields={}", self.base_url, USER_FIELDS);

        match self.get_with_retry(access_token, url).await? {
            Some(response) => response
                .json::<UserResponse>()
                .map_err(|e| MyAnimeListError::ParseError(e.to_string())),
            None => Err(MyAnimeListError::ApiError {
                status_code: 404,
                message: "User not found".to_string(),
            }),
        }
    }

    /// Update the user's list entry. Sent once; never retried.
    #[instrument(skip(self, access_token))]
    pub async fn update_list_status(
        &self,
        access_token: &str,
        anime_id: u64,
        watched_count: u32,
        status: TrackerStatus,
    ) -> Result<()> {
        let url = format!("{}/anime/{}/my_list_status", self.base_url, anime_id);
        let (wire_status, is_rewatching) = status_to_wire(status);
        let watched = watched_count.to_string();
        let rewatching = is_rewatching.to_string();

        let request = HttpRequest::new(HttpMethod::Patch, url)
            .bearer_token(access_token)
            .header("Accept", "application/json")
            .form(&[
                ("status", wire_status),
                ("num_watched_episodes", watched.as_str()),
                ("is_rewatching", rewatching.as_str()),
            ])
            .timeout(self.request_timeout);

        let response = self.http_client.execute(request).await?;
        if response.is_success() {
            info!(anime_id, watched_count, status = wire_status, "Updated list status");
            return Ok(());
        }

        Err(api_error(&response))
    }

    /// GET with backoff on 429 and 5xx. `Ok(None)` on 404.
    async fn get_with_retry(&self, access_token: &str, url: String) -> Result<Option<HttpResponse>> {
        let mut attempt = 0;

        loop {
            let request = HttpRequest::new(HttpMethod::Get, url.clone())
                .bearer_token(access_token)
                .header("Accept", "application/json")
                .timeout(self.request_timeout);

            let outcome = self.http_client.execute(request).await;
            attempt += 1;

            let response = match outcome {
                Ok(response) if response.is_success() => return Ok(Some(response)),
                Ok(response) if response.status == 404 => return Ok(None),
                Ok(response) if response.status == 401 => {
                    return Err(MyAnimeListError::AuthenticationFailed(describe(&response)))
                }
                Ok(response) => response,
                Err(e) => {
                    if attempt >= MAX_READ_ATTEMPTS {
                        warn!(attempts = attempt, error = %e, "API request failed");
                        return Err(e.into());
                    }
                    backoff(attempt).await;
                    continue;
                }
            };

            let retryable = response.status == 429 || response.is_server_error();
            if !retryable || attempt >= MAX_READ_ATTEMPTS {
                warn!(status = response.status, attempts = attempt, "API request failed");
                return Err(api_error(&response));
            }
            warn!(
                status = response.status,
                attempt, "API request failed, retrying"
            );
            backoff(attempt).await;
        }
    }
}

async fn backoff(attempt: u32) {
    let delay = Duration::from_millis(100u64 * 2u64.pow(attempt));
    tokio::time::sleep(delay).await;
}

fn describe(response: &HttpResponse) -> String {
    match response.json::<ApiErrorBody>() {
        Ok(body) => match body.message {
            Some(message) if !message.is_empty() => format!("{}: {}", body.error, message),
            _ => body.error,
        },
        Err(_) => String::from_utf8_lossy(&response.body).to_string(),
    }
}

fn api_error(response: &HttpResponse) -> MyAnimeListError {
    if response.status == 401 {
        return MyAnimeListError::AuthenticationFailed(describe(response));
    }
    MyAnimeListError::ApiError {
        status_code: response.status,
        message: describe(response),
    }
}

#[async_trait]
impl RemoteTrackerClient for MyAnimeListClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::MyAnimeList
    }

    #[instrument(skip(self, access_token, title), fields(title = %title.name))]
    async fn fetch_entry(
        &self,
        access_token: &str,
        title: &TrackedTitle,
    ) -> core_sync::Result<Option<RemoteTrackerEntry>> {
        let node = match title.myanimelist_id {
            Some(id) => self.get_anime(access_token, id).await?,
            None => self.search_anime(access_token, &title.name).await?,
        };

        match node {
            Some(node) => Ok(Some(node.into_entry()?)),
            None => {
                debug!("Title not found on MyAnimeList");
                Ok(None)
            }
        }
    }

    async fn write_entry(
        &self,
        access_token: &str,
        remote_id: u64,
        watched_count: u32,
        status: TrackerStatus,
    ) -> core_sync::Result<()> {
        self.update_list_status(access_token, remote_id, watched_count, status)
            .await
            .map_err(|e| SyncError::RemoteWriteFailed(e.to_string()))
    }

    async fn fetch_viewer(&self, access_token: &str) -> core_sync::Result<RemoteViewer> {
        Ok(self.get_user(access_token).await?.into())
    }
}
