//! AniList GraphQL connector implementation
//!
//! Implements the `RemoteTrackerClient` trait on top of the AniList GraphQL
//! endpoint. Every call is a `POST` of `{query, variables}`; HTTP status and
//! the GraphQL `errors` array are both inspected.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_auth::ProviderKind;
use core_runtime::config::{ProviderConfig, ANILIST_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
use core_sync::{
    RemoteTrackerClient, RemoteTrackerEntry, RemoteViewer, SyncError, TrackedTitle, TrackerStatus,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{AniListError, Result};
use crate::types::{
    status_to_wire, GraphQlRequest, GraphQlResponse, Media, MediaData, MediaVariables,
    NoVariables, SaveEntryData, SaveEntryVariables, Viewer, ViewerData, MEDIA_QUERY,
    SAVE_ENTRY_MUTATION, VIEWER_QUERY,
};

/// Attempts for queries hitting rate limits or server errors
const MAX_QUERY_ATTEMPTS: u32 = 3;

/// Upper bound for honoring `Retry-After`
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// AniList GraphQL connector
///
/// # Example
///
/// ```ignore
/// use provider_anilist::AniListClient;
///
/// let client = AniListClient::new(http_client);
/// client.write_entry(&token, 21, 1000, TrackerStatus::InProgress).await?;
/// ```
pub struct AniListClient {
    http_client: Arc<dyn HttpClient>,
    endpoint: String,
    request_timeout: Duration,
}

/// Whether a failed query may be retried.
enum Attempt<T> {
    Done(T),
    Retry(Duration, AniListError),
}

impl AniListClient {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            endpoint: ANILIST_API_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn from_config(
        http_client: Arc<dyn HttpClient>,
        config: &ProviderConfig,
        request_timeout: Duration,
    ) -> Self {
        Self::new(http_client)
            .with_endpoint(config.api_base_url.clone())
            .with_request_timeout(request_timeout)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Media by id or search string; `None` when AniList reports it missing.
    #[instrument(skip(self, access_token))]
    pub async fn find_media(
        &self,
        access_token: &str,
        id: Option<u64>,
        search: Option<&str>,
    ) -> Result<Option<Media>> {
        let request = GraphQlRequest {
            query: MEDIA_QUERY,
            variables: MediaVariables { id, search },
        };

        let data: Option<MediaData> = self.query(access_token, &request).await?;
        Ok(data.and_then(|d| d.media))
    }

    /// The user the access token belongs to.
    #[instrument(skip(self, access_token))]
    pub async fn viewer(&self, access_token: &str) -> Result<Viewer> {
        let request = GraphQlRequest {
            query: VIEWER_QUERY,
            variables: NoVariables {},
        };

        let data: Option<ViewerData> = self.query(access_token, &request).await?;
        data.and_then(|d| d.viewer).ok_or_else(|| {
            AniListError::ParseError("Viewer query returned no user".to_string())
        })
    }

    /// Read-only query with backoff on rate limits, server and transport errors.
    async fn query<V, T>(
        &self,
        access_token: &str,
        request: &GraphQlRequest<'_, V>,
    ) -> Result<Option<T>>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.post::<_, T>(access_token, request).await {
                Ok(Attempt::Done(data)) => return Ok(data),
                Ok(Attempt::Retry(delay, err)) if attempt < MAX_QUERY_ATTEMPTS => {
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "Query failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Ok(Attempt::Retry(_, err)) => return Err(err),
                Err(AniListError::BridgeError(e)) if attempt < MAX_QUERY_ATTEMPTS => {
                    warn!(attempt, error = %e, "Transport failure, retrying");
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Save progress and status for `media_id`. Sent once; never retried.
    #[instrument(skip(self, access_token))]
    pub async fn save_entry(
        &self,
        access_token: &str,
        media_id: u64,
        progress: u32,
        status: TrackerStatus,
    ) -> Result<()> {
        let request = GraphQlRequest {
            query: SAVE_ENTRY_MUTATION,
            variables: SaveEntryVariables {
                media_id,
                progress,
                status: status_to_wire(status),
            },
        };

        match self.post::<_, SaveEntryData>(access_token, &request).await? {
            Attempt::Done(Some(SaveEntryData { saved: Some(saved) })) => {
                info!(
                    media_id,
                    entry_id = saved.id,
                    progress = ?saved.progress,
                    status = ?saved.status,
                    "Saved list entry"
                );
                Ok(())
            }
            Attempt::Done(_) => Err(AniListError::ParseError(
                "SaveMediaListEntry returned no entry".to_string(),
            )),
            Attempt::Retry(_, err) => Err(err),
        }
    }

    async fn post<V, T>(
        &self,
        access_token: &str,
        body: &GraphQlRequest<'_, V>,
    ) -> Result<Attempt<Option<T>>>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        let request = HttpRequest::new(HttpMethod::Post, self.endpoint.clone())
            .bearer_token(access_token)
            .header("Accept", "application/json")
            .json(body)?
            .timeout(self.request_timeout);

        let response = self.http_client.execute(request).await?;
        let status = response.status;

        if status == 429 {
            let retry_after = retry_after(&response);
            return Ok(Attempt::Retry(
                retry_after.min(MAX_RETRY_AFTER),
                AniListError::RateLimitExceeded {
                    retry_after_seconds: retry_after.as_secs(),
                },
            ));
        }
        if response.is_server_error() {
            return Ok(Attempt::Retry(
                backoff(1),
                AniListError::ApiError {
                    status_code: status,
                    message: String::from_utf8_lossy(&response.body).to_string(),
                },
            ));
        }

        let parsed: GraphQlResponse<T> = match response.json() {
            Ok(parsed) => parsed,
            Err(e) if response.is_success() => {
                return Err(AniListError::ParseError(e.to_string()))
            }
            Err(_) => {
                return Err(AniListError::ApiError {
                    status_code: status,
                    message: String::from_utf8_lossy(&response.body).to_string(),
                })
            }
        };

        if parsed.errors.is_empty() && response.is_success() {
            return Ok(Attempt::Done(parsed.data));
        }

        let message = parsed
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");

        if status == 404 || parsed.errors.iter().any(|e| e.status == Some(404)) {
            debug!(message = %message, "Media not found");
            return Ok(Attempt::Done(None));
        }
        if status == 401 || message.to_ascii_lowercase().contains("invalid token") {
            return Err(AniListError::AuthenticationFailed(message));
        }
        if response.is_success() {
            return Err(AniListError::GraphQl(message));
        }
        Err(AniListError::ApiError {
            status_code: status,
            message,
        })
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(100u64 * 2u64.pow(attempt))
}

fn retry_after(response: &HttpResponse) -> Duration {
    response
        .header("Retry-After")
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| backoff(1))
}

#[async_trait]
impl RemoteTrackerClient for AniListClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::AniList
    }

    #[instrument(skip(self, access_token, title), fields(title = %title.name))]
    async fn fetch_entry(
        &self,
        access_token: &str,
        title: &TrackedTitle,
    ) -> core_sync::Result<Option<RemoteTrackerEntry>> {
        let media = match title.anilist_id {
            Some(id) => self.find_media(access_token, Some(id), None).await?,
            None => self
                .find_media(access_token, None, Some(title.name.trim()))
                .await?,
        };

        match media {
            Some(media) => Ok(Some(media.into_entry()?)),
            None => Ok(None),
        }
    }

    async fn write_entry(
        &self,
        access_token: &str,
        remote_id: u64,
        watched_count: u32,
        status: TrackerStatus,
    ) -> core_sync::Result<()> {
        self.save_entry(access_token, remote_id, watched_count, status)
            .await
            .map_err(|e| SyncError::RemoteWriteFailed(e.to_string()))
    }

    async fn fetch_viewer(&self, access_token: &str) -> core_sync::Result<RemoteViewer> {
        Ok(self.viewer(access_token).await?.into())
    }
}
