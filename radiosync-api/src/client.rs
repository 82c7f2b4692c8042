use crate::error::{ApiError, Result};
use crate::token::{StaticTokenProvider, TokenProvider};
use async_trait::async_trait;
use radiosync_core::{
    endpoints, CoreError, HttpConfig, RadioConfig, SongRecord, SongView, StatusRecord,
    StatusSnapshot, StatusSource,
};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const LIBRARY_PATH: &str = "/api/library/";
const SEARCH_PATH: &str = "/api/search/";

const USER_AGENT: &str = concat!("radiosync/", env!("CARGO_PKG_VERSION"));

/// One hit from `POST /api/search/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub external_id: String,
    #[serde(default)]
    pub preview_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

#[derive(Serialize)]
struct DownloadRequest<'a> {
    external_id: &'a str,
    enqueue: bool,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    provider: &'a str,
}

#[derive(Serialize)]
struct VoteRequest {
    vote: VoteDirection,
}

/// Client for the radio backend's REST API.
///
/// Status and playlist reads go out once, with no retry: the sync channel's
/// next trigger is the retry. Mutating calls are authenticated and wrapped in
/// exponential-backoff retry middleware.
pub struct RadioApiClient {
    status_url: Url,
    playlist_url: Url,
    base: Url,
    reads: reqwest::Client,
    writes: ClientWithMiddleware,
    token: Option<Arc<dyn TokenProvider>>,
}

impl RadioApiClient {
    /// Create a client for `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created or the API URLs
    /// cannot be derived from `base`.
    pub fn new(
        base: Url,
        http: &HttpConfig,
        token: Option<Arc<dyn TokenProvider>>,
    ) -> Result<Self> {
        let base_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(USER_AGENT)
            .build()?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(http.max_retries);
        let writes = ClientBuilder::new(base_client.clone())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            status_url: endpoints::status_url(&base)?,
            playlist_url: endpoints::playlist_url(&base)?,
            base,
            reads: base_client,
            writes,
            token,
        })
    }

    /// Create a client from the loaded config, using `[auth] token` if set.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is malformed or the HTTP client
    /// cannot be created.
    pub fn from_config(config: &RadioConfig) -> Result<Self> {
        let base = Url::parse(&config.server.base_url)?;
        let token = config
            .auth
            .token
            .as_ref()
            .map(|t| Arc::new(StaticTokenProvider::new(t.clone())) as Arc<dyn TokenProvider>);
        Self::new(base, &config.http, token)
    }

    /// Fetch the current and next song.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, non-success status or a body that
    /// does not decode.
    pub async fn status(&self) -> Result<StatusSnapshot> {
        let record: StatusRecord = self.get_json(&self.status_url).await?;
        Ok(record.into())
    }

    /// Fetch the queued songs in play order.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`RadioApiClient::status`].
    pub async fn playlist(&self) -> Result<Vec<SongView>> {
        let records: Vec<SongRecord> = self.get_json(&self.playlist_url).await?;
        Ok(records.into_iter().map(SongView::from).collect())
    }

    /// Add a song to the library, optionally queueing it.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is available or the request fails.
    pub async fn download(&self, external_id: &str, enqueue: bool) -> Result<()> {
        info!("Requesting download of {} (enqueue: {})", external_id, enqueue);
        let url = self.base.join(LIBRARY_PATH)?;
        self.post(&url, &DownloadRequest {
            external_id,
            enqueue,
        })
        .await?;
        Ok(())
    }

    /// Search `provider` for `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is available, the request fails, or the
    /// results do not decode.
    pub async fn search(&self, provider: &str, query: &str) -> Result<Vec<SearchResult>> {
        info!("Searching {} for {:?}", provider, query);
        let url = self.base.join(SEARCH_PATH)?;
        let body = self
            .post(&url, &SearchRequest { q: query, provider })
            .await?
            .bytes()
            .await?;
        let results: Vec<SearchResult> = serde_json::from_slice(&body)?;
        debug!("Search returned {} results", results.len());
        Ok(results)
    }

    /// Up- or downvote a song.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is available or the request fails.
    pub async fn vote(&self, external_id: &str, direction: VoteDirection) -> Result<()> {
        info!("Voting {:?} on {}", direction, external_id);
        let url = self.song_url(external_id, "vote")?;
        self.post(&url, &VoteRequest { vote: direction }).await?;
        Ok(())
    }

    /// Claim attribution for a queued song.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is available or the request fails.
    pub async fn claim(&self, external_id: &str) -> Result<()> {
        info!("Claiming {}", external_id);
        let url = self.song_url(external_id, "claim")?;
        self.post(&url, &serde_json::json!({})).await?;
        Ok(())
    }

    fn song_url(&self, external_id: &str, action: &str) -> Result<Url> {
        let path = format!(
            "/api/songs/{}/{}/",
            urlencoding::encode(external_id),
            action
        );
        Ok(self.base.join(&path)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        debug!("GET {}", url);
        let mut request = self.reads.get(url.clone());
        // Reads work anonymously; a token is only attached when one is configured
        if let Some(provider) = &self.token {
            match provider.token().await {
                Ok(token) => request = request.bearer_auth(token),
                Err(e) => debug!("Reading without a token: {}", e),
            }
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status {
                status: response.status(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn post<B: Serialize + Sync>(&self, url: &Url, body: &B) -> Result<reqwest::Response> {
        let token = match &self.token {
            Some(provider) => provider.token().await?,
            None => {
                return Err(ApiError::Token {
                    reason: "no token configured".into(),
                })
            }
        };

        debug!("POST {}", url);
        let response = self
            .writes
            .post(url.clone())
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("{} returned status: {}", url, response.status());
            return Err(ApiError::Status {
                status: response.status(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl StatusSource for RadioApiClient {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn fetch_status(&self) -> std::result::Result<StatusSnapshot, CoreError> {
        self.status().await.map_err(|e| e.into_fetch_failed("status"))
    }

    async fn fetch_playlist(&self) -> std::result::Result<Vec<SongView>, CoreError> {
        self.playlist()
            .await
            .map_err(|e| e.into_fetch_failed("playlist"))
    }
}
