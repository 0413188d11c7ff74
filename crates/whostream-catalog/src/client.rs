//! Catalog API client
//!
//! [`CatalogClient`] wraps a `reqwest::Client` with the endpoint set, the
//! bearer token obtained by [`CatalogClient::authenticate`] and a
//! [`RetryPolicy`] that every request goes through. Listings are walked
//! page by page with [`paginate`] until the server stops returning a
//! cursor.

use crate::model::{Category, LiveStream, Page, Token};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use whostream_core::error::{Result, WhoStreamError};
use whostream_core::retry::{ExponentialBackoff, RetryPolicy};
use whostream_core::types::CategoryId;

/// Production API base
pub const DEFAULT_API_BASE: &str = "https://api.twitch.tv/helix/";

/// Production token endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";

/// Page size requested from listing endpoints
pub const PAGE_SIZE: u32 = 100;

/// Limit on a whole request, body included
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(100);

/// Limit on establishing a connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("whostream/", env!("CARGO_PKG_VERSION"));

/// Application credentials for the client-credentials grant
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Where the catalog lives
#[derive(Debug, Clone)]
pub struct CatalogEndpoints {
    /// Base URL that relative API paths are joined onto; must end in `/`
    pub api_base: Url,
    /// OAuth2 token endpoint
    pub token_url: Url,
}

impl CatalogEndpoints {
    pub fn new(api_base: &str, token_url: &str) -> Result<Self> {
        let parse = |raw: &str| {
            Url::parse(raw).map_err(|e| WhoStreamError::Config(format!("invalid URL '{raw}': {e}")))
        };
        Ok(Self {
            api_base: parse(api_base)?,
            token_url: parse(token_url)?,
        })
    }

    fn api_url(&self, path: &str) -> Result<Url> {
        self.api_base
            .join(path)
            .map_err(|e| WhoStreamError::Config(format!("invalid API path '{path}': {e}")))
    }
}

impl Default for CatalogEndpoints {
    fn default() -> Self {
        Self {
            api_base: Url::parse(DEFAULT_API_BASE).expect("default API base is a valid URL"),
            token_url: Url::parse(DEFAULT_TOKEN_URL).expect("default token URL is a valid URL"),
        }
    }
}

/// The retry policy used for every catalog request
///
/// Ten attempts, an immediate first retry, then 100ms doubling. Only
/// transport failures are retried.
pub fn network_retry_policy() -> RetryPolicy<WhoStreamError> {
    RetryPolicy::new(ExponentialBackoff::new(Duration::from_millis(100)), 10)
        .with_transient(WhoStreamError::is_transient)
}

#[derive(Clone)]
struct Authorization {
    client_id: String,
    bearer: String,
}

/// Authenticated client for the live-stream catalog
pub struct CatalogClient {
    http: reqwest::Client,
    endpoints: CatalogEndpoints,
    retry: RetryPolicy<WhoStreamError>,
    auth: Option<Authorization>,
}

impl CatalogClient {
    /// Client for the production endpoints
    pub fn new() -> Result<Self> {
        Self::with_endpoints(CatalogEndpoints::default())
    }

    pub fn with_endpoints(endpoints: CatalogEndpoints) -> Result<Self> {
        Ok(Self {
            http: build_http(DEFAULT_REQUEST_TIMEOUT)?,
            endpoints,
            retry: network_retry_policy(),
            auth: None,
        })
    }

    /// Replace the per-request timeout
    ///
    /// A request that times out fails with [`WhoStreamError::Transport`]
    /// and is retried like any other transport failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http = build_http(timeout)?;
        Ok(self)
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy<WhoStreamError>) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    /// Obtain an app access token
    ///
    /// The token endpoint is retried like any other request. A response
    /// that does not carry an access token fails with
    /// [`WhoStreamError::InvalidToken`] and is not retried.
    pub async fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        let mut url = self.endpoints.token_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &credentials.client_id)
            .append_pair("client_secret", &credentials.client_secret)
            .append_pair("grant_type", "client_credentials");

        // The query carries the secret; errors and logs only show the endpoint
        let label = self.endpoints.token_url.to_string();
        let body = self.retried_text(Method::POST, url, label, false).await?;

        let token: Token = serde_json::from_str(&body)
            .map_err(|e| WhoStreamError::InvalidToken(e.to_string()))?;
        if token.access_token.trim().is_empty() {
            return Err(WhoStreamError::InvalidToken(
                "the token endpoint returned an empty access token".to_string(),
            ));
        }

        debug!("Obtained access token valid for {}s", token.expires_in);
        self.auth = Some(Authorization {
            client_id: credentials.client_id.clone(),
            bearer: token.access_token,
        });
        Ok(())
    }

    /// Find categories whose name matches `query`
    pub async fn search_categories(&self, query: &str) -> Result<Vec<Category>> {
        self.require_auth()?;
        let params = &[("query", query)];
        let categories = paginate(move |cursor| {
            self.fetch_page::<Category>("search/categories", params, cursor)
        })
        .await?;

        info!("Found {} categories matching '{}'", categories.len(), query);
        Ok(categories)
    }

    /// Look up a single category
    pub async fn get_category_by_id(&self, id: &CategoryId) -> Result<Category> {
        self.require_auth()?;
        let mut url = self.endpoints.api_url("games")?;
        url.query_pairs_mut().append_pair("id", id.as_str());

        let page: Page<Category> = self.get_json(url).await?;
        page.into_data()
            .into_iter()
            .next()
            .ok_or_else(|| WhoStreamError::CategoryNotFound(id.to_string()))
    }

    /// Every stream currently live in `category_id`, one entry per streamer
    ///
    /// Pages can shift while they are walked, so a streamer may show up more
    /// than once; only the entry with the most viewers is kept.
    pub async fn list_live_streams(&self, category_id: &CategoryId) -> Result<Vec<LiveStream>> {
        self.require_auth()?;
        let params = &[("game_id", category_id.as_str())];
        let streams = paginate(move |cursor| {
            self.fetch_page::<LiveStream>("streams", params, cursor)
        })
        .await?;

        let fetched = streams.len();
        let streams = dedup_streams(streams);
        if streams.len() < fetched {
            debug!("Dropped {} duplicate stream entries", fetched - streams.len());
        }
        info!("{} streams live in category {}", streams.len(), category_id);
        Ok(streams)
    }

    /// Download an image, filling in the size placeholders of `url_template`
    pub async fn fetch_image(&self, url_template: &str, width: u32, height: u32) -> Result<Vec<u8>> {
        let raw = url_template
            .replace("{width}", &width.to_string())
            .replace("{height}", &height.to_string());
        let url = Url::parse(&raw)
            .map_err(|e| WhoStreamError::InvalidArgument(format!("invalid image URL '{raw}': {e}")))?;

        let label = url.to_string();
        let url = &url;
        let label = label.as_str();
        self.retry
            .execute_observed(
                move || self.fetch_bytes(url, label),
                |attempt, wait, error| self.log_retry(label, attempt, wait, error),
            )
            .await
    }

    fn require_auth(&self) -> Result<()> {
        if self.auth.is_some() {
            Ok(())
        } else {
            Err(WhoStreamError::NotAuthenticated)
        }
    }

    async fn fetch_page<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        cursor: Option<String>,
    ) -> Result<Page<T>> {
        let mut url = self.endpoints.api_url(path)?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            query.append_pair("first", &PAGE_SIZE.to_string());
            if let Some(cursor) = &cursor {
                query.append_pair("after", cursor);
            }
        }
        self.get_json(url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let label = url.to_string();
        let body = self.retried_text(Method::GET, url, label, true).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn retried_text(
        &self,
        method: Method,
        url: Url,
        label: String,
        authorized: bool,
    ) -> Result<String> {
        let url = &url;
        let label = label.as_str();
        self.retry
            .execute_observed(
                move || self.fetch_text(method.clone(), url, label, authorized),
                |attempt, wait, error| self.log_retry(label, attempt, wait, error),
            )
            .await
    }

    fn log_retry(&self, label: &str, attempt: u32, wait: Duration, error: &WhoStreamError) {
        warn!(
            "Request to {} failed (attempt {}/{}), retrying in {:?}: {}",
            label,
            attempt,
            self.retry.max_attempts(),
            wait,
            error
        );
    }

    async fn send(
        &self,
        method: Method,
        url: &Url,
        label: &str,
        authorized: bool,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .request(method, url.clone())
            .header(reqwest::header::ACCEPT, "application/json");
        if authorized && let Some(auth) = &self.auth {
            request = request
                .bearer_auth(&auth.bearer)
                .header("Client-Id", &auth.client_id);
        }

        let response = request.send().await.map_err(|source| WhoStreamError::Transport {
            url: label.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WhoStreamError::Http {
                url: label.to_string(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }
        Ok(response)
    }

    async fn fetch_text(
        &self,
        method: Method,
        url: &Url,
        label: &str,
        authorized: bool,
    ) -> Result<String> {
        let response = self.send(method, url, label, authorized).await?;
        response.text().await.map_err(|source| WhoStreamError::Transport {
            url: label.to_string(),
            source,
        })
    }

    async fn fetch_bytes(&self, url: &Url, label: &str) -> Result<Vec<u8>> {
        let response = self.send(Method::GET, url, label, false).await?;
        let bytes = response.bytes().await.map_err(|source| WhoStreamError::Transport {
            url: label.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}

fn build_http(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(timeout.min(DEFAULT_CONNECT_TIMEOUT))
        .build()
        .map_err(|e| WhoStreamError::Config(format!("failed to build HTTP client: {e}")))
}

/// Walk a cursor-paginated listing to the end
///
/// `fetch_page` receives the cursor of the previous page (`None` for the
/// first). Items are returned in page order. Walking stops when a page has
/// no cursor, or when the server hands back a cursor that was already
/// followed.
pub async fn paginate<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut seen_cursors = HashSet::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = fetch_page(cursor.take()).await?;
        pages += 1;
        let next = page.next_cursor().map(str::to_owned);
        items.extend(page.into_data());

        match next {
            Some(next) if seen_cursors.insert(next.clone()) => cursor = Some(next),
            Some(next) => {
                warn!("Server repeated pagination cursor {}, stopping", next);
                break;
            }
            None => break,
        }
    }

    debug!("Fetched {} items over {} pages", items.len(), pages);
    Ok(items)
}

/// Keep one entry per streamer, the one with the most viewers
///
/// The result is ordered by viewers, highest first. Among equal counts the
/// entry that arrived first wins and keeps its relative position.
pub fn dedup_streams(mut streams: Vec<LiveStream>) -> Vec<LiveStream> {
    streams.sort_by(|a, b| b.viewer_count.cmp(&a.viewer_count));
    let mut seen = HashSet::new();
    streams.retain(|s| seen.insert(s.user_id.clone()));
    streams
}
