//! Shared fetch layer: transport, response cache and the fetcher adapters use
//!
//! The cache is an explicit object handed to the [`Fetcher`]; nothing here is
//! process-global. Entries are keyed by the exact request identity (URL plus
//! an optional caller-chosen suffix), grow without bound and never expire.
//! There is no retry or backoff: a failed request is returned as-is and is
//! not cached.

use crate::error::FetchError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

const USER_AGENT: &str = concat!("nrs-enrich/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Cache
// ============================================================================

/// Exact request identity: URL followed by an optional suffix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(url: &str, suffix: &str) -> Self {
        Self(format!("{}{}", url, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Response body plus where the request ended up after redirects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResponse {
    pub text: String,
    pub url: String,
    pub redirected: bool,
}

pub trait ResponseCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<FetchedResponse>;
    fn insert(&self, key: CacheKey, response: FetchedResponse);
}

/// Unbounded in-memory cache living for one run
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, FetchedResponse>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<FetchedResponse> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn insert(&self, key: CacheKey, response: FetchedResponse) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, response);
    }
}

/// Cache that never remembers anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl ResponseCache for NoopCache {
    fn get(&self, _key: &CacheKey) -> Option<FetchedResponse> {
        None
    }

    fn insert(&self, _key: CacheKey, _response: FetchedResponse) {}
}

// ============================================================================
// Transport
// ============================================================================

/// One outgoing GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    /// Bearer token for gated sources
    pub bearer: Option<String>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bearer: None,
        }
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &FetchRequest) -> Result<FetchedResponse, FetchError>;
}

/// reqwest-backed transport (follows redirects)
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &FetchRequest) -> Result<FetchedResponse, FetchError> {
        let mut builder = self.client.get(&request.url);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| FetchError::Transport {
            url: request.url.clone(),
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: request.url.clone(),
                status: response.status().as_u16(),
            });
        }

        let url = response.url().to_string();
        let redirected = url != request.url;
        let text = response.text().await.map_err(|e| FetchError::Decode {
            url: request.url.clone(),
            message: e.to_string(),
        })?;

        Ok(FetchedResponse {
            text,
            url,
            redirected,
        })
    }
}

// ============================================================================
// Fetcher
// ============================================================================

/// Transport plus cache; cheap to clone and share between adapters
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    cache: Arc<dyn ResponseCache>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<dyn ResponseCache>) -> Self {
        Self { transport, cache }
    }

    /// HTTP transport with a fresh in-memory cache
    pub fn http() -> Result<Self, FetchError> {
        Ok(Self::new(
            Arc::new(HttpTransport::new()?),
            Arc::new(MemoryCache::new()),
        ))
    }

    /// Fetch through the cache. The suffix only distinguishes cache entries;
    /// it is never sent.
    pub async fn fetch(
        &self,
        request: &FetchRequest,
        suffix: &str,
    ) -> Result<FetchedResponse, FetchError> {
        let key = CacheKey::new(&request.url, suffix);
        if let Some(hit) = self.cache.get(&key) {
            debug!("Cache hit: {}", key.as_str());
            return Ok(hit);
        }

        debug!("Fetching {}", request.url);
        let response = self.transport.send(request).await?;
        self.cache.insert(key, response.clone());
        Ok(response)
    }

    /// Body plus final URL, for callers that care about redirects
    pub async fn fetch_full(&self, url: &str, suffix: &str) -> Result<FetchedResponse, FetchError> {
        self.fetch(&FetchRequest::get(url), suffix).await
    }

    pub async fn fetch_text(&self, url: &str, suffix: &str) -> Result<String, FetchError> {
        Ok(self.fetch_full(url, suffix).await?.text)
    }

    /// Fetch and decode a JSON body, optionally with a bearer token
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        bearer: Option<&str>,
    ) -> Result<T, FetchError> {
        let mut request = FetchRequest::get(url);
        if let Some(token) = bearer {
            request = request.with_bearer(token);
        }
        let response = self.fetch(&request, "").await?;
        serde_json::from_str(&response.text).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Final URL after following redirects
    pub async fn redirect(&self, url: &str) -> Result<String, FetchError> {
        Ok(self.fetch_full(url, "").await?.url)
    }
}

/// Append query parameters to `base`, skipping absent values
pub fn build_url(base: &str, params: &[(&str, Option<&str>)]) -> Result<String, FetchError> {
    let mut url = reqwest::Url::parse(base).map_err(|e| FetchError::InvalidUrl {
        url: base.to_string(),
        message: e.to_string(),
    })?;

    let present: Vec<_> = params
        .iter()
        .filter_map(|(key, value)| value.map(|v| (*key, v)))
        .collect();
    if !present.is_empty() {
        url.query_pairs_mut().extend_pairs(present);
    }
    Ok(url.to_string())
}
