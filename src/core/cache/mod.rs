pub mod classify;
mod store;

pub use classify::{Destination, TrafficClass, classify};
pub use store::{CacheStore, CachedResponse, Partition};

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Result, anyhow};
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::core::config::Config;

/// 1×1 fully transparent PNG, served when an image cannot be fetched and
/// has no cached copy.
const TRANSPARENT_PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x62, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Out-of-band control signals from the host surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Activate immediately, skipping any waiting period.
    SkipWaiting,
    /// Full purge of every partition, all versions.
    ClearCache,
}

/// A GET (or other) request seen by the router.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: reqwest::Method,
    pub url: Url,
    pub destination: Destination,
}

impl FetchRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: reqwest::Method::GET,
            url,
            destination: Destination::Unknown,
        }
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Origin the shell file list is resolved against.
    pub origin: String,
    pub api_prefix: String,
    pub shell_files: Vec<String>,
    pub api_wait: Duration,
    pub media_wait: Duration,
    /// Bearer token attached to outgoing fetches, when the host surface is
    /// authenticated.
    pub bearer: Option<String>,
}

impl RouterConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            origin: config.api_base_url.trim_end_matches('/').to_string(),
            api_prefix: config.api_prefix.clone(),
            shell_files: config.shell_files.clone(),
            api_wait: Duration::from_secs(config.api_wait_secs),
            media_wait: Duration::from_secs(config.media_wait_secs),
            bearer: None,
        }
    }

    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }
}

/// Routes every GET through a per-class caching strategy so previously
/// fetched content stays available offline. Non-GET requests bypass the
/// router entirely.
pub struct OfflineCacheRouter {
    http: Client,
    store: CacheStore,
    config: RouterConfig,
}

impl OfflineCacheRouter {
    pub fn new(store: CacheStore, config: RouterConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("storyweave/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            store,
            config,
        })
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Eagerly populate the shell partition with the enumerated shell files.
    /// A file that fails to fetch is skipped, not fatal; a later shell-class
    /// request will repopulate it.
    pub async fn install(&self) -> Result<usize> {
        let mut cached = 0;
        for path in &self.config.shell_files {
            let target = format!("{}{}", self.config.origin, path);
            match self.fetch(&target).await {
                Ok(response) if response.status == 200 => {
                    self.store.put(Partition::Shell, &target, &response).await?;
                    cached += 1;
                }
                Ok(response) => {
                    warn!(path, status = response.status, "Shell file skipped during install");
                }
                Err(e) => {
                    warn!(path, "Shell file unreachable during install: {}", e);
                }
            }
        }
        info!(
            cached,
            total = self.config.shell_files.len(),
            version = self.store.version(),
            "Shell partition installed"
        );
        Ok(cached)
    }

    /// Take over routing: purge every partition from a superseded version.
    /// Requests already in flight keep whatever response they raced to; new
    /// lookups only ever see the current version.
    pub async fn activate(&self) -> Result<()> {
        let purged = self.store.purge_stale().await?;
        if !purged.is_empty() {
            info!(?purged, version = self.store.version(), "Stale cache partitions purged");
        }
        Ok(())
    }

    pub async fn control(&self, message: ControlMessage) -> Result<()> {
        match message {
            ControlMessage::SkipWaiting => self.activate().await,
            ControlMessage::ClearCache => {
                self.store.clear_all().await?;
                info!("All cache partitions cleared");
                Ok(())
            }
        }
    }

    /// Route one request. GET requests always resolve to a response, never
    /// an error; non-GET requests go straight to the network and propagate
    /// failures untouched.
    pub async fn handle(&self, request: &FetchRequest) -> Result<CachedResponse> {
        if request.method != reqwest::Method::GET {
            return self.pass_through(request).await;
        }

        let class = classify(&request.url, request.destination, &self.config.api_prefix);
        debug!(url = %request.url, ?class, "Routing request");
        let response = match class {
            TrafficClass::Shell => self.shell_strategy(request).await,
            TrafficClass::Api => self.api_strategy(request).await,
            TrafficClass::Media => self.media_strategy(request).await,
            TrafficClass::Default => self.default_strategy(request).await,
        };
        Ok(response)
    }

    async fn pass_through(&self, request: &FetchRequest) -> Result<CachedResponse> {
        let builder = self
            .http
            .request(request.method.clone(), request.url.clone());
        let response = with_bearer(builder, &self.config.bearer).send().await?;
        read_response(response).await
    }

    /// Cache-first. On a miss, fetch and cache HTTP 200; on total network
    /// failure fall back to the cached root document so the single-page app
    /// can still boot.
    async fn shell_strategy(&self, request: &FetchRequest) -> CachedResponse {
        let key = request.url.as_str();
        if let Ok(Some(hit)) = self.store.get(Partition::Shell, key).await {
            return hit;
        }

        match self.fetch(key).await {
            Ok(response) => {
                if response.status == 200
                    && let Err(e) = self.store.put(Partition::Shell, key, &response).await
                {
                    warn!(key, "Failed to cache shell response: {}", e);
                }
                response
            }
            Err(e) => {
                debug!(key, "Shell fetch failed, trying cached root: {}", e);
                let root = format!("{}/", self.config.origin);
                match self.store.get(Partition::Shell, &root).await {
                    Ok(Some(document)) => document,
                    _ => offline_unavailable(),
                }
            }
        }
    }

    /// Network-first with a bounded wait. The network fetch races a timer;
    /// on timeout or failure the runtime cache answers, and with no cached
    /// entry a structured 503 is synthesized instead of a raw failure.
    async fn api_strategy(&self, request: &FetchRequest) -> CachedResponse {
        let key = request.url.as_str().to_string();
        match self.race_network(&key, self.config.api_wait).await {
            Some(response) => {
                if response.status == 200 {
                    if let Err(e) = self.store.put(Partition::Runtime, &key, &response).await {
                        warn!(key, "Failed to cache API response: {}", e);
                    }
                } else {
                    self.evict_if_gone(&key, response.status).await;
                }
                response
            }
            None => match self.store.get(Partition::Runtime, &key).await {
                Ok(Some(hit)) => {
                    debug!(key, "Serving API response from runtime cache");
                    hit
                }
                _ => offline_api_error(),
            },
        }
    }

    /// Cache-first with a longer bounded wait. Images degrade to a 1×1
    /// transparent pixel; audio and video get a plain 404.
    async fn media_strategy(&self, request: &FetchRequest) -> CachedResponse {
        let key = request.url.as_str().to_string();
        if let Ok(Some(hit)) = self.store.get(Partition::Runtime, &key).await {
            return hit;
        }

        match self.race_network(&key, self.config.media_wait).await {
            Some(response) => {
                if response.status == 200 {
                    if let Err(e) = self.store.put(Partition::Runtime, &key, &response).await {
                        warn!(key, "Failed to cache media response: {}", e);
                    }
                } else {
                    self.evict_if_gone(&key, response.status).await;
                }
                response
            }
            None => {
                if classify::wants_image_placeholder(&request.url, request.destination) {
                    CachedResponse::ok("image/png", Bytes::from_static(TRANSPARENT_PIXEL_PNG))
                } else {
                    CachedResponse {
                        status: 404,
                        content_type: "text/plain".to_string(),
                        body: Bytes::new(),
                    }
                }
            }
        }
    }

    /// Network-first, falling back to whatever is cached. No synthesis.
    async fn default_strategy(&self, request: &FetchRequest) -> CachedResponse {
        let key = request.url.as_str().to_string();
        match self.fetch(&key).await {
            Ok(response) => {
                if response.status == 200 {
                    if let Err(e) = self.store.put(Partition::Runtime, &key, &response).await {
                        warn!(key, "Failed to cache response: {}", e);
                    }
                }
                response
            }
            Err(_) => match self.store.get(Partition::Runtime, &key).await {
                Ok(Some(hit)) => hit,
                _ => offline_unavailable(),
            },
        }
    }

    /// Race the network against a timer. Exactly one outcome wins: a network
    /// result (success or error → `Some`/`None`) or the timeout (`None`).
    /// A fetch that loses the race keeps running detached and its eventual
    /// 200 is written to the runtime cache for next time, never surfaced.
    async fn race_network(&self, key: &str, wait: Duration) -> Option<CachedResponse> {
        let http = self.http.clone();
        let bearer = self.config.bearer.clone();
        let target = key.to_string();
        let mut fetch = tokio::spawn(async move {
            let response = with_bearer(http.get(&target), &bearer).send().await?;
            read_response(response).await
        });

        tokio::select! {
            joined = &mut fetch => match joined {
                Ok(Ok(response)) => Some(response),
                Ok(Err(e)) => {
                    debug!(key, "Network fetch failed: {}", e);
                    None
                }
                Err(e) => {
                    debug!(key, "Network fetch task failed: {}", e);
                    None
                }
            },
            _ = tokio::time::sleep(wait) => {
                debug!(key, "Network fetch timed out, falling back to cache");
                let store = self.store.clone();
                let key = key.to_string();
                tokio::spawn(async move {
                    // Best-effort cache write from the losing branch.
                    if let Ok(Ok(response)) = fetch.await
                        && response.status == 200
                    {
                        let _ = store.put(Partition::Runtime, &key, &response).await;
                    }
                });
                None
            }
        }
    }

    /// A resource the server reports as gone must not be replayed offline.
    async fn evict_if_gone(&self, key: &str, status: u16) {
        if status == 404 || status == 410 {
            debug!(key, status, "Evicting cached entry for removed resource");
            if let Err(e) = self.store.delete(Partition::Runtime, key).await {
                warn!(key, "Failed to evict cached entry: {}", e);
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<CachedResponse> {
        let response = with_bearer(self.http.get(url), &self.config.bearer)
            .send()
            .await?;
        read_response(response).await
    }
}

fn with_bearer(
    builder: reqwest::RequestBuilder,
    bearer: &Option<String>,
) -> reqwest::RequestBuilder {
    match bearer {
        Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
        None => builder,
    }
}

async fn read_response(response: reqwest::Response) -> Result<CachedResponse> {
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let body = response.bytes().await.map_err(|e| anyhow!("Body read failed: {}", e))?;
    Ok(CachedResponse {
        status,
        content_type,
        body,
    })
}

/// Structured offline answer for API traffic with no cached entry.
fn offline_api_error() -> CachedResponse {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let body = serde_json::json!({
        "error": "offline",
        "message": "You are offline and this data is not cached",
        "timestamp": timestamp,
    });
    CachedResponse {
        status: 503,
        content_type: "application/json".to_string(),
        body: Bytes::from(body.to_string()),
    }
}

fn offline_unavailable() -> CachedResponse {
    CachedResponse {
        status: 503,
        content_type: "text/plain".to_string(),
        body: Bytes::from_static(b"Offline and not cached"),
    }
}
