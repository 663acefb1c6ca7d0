//! Content Fetcher: retrieve a payload by content identifier.
//!
//! Tiers, in order:
//!
//! 1. **Validation**: invalid or placeholder identifiers fail immediately,
//!    with no network attempt.
//! 2. **Proxy**: one bounded `GET <proxy>?cid=<cid>&as=<json|text>` returning
//!    `{ "data": … }`.
//! 3. **Gateways**: each configured gateway tried exactly once, in order.
//!    The first 2xx response whose body parses in the requested format wins.
//!
//! Only when every tier has failed does [`ContentFetcher::fetch`] return
//! [`DiscoveryError::ContentUnavailable`].

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use story_discovery_types::{
    classify, env_list, env_string_or, env_var_or, strip_cid_prefix, CidClass, DiscoveryError,
    DiscoveryResult,
};
use tracing::debug;

use crate::uri::content_locator;
use crate::DEFAULT_GATEWAYS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    Json,
    Text,
}

impl ContentFormat {
    fn as_query(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    /// Text view; JSON string values are unwrapped, other JSON is re-serialized.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Json(Value::String(text)) => text,
            Self::Json(value) => value.to_string(),
        }
    }

    pub fn into_json(self) -> DiscoveryResult<Value> {
        match self {
            Self::Json(value) => Ok(value),
            Self::Text(text) => serde_json::from_str(&text)
                .map_err(|e| DiscoveryError::MetadataParse(format!("payload is not JSON: {e}"))),
        }
    }
}

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, identifier: &str, format: ContentFormat) -> DiscoveryResult<Payload>;

    /// Public URL for a content reference, for display. `None` if it is not content-addressed.
    fn public_url(&self, _identifier: &str) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub proxy_url: Option<String>,
    pub gateways: Vec<String>,
    /// Per-attempt timeout, applied to the proxy and to each gateway.
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            gateways: DEFAULT_GATEWAYS.iter().map(|g| g.to_string()).collect(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl GatewayConfig {
    /// Defaults overridden by `STORY_SCAN_PROXY_URL`, `STORY_SCAN_GATEWAYS`
    /// (comma separated) and `STORY_SCAN_FETCH_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let proxy = env_string_or("STORY_SCAN_PROXY_URL", "");
        if !proxy.is_empty() {
            config.proxy_url = Some(proxy);
        }
        let gateways = env_list("STORY_SCAN_GATEWAYS");
        if !gateways.is_empty() {
            config.gateways = gateways;
        }
        config.timeout = Duration::from_secs(env_var_or("STORY_SCAN_FETCH_TIMEOUT_SECS", 10));
        config
    }
}

#[derive(Clone)]
pub struct GatewayFetcher {
    proxy_url: Option<String>,
    gateways: Vec<String>,
    agent: ureq::Agent,
}

impl GatewayFetcher {
    pub fn new(config: GatewayConfig) -> Self {
        let gateways = config
            .gateways
            .into_iter()
            .map(|g| {
                if g.ends_with('/') {
                    g
                } else {
                    format!("{g}/")
                }
            })
            .collect();
        Self {
            proxy_url: config.proxy_url.filter(|p| !p.trim().is_empty()),
            gateways,
            agent: ureq::AgentBuilder::new()
                .timeout(config.timeout)
                .timeout_connect(config.timeout)
                .build(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(GatewayConfig::default())
    }

    /// URL of a content reference on the primary gateway.
    pub fn gateway_url(&self, identifier: &str) -> Option<String> {
        let gateway = self.gateways.first()?;
        Some(format!("{gateway}{}", content_locator(identifier)))
    }

    fn fetch_blocking(&self, cid: &str, locator: &str, format: ContentFormat) -> DiscoveryResult<Payload> {
        let mut attempts = 0;

        if let Some(proxy) = &self.proxy_url {
            attempts += 1;
            match self.fetch_via_proxy(proxy, locator, format) {
                Ok(payload) => return Ok(payload),
                Err(e) => debug!(cid, error = %e, "proxy fetch failed"),
            }
        }

        for gateway in &self.gateways {
            attempts += 1;
            match self.fetch_via_gateway(gateway, locator, format) {
                Ok(payload) => {
                    debug!(cid, gateway = %gateway, "fetched from gateway");
                    return Ok(payload);
                }
                Err(e) => debug!(cid, gateway = %gateway, error = %e, "gateway fetch failed"),
            }
        }

        Err(DiscoveryError::ContentUnavailable {
            cid: cid.to_string(),
            attempts,
        })
    }

    fn fetch_via_proxy(&self, proxy: &str, locator: &str, format: ContentFormat) -> Result<Payload, String> {
        let body: Value = self
            .agent
            .get(proxy)
            .query("cid", locator)
            .query("as", format.as_query())
            .call()
            .map_err(|e| e.to_string())?
            .into_json()
            .map_err(|e| format!("proxy response is not JSON: {e}"))?;
        let data = body
            .get("data")
            .cloned()
            .ok_or_else(|| "proxy response has no `data`".to_string())?;
        match (format, data) {
            (ContentFormat::Text, Value::String(text)) => Ok(Payload::Text(text)),
            (ContentFormat::Text, other) => Ok(Payload::Text(other.to_string())),
            (ContentFormat::Json, Value::String(text)) => serde_json::from_str(&text)
                .map(Payload::Json)
                .map_err(|e| format!("proxy data is not JSON: {e}")),
            (ContentFormat::Json, value) => Ok(Payload::Json(value)),
        }
    }

    fn fetch_via_gateway(&self, gateway: &str, locator: &str, format: ContentFormat) -> Result<Payload, String> {
        let accept = match format {
            ContentFormat::Json => "application/json",
            ContentFormat::Text => "text/plain, */*",
        };
        let text = self
            .agent
            .get(&format!("{gateway}{locator}"))
            .set("Accept", accept)
            .call()
            .map_err(|e| e.to_string())?
            .into_string()
            .map_err(|e| e.to_string())?;
        match format {
            ContentFormat::Text => Ok(Payload::Text(text)),
            ContentFormat::Json => serde_json::from_str(&text)
                .map(Payload::Json)
                .map_err(|e| format!("body is not JSON: {e}")),
        }
    }
}

#[async_trait]
impl ContentFetcher for GatewayFetcher {
    async fn fetch(&self, identifier: &str, format: ContentFormat) -> DiscoveryResult<Payload> {
        let cid = strip_cid_prefix(identifier).to_string();
        match classify(identifier) {
            CidClass::Invalid => return Err(DiscoveryError::InvalidContentReference(cid)),
            CidClass::NullPlaceholder => return Err(DiscoveryError::NullContentReference(cid)),
            CidClass::ValidV0 | CidClass::ValidV1 => {}
        }

        let locator = content_locator(identifier);
        let fetcher = self.clone();
        tokio::task::spawn_blocking(move || fetcher.fetch_blocking(&cid, &locator, format))
            .await
            .map_err(|e| DiscoveryError::Transport(format!("content fetch worker failed: {e}")))?
    }

    fn public_url(&self, identifier: &str) -> Option<String> {
        if !classify(identifier).is_valid() {
            return None;
        }
        self.gateway_url(identifier)
    }
}
