//! Token Metadata Resolver.
//!
//! Turns one token id into a [`Resolution`]:
//!
//! ```text
//! Unknown ─ownerOf─▶ NotExistent
//!    │
//!    ▼ exists
//! tokenURI ─┬─ data: URI ───────────────▶ decoded locally
//!           └─ content address ─fetch──▶ metadata | unavailable
//! getStoryDetails ─▶ story body, image count, content type
//! local record store (always read) ─▶ reconcile ─▶ Resolved | Unresolvable
//! ```
//!
//! Only the existence check can make `resolve` fail: a throttled or broken
//! `ownerOf` says nothing about whether the token exists, so it is returned
//! as an error for the scanner to defer. Once existence is confirmed, every
//! later failure degrades to the cache instead.

use std::sync::Arc;

use serde_json::Value;
use story_cache::LocalRecordStore;
use story_discovery_types::{
    classify, CachedMintRecord, ContentType, DiscoveryError, DiscoveryResult, TokenId,
    TokenMetadata, TokenRecord,
};
use story_transport::{
    ContentFetcher, ContentFormat, ContentReference, Existence, RegistryReader, StoryDetails,
};
use tracing::{debug, warn};

use crate::governor::Governor;
use crate::reconcile::{reconcile, ContentStoreParts};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(TokenRecord),
    /// The registry says the id was never minted.
    NotExistent,
    /// The token exists but neither the content store nor the cache has anything for it.
    Unresolvable,
}

pub struct TokenResolver {
    registry: Arc<dyn RegistryReader>,
    fetcher: Arc<dyn ContentFetcher>,
    store: Arc<dyn LocalRecordStore>,
    governor: Arc<Governor>,
    key_prefix: String,
}

impl TokenResolver {
    pub fn new(
        registry: Arc<dyn RegistryReader>,
        fetcher: Arc<dyn ContentFetcher>,
        store: Arc<dyn LocalRecordStore>,
        governor: Arc<Governor>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            fetcher,
            store,
            governor,
            key_prefix: key_prefix.into(),
        }
    }

    pub fn governor(&self) -> &Arc<Governor> {
        &self.governor
    }

    pub fn registry(&self) -> &Arc<dyn RegistryReader> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn LocalRecordStore> {
        &self.store
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Cached mint record for `id`. Store failures are logged and read as "no record".
    pub fn cached_record(&self, id: TokenId) -> Option<CachedMintRecord> {
        match self.store.get_token(&self.key_prefix, id) {
            Ok(record) => record,
            Err(e) => {
                warn!(id, error = %e, "local record store read failed");
                None
            }
        }
    }

    /// Record built from the cache alone, without touching the network.
    pub fn resolve_cached(&self, id: TokenId) -> Option<TokenRecord> {
        let cached = self.cached_record(id)?;
        reconcile(ContentStoreParts::new(id), Some(&cached)).map(|r| self.with_display_urls(r))
    }

    /// Registry configuration check, paced like any other call.
    pub async fn verify_registry(&self) -> DiscoveryResult<()> {
        self.governor.pace("verify", || self.registry.verify()).await
    }

    /// Newest minted ids, via the registry's event logs.
    pub async fn recent_token_ids(&self, lookback_blocks: u64, max: usize) -> DiscoveryResult<Vec<TokenId>> {
        self.governor
            .pace("recent", || self.registry.recent_token_ids(lookback_blocks, max))
            .await
    }

    /// Resolve one id. `Err` means the outcome is unknown and the id should be retried later.
    pub async fn resolve(&self, id: TokenId) -> DiscoveryResult<Resolution> {
        let owner = match self.governor.pace("ownerOf", || self.registry.owner_of(id)).await? {
            Existence::Exists(owner) => owner,
            Existence::NotExistent => {
                debug!(id, "token does not exist");
                return Ok(Resolution::NotExistent);
            }
        };

        // Read unconditionally: it backfills fields even when the content store answers.
        let cached = self.cached_record(id);

        let mut parts = ContentStoreParts {
            owner: Some(owner),
            ..ContentStoreParts::new(id)
        };

        match self.governor.pace("tokenURI", || self.registry.token_uri(id)).await {
            Ok(Existence::Exists(uri)) => parts.metadata = self.load_metadata(id, &uri).await?,
            Ok(Existence::NotExistent) => {
                debug!(id, "tokenURI reverted after ownerOf succeeded");
                return Ok(Resolution::NotExistent);
            }
            Err(e @ DiscoveryError::CallBudgetExhausted { .. }) => return Err(e),
            Err(e) => debug!(id, error = %e, "tokenURI unavailable"),
        }

        match self
            .governor
            .pace("getStoryDetails", || self.registry.story_details(id))
            .await
        {
            Ok(Existence::Exists(details)) => self.apply_details(id, details, &mut parts).await?,
            Ok(Existence::NotExistent) => debug!(id, "no story details recorded"),
            Err(e @ DiscoveryError::CallBudgetExhausted { .. }) => return Err(e),
            Err(e) => debug!(id, error = %e, "story details unavailable, content type from cache"),
        }

        Ok(match reconcile(parts, cached.as_ref()) {
            Some(record) => {
                debug!(id, source = record.resolution_source.label(), "resolved");
                Resolution::Resolved(self.with_display_urls(record))
            }
            None => {
                warn!(id, "token exists but has no content and no cached record");
                Resolution::Unresolvable
            }
        })
    }

    async fn apply_details(
        &self,
        id: TokenId,
        details: StoryDetails,
        parts: &mut ContentStoreParts,
    ) -> DiscoveryResult<()> {
        parts.image_count = Some(details.image_count);
        parts.content_type = Some(ContentType::from_code(details.content_type_code));
        if let Some(payload) = self
            .load_content(id, &details.story_reference, ContentFormat::Text)
            .await?
        {
            parts.story = story_text(payload);
        }
        Ok(())
    }

    async fn load_metadata(&self, id: TokenId, uri: &str) -> DiscoveryResult<Option<TokenMetadata>> {
        let Some(value) = self.load_content(id, uri, ContentFormat::Json).await? else {
            return Ok(None);
        };
        let value = match value {
            Value::String(text) => match serde_json::from_str(&text) {
                Ok(parsed) => parsed,
                Err(e) => {
                    debug!(id, error = %e, "metadata is not JSON");
                    return Ok(None);
                }
            },
            other => other,
        };
        let metadata = TokenMetadata::deserialize_lenient(&value);
        if metadata.is_none() {
            debug!(id, "metadata document is not an object");
        }
        Ok(metadata)
    }

    /// Resolve a content reference to a payload. `Ok(None)` routes the caller to the cache;
    /// only call-budget exhaustion is an error.
    async fn load_content(
        &self,
        id: TokenId,
        reference: &str,
        format: ContentFormat,
    ) -> DiscoveryResult<Option<Value>> {
        let locator = match ContentReference::parse(reference) {
            Ok(ContentReference::Inline(payload)) => {
                let decoded = match format {
                    ContentFormat::Json => payload.as_json::<Value>(),
                    ContentFormat::Text => payload.as_text().map(Value::String),
                };
                return Ok(match decoded {
                    Ok(value) => Some(value),
                    Err(e) => {
                        debug!(id, error = %e, "inline payload unreadable");
                        None
                    }
                });
            }
            Ok(ContentReference::Addressed(locator)) => locator,
            Ok(ContentReference::Unsupported(raw)) => {
                debug!(id, reference = %raw, "unsupported content reference");
                return Ok(None);
            }
            Err(e) => {
                debug!(id, error = %e, "malformed content reference");
                return Ok(None);
            }
        };

        let class = classify(&locator);
        if !class.is_valid() {
            debug!(id, reference = %locator, ?class, "content reference not fetchable, using cache");
            return Ok(None);
        }

        match self
            .governor
            .pace("content", || self.fetcher.fetch(&locator, format))
            .await
        {
            Ok(payload) => match format {
                ContentFormat::Text => Ok(Some(Value::String(payload.into_text()))),
                ContentFormat::Json => match payload.into_json() {
                    Ok(value) => Ok(Some(value)),
                    Err(e) => {
                        debug!(id, error = %e, "fetched metadata is not JSON");
                        Ok(None)
                    }
                },
            },
            Err(e @ DiscoveryError::CallBudgetExhausted { .. }) => Err(e),
            Err(e) => {
                if e.routes_to_cache() {
                    debug!(id, error = %e, "content unavailable, using cache");
                } else {
                    warn!(id, error = %e, "content fetch failed");
                }
                Ok(None)
            }
        }
    }

    /// Rewrite `ipfs://` image references to public gateway URLs.
    fn with_display_urls(&self, mut record: TokenRecord) -> TokenRecord {
        let display = |url: &str| self.fetcher.public_url(url).unwrap_or_else(|| url.to_string());
        record.image_url = record.image_url.as_deref().map(|url| display(url));
        let mut images: Vec<String> = Vec::with_capacity(record.images.len());
        for image in record.images.iter().map(|i| display(i)) {
            if !images.contains(&image) {
                images.push(image);
            }
        }
        record.images = images;
        record
    }
}

/// Story body from a text payload. A JSON document carrying the body under a
/// known key is unwrapped.
fn story_text(payload: Value) -> Option<String> {
    let text = match payload {
        Value::String(text) => text,
        other => other.to_string(),
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('{') {
        if let Ok(Value::Object(doc)) = serde_json::from_str::<Value>(trimmed) {
            for key in ["storyContent", "content", "story", "text"] {
                if let Some(Value::String(body)) = doc.get(key) {
                    return Some(body.clone());
                }
            }
        }
    }
    Some(text)
}
