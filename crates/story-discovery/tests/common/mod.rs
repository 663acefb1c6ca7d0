#![allow(dead_code)]
//! In-process fakes for the registry, content fetcher and record store.
//!
//! Every fake records the calls it receives so tests can assert on network
//! behavior (how many `ownerOf` calls, whether a reference was ever fetched).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use story_cache::{LocalRecordStore, MemoryRecordStore};
use story_discovery::{DiscoveryConfig, DiscoveryEngine, GovernorConfig, ScanConfig};
use story_discovery_types::{DiscoveryError, DiscoveryResult, TokenId};
use story_transport::uri::content_locator;
use story_transport::{ContentFetcher, ContentFormat, Existence, Payload, RegistryReader, StoryDetails};

pub const OWNER: &str = "0x00000000000000000000000000000000000000aa";

/// A valid CIDv1, unique per `n`.
pub fn cid(n: u64) -> String {
    format!("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgt{n:08}")
}

pub fn placeholder_cid() -> String {
    format!("Qm{}", "0".repeat(44))
}

#[derive(Debug, Clone)]
pub struct FakeToken {
    pub uri: String,
    pub details: Option<StoryDetails>,
}

impl FakeToken {
    /// Token whose metadata lives at `cid(id)` and story body at `cid(id + 1000)`.
    pub fn published(id: TokenId) -> Self {
        Self {
            uri: format!("ipfs://{}", cid(id)),
            details: Some(StoryDetails {
                story_reference: cid(id + 1000),
                image_count: 0,
                content_type_code: 0,
            }),
        }
    }

    pub fn unpublished() -> Self {
        Self {
            uri: format!("ipfs://{}", placeholder_cid()),
            details: Some(StoryDetails {
                story_reference: placeholder_cid(),
                image_count: 0,
                content_type_code: 1,
            }),
        }
    }
}

#[derive(Default)]
pub struct FakeRegistry {
    pub tokens: BTreeMap<TokenId, FakeToken>,
    /// Remaining throttled `ownerOf` answers per id.
    pub throttles: Mutex<BTreeMap<TokenId, usize>>,
    pub owner_calls: Mutex<Vec<TokenId>>,
    pub recent: Vec<TokenId>,
    pub verify_error: Option<DiscoveryError>,
}

impl FakeRegistry {
    pub fn with_tokens(tokens: impl IntoIterator<Item = (TokenId, FakeToken)>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn throttle(self, id: TokenId, times: usize) -> Self {
        self.throttles.lock().insert(id, times);
        self
    }

    pub fn owner_calls(&self) -> Vec<TokenId> {
        self.owner_calls.lock().clone()
    }
}

#[async_trait]
impl RegistryReader for FakeRegistry {
    async fn owner_of(&self, id: TokenId) -> DiscoveryResult<Existence<String>> {
        self.owner_calls.lock().push(id);
        if let Some(remaining) = self.throttles.lock().get_mut(&id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DiscoveryError::Throttled("429 Too Many Requests".into()));
            }
        }
        Ok(match self.tokens.contains_key(&id) {
            true => Existence::Exists(OWNER.to_string()),
            false => Existence::NotExistent,
        })
    }

    async fn token_uri(&self, id: TokenId) -> DiscoveryResult<Existence<String>> {
        Ok(match self.tokens.get(&id) {
            Some(token) => Existence::Exists(token.uri.clone()),
            None => Existence::NotExistent,
        })
    }

    async fn story_details(&self, id: TokenId) -> DiscoveryResult<Existence<StoryDetails>> {
        Ok(match self.tokens.get(&id).and_then(|t| t.details.clone()) {
            Some(details) => Existence::Exists(details),
            None => Existence::NotExistent,
        })
    }

    async fn recent_token_ids(&self, _lookback_blocks: u64, max: usize) -> DiscoveryResult<Vec<TokenId>> {
        Ok(self.recent.iter().copied().take(max).collect())
    }

    async fn verify(&self) -> DiscoveryResult<()> {
        match &self.verify_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct FakeFetcher {
    pub documents: BTreeMap<String, Payload>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn with_documents(documents: impl IntoIterator<Item = (String, Payload)>) -> Self {
        Self {
            documents: documents.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Metadata at `cid(id)` and story body at `cid(id + 1000)` for each id.
    pub fn publishing(ids: impl IntoIterator<Item = TokenId>) -> Self {
        Self::with_documents(ids.into_iter().flat_map(|id| {
            [
                (cid(id), Payload::Json(metadata_doc(id))),
                (cid(id + 1000), Payload::Text(format!("Story body {id}"))),
            ]
        }))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ContentFetcher for FakeFetcher {
    async fn fetch(&self, identifier: &str, format: ContentFormat) -> DiscoveryResult<Payload> {
        self.calls.lock().push(identifier.to_string());
        let locator = content_locator(identifier);
        match self.documents.get(&locator) {
            Some(Payload::Json(value)) if format == ContentFormat::Text => Ok(Payload::Text(value.to_string())),
            Some(payload) => Ok(payload.clone()),
            None => Err(DiscoveryError::ContentUnavailable {
                cid: locator,
                attempts: 5,
            }),
        }
    }
}

pub fn metadata_doc(id: TokenId) -> Value {
    json!({
        "name": format!("Story {id}"),
        "description": format!("Description {id}"),
        "image": format!("ipfs://{}/cover.png", cid(id)),
        "attributes": [
            { "trait_type": "Author", "value": "Ada" },
            { "trait_type": "Genre", "value": "Adventure" }
        ]
    })
}

pub fn test_config(scan: ScanConfig) -> DiscoveryConfig {
    DiscoveryConfig {
        governor: GovernorConfig {
            steady_delay: Duration::ZERO,
            throttle_cooldown: Duration::from_millis(10),
            max_cooldown: Duration::from_millis(20),
            throttle_retries: 2,
            max_calls: 1_000,
        },
        scan,
        ..DiscoveryConfig::default()
    }
}

pub fn scan_config() -> ScanConfig {
    ScanConfig {
        miss_threshold: 3,
        min_found: 1,
        max_scan: 50,
        page_size: 5,
        window_span: 10,
        window_lookahead: 3,
        window_miss_threshold: 6,
        max_consecutive_errors: 3,
        seed_from_store: true,
        recent_lookback_blocks: 100,
        recent_max: 5,
    }
}

pub struct Harness {
    pub registry: Arc<FakeRegistry>,
    pub fetcher: Arc<FakeFetcher>,
    pub store: Arc<MemoryRecordStore>,
    pub engine: DiscoveryEngine,
}

pub fn harness(registry: FakeRegistry, fetcher: FakeFetcher, store: MemoryRecordStore, config: DiscoveryConfig) -> Harness {
    let registry = Arc::new(registry);
    let fetcher = Arc::new(fetcher);
    let store = Arc::new(store);
    let engine = DiscoveryEngine::new(
        registry.clone(),
        fetcher.clone(),
        store.clone() as Arc<dyn LocalRecordStore>,
        &config,
    );
    Harness {
        registry,
        fetcher,
        store,
        engine,
    }
}
