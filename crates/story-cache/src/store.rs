//! The store trait and key conventions.

use serde_json::Value;
use story_discovery_types::{CachedMintRecord, DiscoveryResult, TokenId};
use tracing::debug;

/// Key prefix used by the minting flow.
pub const DEFAULT_KEY_PREFIX: &str = "story_nft";

/// `"<prefix>_<id>"`.
pub fn record_key(prefix: &str, id: TokenId) -> String {
    format!("{prefix}_{id}")
}

/// Inverse of [`record_key`]. `None` for keys that belong to another prefix
/// or do not end in a token id.
pub fn parse_token_key(prefix: &str, key: &str) -> Option<TokenId> {
    key.strip_prefix(prefix)?.strip_prefix('_')?.parse().ok()
}

/// Lenient conversion of a stored value into a [`CachedMintRecord`].
///
/// Unknown fields are ignored and missing fields default. A record stored as
/// a JSON string (double-encoded by a browser-style key/value store) is
/// unwrapped first. Anything that is not an object yields `None`.
pub fn as_record(raw: &Value) -> Option<CachedMintRecord> {
    let parsed;
    let value = match raw {
        Value::String(text) => {
            parsed = serde_json::from_str::<Value>(text).ok()?;
            &parsed
        }
        other => other,
    };
    if !value.is_object() {
        return None;
    }
    match CachedMintRecord::deserialize_lenient(value) {
        Some(record) => Some(record),
        None => {
            debug!("cached record has an unexpected shape, ignoring it");
            None
        }
    }
}

/// Key/value store of raw cached records.
///
/// Implementations are synchronous: reads are local and cheap.
pub trait LocalRecordStore: Send + Sync {
    /// Raw value stored under `key`.
    fn get(&self, key: &str) -> DiscoveryResult<Option<Value>>;

    /// All keys starting with `prefix`, sorted.
    fn list_keys(&self, prefix: &str) -> DiscoveryResult<Vec<String>>;

    /// Store a value. Used by the minting flow and by imports; the discovery
    /// engine never writes.
    fn put(&self, key: &str, value: &Value) -> DiscoveryResult<()>;

    fn as_record(&self, raw: &Value) -> Option<CachedMintRecord> {
        as_record(raw)
    }

    /// Cached record for a token, if one exists and parses.
    fn get_token(&self, prefix: &str, id: TokenId) -> DiscoveryResult<Option<CachedMintRecord>> {
        Ok(self
            .get(&record_key(prefix, id))?
            .and_then(|raw| self.as_record(&raw)))
    }

    /// Token ids that have a cached record, ascending.
    fn known_token_ids(&self, prefix: &str) -> DiscoveryResult<Vec<TokenId>> {
        let mut ids: Vec<TokenId> = self
            .list_keys(prefix)?
            .iter()
            .filter_map(|key| parse_token_key(prefix, key))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }
}
