//! In-memory record store.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde_json::Value;
use story_discovery_types::DiscoveryResult;

use crate::store::LocalRecordStore;

#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<BTreeMap<String, Value>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self {
            records: RwLock::new(entries.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl LocalRecordStore for MemoryRecordStore {
    fn get(&self, key: &str) -> DiscoveryResult<Option<Value>> {
        Ok(self.records.read().get(key).cloned())
    }

    fn list_keys(&self, prefix: &str) -> DiscoveryResult<Vec<String>> {
        Ok(self
            .records
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn put(&self, key: &str, value: &Value) -> DiscoveryResult<()> {
        self.records.write().insert(key.to_string(), value.clone());
        Ok(())
    }
}
