//! Filesystem-backed record store: one compact JSON file per key.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use story_discovery_types::{DiscoveryError, DiscoveryResult};
use tracing::debug;

use crate::paths::{atomic_write_json, key_from_file_name, record_path};
use crate::store::LocalRecordStore;

pub struct FsRecordStore {
    root: Arc<Path>,
}

impl FsRecordStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> DiscoveryResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| {
            DiscoveryError::Store(format!("failed to create store root {}: {e}", root.display()))
        })?;
        Ok(Self {
            root: Arc::from(root),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl LocalRecordStore for FsRecordStore {
    fn get(&self, key: &str) -> DiscoveryResult<Option<Value>> {
        let path = record_path(&self.root, key);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)
            .map_err(|e| DiscoveryError::Store(format!("failed to read {}: {e}", path.display())))?;
        let value = serde_json::from_str(&json)
            .map_err(|e| DiscoveryError::Store(format!("failed to parse {}: {e}", path.display())))?;
        Ok(Some(value))
    }

    fn list_keys(&self, prefix: &str) -> DiscoveryResult<Vec<String>> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            DiscoveryError::Store(format!("failed to list {}: {e}", self.root.display()))
        })?;
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DiscoveryError::Store(e.to_string()))?;
            let name = entry.file_name();
            let Some(key) = name.to_str().and_then(key_from_file_name) else {
                debug!(file = ?name, "ignoring non-record file in store");
                continue;
            };
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn put(&self, key: &str, value: &Value) -> DiscoveryResult<()> {
        atomic_write_json(&record_path(&self.root, key), value)
    }
}
