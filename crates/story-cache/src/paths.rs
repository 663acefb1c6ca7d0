//! Filesystem layout and atomic writes for [`FsRecordStore`](crate::FsRecordStore).

use std::path::{Path, PathBuf};

use story_discovery_types::{DiscoveryError, DiscoveryResult};

pub const RECORD_EXTENSION: &str = "json";

/// File name for a key. Keys are percent-encoded so any key maps to a single path segment.
pub fn record_file_name(key: &str) -> String {
    format!("{}.{RECORD_EXTENSION}", urlencoding::encode(key))
}

/// Key for a record file name, or `None` for files the store did not write.
pub fn key_from_file_name(name: &str) -> Option<String> {
    let stem = name.strip_suffix(&format!(".{RECORD_EXTENSION}"))?;
    urlencoding::decode(stem).ok().map(|k| k.into_owned())
}

pub fn record_path(root: &Path, key: &str) -> PathBuf {
    root.join(record_file_name(key))
}

/// Ensure all parent directories exist for a path.
pub fn ensure_parent_dirs(path: &Path) -> DiscoveryResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            DiscoveryError::Store(format!("failed to create directory {}: {e}", parent.display()))
        })?;
    }
    Ok(())
}

/// Write a file atomically (write to `.tmp`, then rename).
pub fn atomic_write(path: &Path, contents: &[u8]) -> DiscoveryResult<()> {
    ensure_parent_dirs(path)?;
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|s| s.to_str()).unwrap_or("tmp")
    ));
    std::fs::write(&tmp_path, contents).map_err(|e| {
        DiscoveryError::Store(format!("failed to write temp file {}: {e}", tmp_path.display()))
    })?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        DiscoveryError::Store(format!(
            "failed to rename {} to {}: {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}

pub fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> DiscoveryResult<()> {
    let json = serde_json::to_vec(value)
        .map_err(|e| DiscoveryError::Store(format!("failed to serialize record: {e}")))?;
    atomic_write(path, &json)
}
