//! Local record store for cached mint records.
//!
//! The minting flow writes one record per token under `"<prefix>_<tokenId>"`
//! at creation time. The discovery engine only reads these records; they are
//! the fallback of last resort when the content store is unreachable.
//!
//! This crate provides:
//! - [`LocalRecordStore`]: the store trait (`get`, `list_keys`, `as_record`, `put`)
//! - [`FsRecordStore`]: one JSON file per key, written atomically
//! - [`MemoryRecordStore`]: in-process map, for tests and ephemeral runs

pub mod fs;
pub mod memory;
pub mod paths;
pub mod store;

pub use fs::FsRecordStore;
pub use memory::MemoryRecordStore;
pub use store::{as_record, parse_token_key, record_key, LocalRecordStore, DEFAULT_KEY_PREFIX};
