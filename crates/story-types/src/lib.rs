//! Shared types for the story-scan workspace.
//!
//! This crate holds the data model every other crate agrees on, so the
//! transport, cache and discovery layers never depend on each other just to
//! exchange a record:
//!
//! - [`record`]: [`TokenRecord`], [`CachedMintRecord`] and the metadata document shape
//! - [`error`]: the [`DiscoveryError`] taxonomy shared by every layer
//! - [`cid`]: the pure content identifier classifier
//! - [`env_utils`]: environment variable parsing for configuration

pub mod cid;
pub mod env_utils;
pub mod error;
pub mod record;

pub use cid::{classify, strip_cid_prefix, CidClass};
pub use env_utils::{env_list, env_string_or, env_var, env_var_or};
pub use error::{is_throttle_message, DiscoveryError, DiscoveryResult};
pub use record::{
    CachedMintRecord, ContentType, MetadataAttribute, ResolutionSource, TokenId, TokenMetadata,
    TokenRecord, UNKNOWN,
};
