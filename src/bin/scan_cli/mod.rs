//! CLI subcommand implementations for story-scan

pub mod cache;
pub mod output;
pub mod resolve;
pub mod scan;

use anyhow::{Context, Result};
use story_cache::FsRecordStore;
use story_discovery::{DiscoveryConfig, DiscoveryEngine};

/// Resolved configuration and output flags shared by every command.
pub struct CliContext {
    pub config: DiscoveryConfig,
    pub json: bool,
    pub verbose: bool,
}

impl CliContext {
    pub fn engine(&self) -> Result<DiscoveryEngine> {
        build_engine(&self.config)
    }

    pub fn store(&self) -> Result<FsRecordStore> {
        FsRecordStore::new(&self.config.store_dir).with_context(|| {
            format!(
                "Failed to open record store {}",
                self.config.store_dir.display()
            )
        })
    }
}

pub fn build_engine(config: &DiscoveryConfig) -> Result<DiscoveryEngine> {
    DiscoveryEngine::from_config(config).with_context(|| {
        format!(
            "Failed to set up discovery against registry {} at {}",
            config.registry_address, config.rpc_url
        )
    })
}
