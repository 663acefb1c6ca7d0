//! Engine configuration.
//!
//! Every field has a default and a `STORY_SCAN_*` environment override; the
//! CLI layers its flags on top of [`DiscoveryConfig::from_env`].

use std::path::PathBuf;

use story_cache::DEFAULT_KEY_PREFIX;
use story_discovery_types::{env_string_or, env_var_or};
use story_transport::GatewayConfig;

use crate::governor::GovernorConfig;

pub const DEFAULT_RPC_URL: &str = "https://testnet-rpc.monad.xyz/";
pub const DEFAULT_REGISTRY_ADDRESS: &str = "0x6bFEF8ac708ef73142Fb59D29590351D0C07920a";

/// Scan bounds and soft-stop thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Full mode stops after this many consecutive misses (once `min_found` is met).
    pub miss_threshold: u64,
    pub min_found: usize,
    /// Upper bound on ids visited by one full scan.
    pub max_scan: u64,
    /// Ids visited per `load_more` page.
    pub page_size: u64,
    /// Windowed mode looks this far below the center.
    pub window_span: u64,
    /// Windowed mode looks this far above the center.
    pub window_lookahead: u64,
    pub window_miss_threshold: u64,
    /// Consecutive non-transient failures after which a scan gives up.
    pub max_consecutive_errors: usize,
    /// Treat ids with cached records as visited and emit them from the cache.
    pub seed_from_store: bool,
    pub recent_lookback_blocks: u64,
    pub recent_max: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            miss_threshold: 5,
            min_found: 1,
            max_scan: 200,
            page_size: 20,
            window_span: 30,
            window_lookahead: 5,
            window_miss_threshold: 15,
            max_consecutive_errors: 8,
            seed_from_store: true,
            recent_lookback_blocks: 100,
            recent_max: 10,
        }
    }
}

impl ScanConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            miss_threshold: env_var_or("STORY_SCAN_MISS_THRESHOLD", d.miss_threshold),
            min_found: env_var_or("STORY_SCAN_MIN_FOUND", d.min_found),
            max_scan: env_var_or("STORY_SCAN_MAX_SCAN", d.max_scan),
            page_size: env_var_or("STORY_SCAN_PAGE_SIZE", d.page_size),
            window_span: env_var_or("STORY_SCAN_WINDOW_SPAN", d.window_span),
            window_lookahead: env_var_or("STORY_SCAN_WINDOW_LOOKAHEAD", d.window_lookahead),
            window_miss_threshold: env_var_or(
                "STORY_SCAN_WINDOW_MISS_THRESHOLD",
                d.window_miss_threshold,
            ),
            max_consecutive_errors: env_var_or(
                "STORY_SCAN_MAX_CONSECUTIVE_ERRORS",
                d.max_consecutive_errors,
            ),
            seed_from_store: env_var_or("STORY_SCAN_SEED_FROM_STORE", d.seed_from_store),
            recent_lookback_blocks: env_var_or(
                "STORY_SCAN_RECENT_LOOKBACK_BLOCKS",
                d.recent_lookback_blocks,
            ),
            recent_max: env_var_or("STORY_SCAN_RECENT_MAX", d.recent_max),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub rpc_url: String,
    pub registry_address: String,
    /// Key prefix of cached mint records.
    pub key_prefix: String,
    pub store_dir: PathBuf,
    pub gateway: GatewayConfig,
    pub governor: GovernorConfig,
    pub scan: ScanConfig,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            registry_address: DEFAULT_REGISTRY_ADDRESS.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            store_dir: default_store_dir(),
            gateway: GatewayConfig::default(),
            governor: GovernorConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

impl DiscoveryConfig {
    pub fn from_env() -> Self {
        Self {
            rpc_url: env_string_or("STORY_SCAN_RPC_URL", DEFAULT_RPC_URL),
            registry_address: env_string_or("STORY_SCAN_REGISTRY", DEFAULT_REGISTRY_ADDRESS),
            key_prefix: env_string_or("STORY_SCAN_KEY_PREFIX", DEFAULT_KEY_PREFIX),
            store_dir: std::env::var("STORY_SCAN_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_store_dir()),
            gateway: GatewayConfig::from_env(),
            governor: GovernorConfig::from_env(),
            scan: ScanConfig::from_env(),
        }
    }
}

/// `$STORY_SCAN_HOME/records`, defaulting to `~/.story-scan/records`.
pub fn default_store_dir() -> PathBuf {
    std::env::var("STORY_SCAN_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".story-scan")
        })
        .join("records")
}
