//! Environment variable parsing for configuration.
//!
//! Every tunable in the workspace can be set through a `STORY_SCAN_*`
//! variable; these helpers keep that parsing in one place:
//!
//! ```
//! use story_discovery_types::env_utils::{env_var_or, env_list};
//!
//! let threshold: u64 = env_var_or("STORY_SCAN_MISS_THRESHOLD", 5);
//! let gateways: Vec<String> = env_list("STORY_SCAN_GATEWAYS");
//! ```

use std::str::FromStr;

/// Parse an environment variable. `None` if unset or unparseable.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Parse an environment variable, falling back to `default` if unset or unparseable.
pub fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).unwrap_or(default)
}

/// String variable with a default. Blank values count as unset.
pub fn env_string_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Comma-separated list; empty entries are dropped. Empty vector if unset.
pub fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .ok()
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
