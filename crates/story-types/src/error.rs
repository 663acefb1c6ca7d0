//! Error taxonomy shared by the transport, cache and discovery layers.
//!
//! Most variants are expected, per-identifier outcomes rather than failures of
//! the scan as a whole. The discovery layer absorbs them and either omits or
//! downgrades the affected record; only [`DiscoveryError::Registry`] is meant
//! to reach a user.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    /// The provider signalled rate limiting (HTTP 429 or an equivalent message).
    #[error("throttled by provider: {0}")]
    Throttled(String),

    /// The content reference is malformed; no network attempt was made.
    #[error("invalid content reference `{0}`")]
    InvalidContentReference(String),

    /// The registry entry exists but its content was never published.
    #[error("content reference `{0}` is an unpublished placeholder")]
    NullContentReference(String),

    /// Every fetch tier (proxy and all gateways) failed.
    #[error("content `{cid}` unavailable after {attempts} attempt(s)")]
    ContentUnavailable { cid: String, attempts: usize },

    /// A payload arrived but could not be decoded as JSON or text.
    #[error("malformed payload: {0}")]
    MetadataParse(String),

    /// Registry misconfiguration or a response shape we cannot interpret.
    #[error("registry error: {0}")]
    Registry(String),

    /// Network-level failure talking to the registry RPC.
    #[error("transport error: {0}")]
    Transport(String),

    /// The governor's hard ceiling on calls per run was reached.
    #[error("call budget of {limit} calls exhausted")]
    CallBudgetExhausted { limit: usize },

    #[error("record store error: {0}")]
    Store(String),
}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

impl DiscoveryError {
    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled(_))
    }

    /// Errors that say nothing about whether the token exists; retry later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Throttled(_) | Self::Transport(_))
    }

    /// Content failures that route the resolver to the local cache.
    pub fn routes_to_cache(&self) -> bool {
        matches!(
            self,
            Self::InvalidContentReference(_)
                | Self::NullContentReference(_)
                | Self::ContentUnavailable { .. }
                | Self::MetadataParse(_)
        )
    }
}

/// Whether a provider error message indicates rate limiting.
pub fn is_throttle_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("429")
        || lower.contains("too many requests")
        || lower.contains("rate limit")
        || lower.contains("rate-limit")
        || lower.contains("request limit")
}
