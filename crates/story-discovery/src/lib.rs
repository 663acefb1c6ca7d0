//! Story Discovery Engine
//!
//! Finds which token ids exist in the story registry and resolves each one
//! into a normalized [`TokenRecord`](story_discovery_types::TokenRecord),
//! tolerating throttled RPC endpoints, unreliable content gateways and
//! placeholder content references.
//!
//! # Components
//!
//! | Module | Role |
//! |---|---|
//! | [`governor`] | Pacing, throttle cooldown, call ceiling, miss counter |
//! | [`resolver`] | id → [`Resolution`] (registry, content store, cache fallback) |
//! | [`reconcile`] | Pure merge of content-store data with a cached mint record |
//! | [`scanner`] | Full and windowed scans streaming [`ScanEvent`]s |
//! | [`session`] | Per-run state extended by `load_more` |
//! | [`presentation`] | Ordered, deduplicated visible set |
//! | [`config`] | Engine configuration (`STORY_SCAN_*` environment variables) |
//!
//! # Example
//!
//! ```ignore
//! use futures::StreamExt;
//! use story_discovery::{DiscoveryConfig, DiscoveryEngine, ScanMode, ScanSession, VisibleSet};
//!
//! let engine = DiscoveryEngine::from_config(&DiscoveryConfig::from_env())?;
//! let mut session = ScanSession::new();
//! let mut visible = VisibleSet::new();
//!
//! let stream = engine.scanner().scan(ScanMode::full(), &mut session);
//! futures::pin_mut!(stream);
//! while let Some(event) = stream.next().await {
//!     visible.apply(event);
//! }
//! ```

pub mod config;
pub mod engine;
pub mod governor;
pub mod presentation;
pub mod reconcile;
pub mod resolver;
pub mod scanner;
pub mod session;

pub use config::{DiscoveryConfig, ScanConfig};
pub use engine::DiscoveryEngine;
pub use governor::{Governor, GovernorConfig, GovernorStats};
pub use presentation::{merge, VisibleSet};
pub use reconcile::{merge_images, reconcile, ContentStoreParts};
pub use resolver::{Resolution, TokenResolver};
pub use scanner::{ScanEvent, ScanMode, ScanSummary, StopReason, TokenScanner};
pub use session::ScanSession;
