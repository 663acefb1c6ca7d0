//! Story Transport Layer
//!
//! Network access for story discovery. Both external dependencies sit behind
//! traits so the discovery engine can be exercised without a network:
//!
//! - [`registry`]: [`RegistryReader`] and its JSON-RPC implementation [`JsonRpcRegistry`]
//! - [`content`]: [`ContentFetcher`] and the proxy-then-gateways implementation [`GatewayFetcher`]
//! - [`uri`]: parsing of `tokenURI` / story references into inline or content-addressed form
//! - [`abi`]: the small slice of Solidity ABI encoding the registry needs
//!
//! # Example
//!
//! ```ignore
//! use story_transport::{GatewayFetcher, JsonRpcRegistry, RegistryReader};
//!
//! let registry = JsonRpcRegistry::new("https://testnet-rpc.monad.xyz/", "0x6bFE…920a")?;
//! let owner = registry.owner_of(7).await?;
//!
//! let fetcher = GatewayFetcher::with_defaults();
//! let doc = fetcher.fetch("ipfs://bafy…", ContentFormat::Json).await?;
//! ```
//!
//! HTTP is done with blocking `ureq` agents moved onto tokio's blocking pool,
//! so callers suspend instead of tying up a runtime worker.

pub mod abi;
pub mod content;
pub mod registry;
pub mod rpc;
pub mod uri;

pub use content::{ContentFetcher, ContentFormat, GatewayConfig, GatewayFetcher, Payload};
pub use registry::{Existence, JsonRpcRegistry, RegistryReader, StoryDetails};
pub use rpc::{RpcClient, RpcError};
pub use uri::{ContentReference, InlinePayload};

/// Default public gateways, tried in order after the proxy.
pub const DEFAULT_GATEWAYS: &[&str] = &[
    "https://gateway.pinata.cloud/ipfs/",
    "https://ipfs.io/ipfs/",
    "https://cloudflare-ipfs.com/ipfs/",
    "https://dweb.link/ipfs/",
];
