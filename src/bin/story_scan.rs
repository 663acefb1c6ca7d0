//! story-scan: discover story NFTs on a sparse registry and resolve their metadata
//!
//! ## Commands
//!
//! - **scan**: ascending scan from id 0 (or `--start`) with a soft stop
//! - **window**: scan outward from the newest minted id
//! - **more**: a first page followed by `load_more` pages
//! - **recent**: newest minted ids from the registry's event logs
//! - **resolve**: resolve a single token id
//! - **classify**: classify a content identifier (no network)
//! - **cache**: list, show or import cached mint records
//!
//! ## Example Usage
//!
//! ```bash
//! # Full scan against the default registry
//! story-scan scan
//!
//! # Windowed scan around the newest mint, JSON output
//! story-scan window --json
//!
//! # Import a record store export, then resolve one token
//! story-scan cache import records.json
//! story-scan resolve 42
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod scan_cli;

use scan_cli::{
    cache::CacheCmd,
    resolve::{ClassifyCmd, ResolveCmd},
    scan::{MoreCmd, RecentCmd, ScanCmd, WindowCmd},
    CliContext,
};

#[derive(Parser)]
#[command(
    name = "story-scan",
    author,
    version,
    about = "Story NFT discovery and metadata resolution",
    long_about = "Searches a sparse on-chain story registry for minted tokens and resolves each one\n\
                  from the content store, backfilling from the local record cache."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Registry JSON-RPC endpoint (default: $STORY_SCAN_RPC_URL or the public testnet RPC)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Registry contract address (default: $STORY_SCAN_REGISTRY)
    #[arg(long, global = true)]
    registry: Option<String>,

    /// Directory of cached mint records (default: ~/.story-scan/records)
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Key prefix of cached mint records
    #[arg(long, global = true)]
    key_prefix: Option<String>,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (debug logging, full record details)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ascending scan with a soft stop on consecutive misses
    Scan(ScanCmd),

    /// Scan outward from the newest minted id
    Window(WindowCmd),

    /// Scan a first page, then load further pages
    More(MoreCmd),

    /// Newest minted token ids from registry events
    Recent(RecentCmd),

    /// Resolve a single token id
    Resolve(ResolveCmd),

    /// Classify a content identifier without touching the network
    Classify(ClassifyCmd),

    /// Inspect or import cached mint records
    Cache(CacheCmd),
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli {
        command,
        rpc_url,
        registry,
        store_dir,
        key_prefix,
        json,
        verbose,
    } = Cli::parse();
    init_logging(verbose);

    let mut config = story_discovery::DiscoveryConfig::from_env();
    if let Some(rpc_url) = rpc_url {
        config.rpc_url = rpc_url;
    }
    if let Some(registry) = registry {
        config.registry_address = registry;
    }
    if let Some(store_dir) = store_dir {
        config.store_dir = store_dir;
    }
    if let Some(key_prefix) = key_prefix {
        config.key_prefix = key_prefix;
    }
    let ctx = CliContext {
        config,
        json,
        verbose,
    };

    match command {
        Commands::Scan(cmd) => cmd.execute(&ctx).await,
        Commands::Window(cmd) => cmd.execute(&ctx).await,
        Commands::More(cmd) => cmd.execute(&ctx).await,
        Commands::Recent(cmd) => cmd.execute(&ctx).await,
        Commands::Resolve(cmd) => cmd.execute(&ctx).await,
        Commands::Classify(cmd) => cmd.execute(&ctx),
        Commands::Cache(cmd) => cmd.execute(&ctx),
    }
}
