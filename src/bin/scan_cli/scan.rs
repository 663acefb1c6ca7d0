//! Scan commands: full, windowed, paged and recent.

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use story_discovery::{DiscoveryEngine, ScanEvent, ScanMode, ScanSession, VisibleSet};
use tracing::warn;

use super::output::{format_record, print_json, print_visible};
use super::{build_engine, CliContext};

/// Drive `mode` to completion, printing records as they arrive in human mode.
async fn run(
    engine: &DiscoveryEngine,
    mode: ScanMode,
    session: &mut ScanSession,
    visible: &mut VisibleSet,
    ctx: &CliContext,
) {
    engine
        .run_scan(mode, session, visible, |event| print_event(event, ctx))
        .await;
}

fn print_event(event: &ScanEvent, ctx: &CliContext) {
    if let (ScanEvent::Found(record), false) = (event, ctx.json) {
        println!("{}", format_record(record, ctx.verbose));
    }
}

#[derive(Parser, Debug)]
pub struct ScanCmd {
    /// First id to check
    #[arg(long)]
    start: Option<u64>,

    /// Maximum number of ids to check
    #[arg(long)]
    limit: Option<u64>,

    /// Stop after this many consecutive missing ids
    #[arg(long)]
    miss_threshold: Option<u64>,
}

impl ScanCmd {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let mut config = ctx.config.clone();
        if let Some(threshold) = self.miss_threshold {
            config.scan.miss_threshold = threshold;
        }
        let engine = build_engine(&config)?;
        let mut session = ScanSession::new();
        let mut visible = VisibleSet::new();
        let mode = ScanMode::Full {
            start: self.start,
            limit: self.limit,
        };
        run(&engine, mode, &mut session, &mut visible, ctx).await;
        print_visible(&visible, ctx.json)
    }
}

#[derive(Parser, Debug)]
pub struct WindowCmd {
    /// Center id (default: newest minted id from registry events)
    #[arg(long)]
    center: Option<u64>,

    /// How far below the center to look
    #[arg(long)]
    span: Option<u64>,
}

impl WindowCmd {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let engine = ctx.engine()?;
        let center = match self.center {
            Some(center) => Some(center),
            None => match engine.scanner().latest_hint().await {
                Ok(hint) => hint,
                Err(e) => {
                    warn!(error = %e, "no recent mint hint, centering on the highest cached id");
                    None
                }
            },
        };
        let mut session = ScanSession::new();
        let mut visible = VisibleSet::new();
        let mode = ScanMode::Windowed {
            center,
            span: self.span,
        };
        run(&engine, mode, &mut session, &mut visible, ctx).await;
        print_visible(&visible, ctx.json)
    }
}

#[derive(Parser, Debug)]
pub struct MoreCmd {
    /// Number of additional pages after the first
    #[arg(long, default_value_t = 1)]
    pages: usize,
}

impl MoreCmd {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let engine = ctx.engine()?;
        let mut session = ScanSession::new();
        let mut visible = VisibleSet::new();
        let first = ScanMode::Full {
            start: None,
            limit: Some(ctx.config.scan.page_size),
        };
        run(&engine, first, &mut session, &mut visible, ctx).await;

        for page in 0..self.pages {
            if engine.governor().is_exhausted() {
                warn!(page, "call budget exhausted, not loading further pages");
                break;
            }
            engine
                .run_load_more(&mut session, &mut visible, |event| print_event(event, ctx))
                .await;
        }
        print_visible(&visible, ctx.json)
    }
}

#[derive(Parser, Debug)]
pub struct RecentCmd {
    /// Number of recent blocks to search
    #[arg(long)]
    lookback: Option<u64>,

    /// Maximum number of ids to return
    #[arg(long)]
    max: Option<usize>,
}

impl RecentCmd {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let engine = ctx.engine()?;
        let lookback = self.lookback.unwrap_or(ctx.config.scan.recent_lookback_blocks);
        let max = self.max.unwrap_or(ctx.config.scan.recent_max);
        let ids = engine
            .resolver()
            .recent_token_ids(lookback, max)
            .await
            .context("Failed to read recent mint events")?;

        if ctx.json {
            return print_json(&json!({ "lookback_blocks": lookback, "ids": ids }));
        }
        if ids.is_empty() {
            println!("No mints in the last {lookback} blocks");
        } else {
            for id in ids {
                println!("{id}");
            }
        }
        Ok(())
    }
}
