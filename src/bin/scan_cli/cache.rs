//! Cached mint record commands.
//!
//! `import` accepts either one record (with `--id`) or an object of
//! `"<prefix>_<id>": record` entries, such as a browser storage export where
//! each value may itself be a JSON-encoded string.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use story_cache::{as_record, parse_token_key, record_key, LocalRecordStore};
use story_discovery::{reconcile, ContentStoreParts};
use story_discovery_types::TokenId;

use super::output::{format_record, print_json};
use super::CliContext;

#[derive(Parser, Debug)]
pub struct CacheCmd {
    #[command(subcommand)]
    command: CacheSubcommand,
}

#[derive(Subcommand, Debug)]
enum CacheSubcommand {
    /// List cached token records
    List,
    /// Show the record the cache alone resolves for a token
    Show {
        /// Token id
        id: TokenId,
        /// Print the raw stored document instead
        #[arg(long)]
        raw: bool,
    },
    /// Import records from a JSON file
    Import {
        /// JSON file to import
        file: PathBuf,
        /// Store the file as the record of this token
        #[arg(long)]
        id: Option<TokenId>,
    },
}

#[derive(Debug, Serialize)]
struct CacheListItem {
    id: TokenId,
    key: String,
    title: Option<String>,
}

impl CacheCmd {
    pub fn execute(&self, ctx: &CliContext) -> Result<()> {
        let store = ctx.store()?;
        let prefix = ctx.config.key_prefix.as_str();
        match &self.command {
            CacheSubcommand::List => list_records(&store, prefix, ctx.json),
            CacheSubcommand::Show { id, raw } => show_record(&store, prefix, *id, *raw, ctx),
            CacheSubcommand::Import { file, id } => import_records(&store, prefix, file, *id, ctx.json),
        }
    }
}

fn list_records(store: &dyn LocalRecordStore, prefix: &str, json_output: bool) -> Result<()> {
    let ids = store
        .known_token_ids(prefix)
        .context("Failed to list cached records")?;
    let mut items = Vec::with_capacity(ids.len());
    for id in ids {
        let title = store
            .get_token(prefix, id)
            .with_context(|| format!("Failed to read cached record for token {id}"))?
            .and_then(|r| r.title().map(str::to_string));
        items.push(CacheListItem {
            id,
            key: record_key(prefix, id),
            title,
        });
    }

    if json_output {
        return print_json(&items);
    }
    if items.is_empty() {
        println!("No cached records");
    }
    for item in &items {
        println!("#{:<5} {}", item.id, item.title.as_deref().unwrap_or("(untitled)"));
    }
    Ok(())
}

fn show_record(
    store: &dyn LocalRecordStore,
    prefix: &str,
    id: TokenId,
    raw: bool,
    ctx: &CliContext,
) -> Result<()> {
    let key = record_key(prefix, id);
    let value = store
        .get(&key)
        .with_context(|| format!("Failed to read {key}"))?
        .ok_or_else(|| anyhow!("No cached record for token {id}"))?;
    if raw {
        return print_json(&value);
    }

    let cached = as_record(&value).ok_or_else(|| anyhow!("Cached record {key} is not a JSON object"))?;
    let record = reconcile(ContentStoreParts::new(id), Some(&cached))
        .ok_or_else(|| anyhow!("Cached record {key} resolves to nothing"))?;
    if ctx.json {
        print_json(&record)
    } else {
        println!("{}", format_record(&record, true));
        Ok(())
    }
}

fn import_records(
    store: &dyn LocalRecordStore,
    prefix: &str,
    file: &Path,
    id: Option<TokenId>,
    json_output: bool,
) -> Result<()> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let document: Value = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid JSON in {}", file.display()))?;

    let mut imported = Vec::new();
    let mut skipped = Vec::new();
    match id {
        Some(id) => {
            if as_record(&document).is_none() {
                bail!("{} does not contain a record object", file.display());
            }
            let key = record_key(prefix, id);
            store
                .put(&key, &document)
                .with_context(|| format!("Failed to store {key}"))?;
            imported.push(id);
        }
        None => {
            let Value::Object(entries) = document else {
                bail!(
                    "{} must be an object of \"{prefix}_<id>\" entries (or pass --id)",
                    file.display()
                );
            };
            for (key, value) in entries {
                match parse_token_key(prefix, &key) {
                    Some(id) if as_record(&value).is_some() => {
                        store
                            .put(&key, &value)
                            .with_context(|| format!("Failed to store {key}"))?;
                        imported.push(id);
                    }
                    _ => skipped.push(key),
                }
            }
        }
    }

    if json_output {
        return print_json(&json!({ "imported": imported, "skipped": skipped }));
    }
    println!("Imported {} record(s)", imported.len());
    if !skipped.is_empty() {
        println!("Skipped {} key(s): {}", skipped.len(), skipped.join(", "));
    }
    Ok(())
}
