//! Human-readable and JSON rendering of records and scan results.

use anyhow::Result;
use serde::Serialize;
use story_discovery::{ScanSummary, StopReason, VisibleSet};
use story_discovery_types::TokenRecord;

const STORY_PREVIEW_CHARS: usize = 160;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn format_record(record: &TokenRecord, verbose: bool) -> String {
    let mut out = format!(
        "#{:<5} {}  by {}  [{}]  {}  ({})",
        record.id,
        record.title,
        record.author,
        record.genre,
        record.content_type.label(),
        record.resolution_source.label(),
    );
    if verbose {
        if let Some(owner) = &record.owner {
            out.push_str(&format!("\n       owner: {owner}"));
        }
        if !record.description.is_empty() {
            out.push_str(&format!("\n       {}", record.description));
        }
        if let Some(image) = &record.image_url {
            out.push_str(&format!("\n       cover: {image}"));
        }
        if record.images.len() > 1 {
            out.push_str(&format!("\n       images: {}", record.images.len()));
        }
        if !record.story_content.is_empty() {
            out.push_str(&format!("\n       {}", preview(&record.story_content)));
        }
    }
    out
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= STORY_PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(STORY_PREVIEW_CHARS).collect();
    format!("{cut}…")
}

pub fn format_stop(stop: &StopReason) -> String {
    match stop {
        StopReason::RangeExhausted => "range exhausted".to_string(),
        StopReason::SoftStop { consecutive_misses } => {
            format!("soft stop after {consecutive_misses} consecutive misses")
        }
        StopReason::CallBudget => "call budget exhausted".to_string(),
        StopReason::Aborted { error } => format!("aborted: {error}"),
    }
}

pub fn format_summary(summary: &ScanSummary) -> String {
    let mut out = format!(
        "Found {} record(s), checked {} id(s) ({} not minted, {} unresolvable), {} call(s), {} throttled; {}",
        summary.found,
        summary.checked,
        summary.not_existent,
        summary.unresolvable,
        summary.calls,
        summary.throttled,
        format_stop(&summary.stop),
    );
    if !summary.deferred.is_empty() {
        out.push_str(&format!("\nStill unresolved after retry: {:?}", summary.deferred));
    }
    out
}

#[derive(Serialize)]
struct VisibleSetJson<'a> {
    records: &'a [TokenRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a ScanSummary>,
}

/// Final output of a scan command. Human mode prints only the summary: records were
/// already printed as they arrived.
pub fn print_visible(visible: &VisibleSet, json_output: bool) -> Result<()> {
    if json_output {
        return print_json(&VisibleSetJson {
            records: visible.records(),
            summary: visible.summary(),
        });
    }
    if let Some(summary) = visible.summary() {
        println!("{}", format_summary(summary));
    }
    Ok(())
}
