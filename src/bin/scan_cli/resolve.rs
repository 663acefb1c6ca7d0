//! Single-token resolution and content identifier classification.

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use story_discovery::Resolution;
use story_discovery_types::{classify, strip_cid_prefix, CidClass};

use super::output::{format_record, print_json};
use super::CliContext;

#[derive(Parser, Debug)]
pub struct ResolveCmd {
    /// Token id
    id: u64,
}

impl ResolveCmd {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let engine = ctx.engine()?;
        let resolution = engine
            .resolver()
            .resolve(self.id)
            .await
            .with_context(|| format!("Failed to resolve token {}", self.id))?;

        match (resolution, ctx.json) {
            (Resolution::Resolved(record), true) => print_json(&record),
            (Resolution::Resolved(record), false) => {
                println!("{}", format_record(&record, true));
                Ok(())
            }
            (Resolution::NotExistent, true) => {
                print_json(&json!({ "id": self.id, "status": "not_existent" }))
            }
            (Resolution::NotExistent, false) => {
                println!("Token {} has not been minted", self.id);
                Ok(())
            }
            (Resolution::Unresolvable, true) => {
                print_json(&json!({ "id": self.id, "status": "unresolvable" }))
            }
            (Resolution::Unresolvable, false) => {
                println!(
                    "Token {} exists but its content is unavailable and no cached record was found",
                    self.id
                );
                Ok(())
            }
        }
    }
}

#[derive(Parser, Debug)]
pub struct ClassifyCmd {
    /// Content identifier, bare or as an ipfs:// or gateway URL
    identifier: String,
}

fn describe(class: CidClass) -> &'static str {
    match class {
        CidClass::ValidV0 => "valid CIDv0",
        CidClass::ValidV1 => "valid CIDv1",
        CidClass::Invalid => "invalid",
        CidClass::NullPlaceholder => "unpublished placeholder",
    }
}

impl ClassifyCmd {
    pub fn execute(&self, ctx: &CliContext) -> Result<()> {
        let class = classify(&self.identifier);
        if ctx.json {
            return print_json(&json!({
                "identifier": self.identifier,
                "cid": strip_cid_prefix(&self.identifier),
                "class": class,
                "fetchable": class.is_valid(),
            }));
        }
        println!("{}: {}", strip_cid_prefix(&self.identifier), describe(class));
        Ok(())
    }
}
