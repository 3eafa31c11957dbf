use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;

use drop_ledger::{CLAIMS_COLLECTION, INDEX_PREFIX, ITEMS_COLLECTION};
use drop_server::{DropServer, ServerConfig};
use drop_store::{FileKvStore, KvStore, ShardedList, DEFAULT_CHUNK_SIZE};
use drop_types::{Assignment, Item};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Inspect(args) => cmd_inspect(args, cli.format),
    }
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = ServerConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    let storage = match &config.data_dir {
        Some(dir) => dir.display().to_string(),
        None => "in-memory".to_string(),
    };
    println!(
        "{} dropd on {} ({} campaigns, storage: {})",
        "▶".green().bold(),
        config.bind_addr.to_string().bold(),
        config.campaigns.len(),
        storage.cyan()
    );
    DropServer::new(config)?.serve().await?;
    Ok(())
}

/// Counts read from a campaign's file-backed store.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub campaign: String,
    pub catalog_items: usize,
    pub catalog_shards: usize,
    pub claims: usize,
    pub claim_shards: usize,
    pub index_records: usize,
    /// Committed claims per category.
    pub claimed_by_category: BTreeMap<String, usize>,
}

pub fn summarize(data_dir: &Path, campaign: &str) -> anyhow::Result<StoreSummary> {
    let root = data_dir.join(campaign);
    if !root.is_dir() {
        bail!("no store for campaign {campaign} under {}", data_dir.display());
    }
    let store: Arc<dyn KvStore> = Arc::new(FileKvStore::open(&root)?);
    let catalog: ShardedList<Item> =
        ShardedList::open(Arc::clone(&store), ITEMS_COLLECTION, DEFAULT_CHUNK_SIZE)?;
    let claims: ShardedList<Assignment> =
        ShardedList::open(Arc::clone(&store), CLAIMS_COLLECTION, DEFAULT_CHUNK_SIZE)?;

    let mut claimed_by_category = BTreeMap::new();
    for assignment in claims.iter() {
        *claimed_by_category
            .entry(assignment.category.to_string())
            .or_insert(0) += 1;
    }

    Ok(StoreSummary {
        campaign: campaign.to_string(),
        catalog_items: catalog.len(),
        catalog_shards: catalog.shard_count(),
        claims: claims.len(),
        claim_shards: claims.shard_count(),
        index_records: store.keys_with_prefix(INDEX_PREFIX)?.len(),
        claimed_by_category,
    })
}

fn cmd_inspect(args: InspectArgs, format: OutputFormat) -> anyhow::Result<()> {
    let summary = summarize(&args.data_dir, &args.campaign)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => {
            println!("Campaign {}", summary.campaign.yellow().bold());
            println!(
                "  Catalog: {} items in {} shards",
                summary.catalog_items.to_string().bold(),
                summary.catalog_shards
            );
            println!(
                "  Claims:  {} in {} shards",
                summary.claims.to_string().bold(),
                summary.claim_shards
            );
            for (category, count) in &summary.claimed_by_category {
                println!("    {} {}", category.cyan(), count);
            }
            let expected = summary.claims * 3;
            if summary.index_records == expected {
                println!("  Index:   {} records {}", summary.index_records, "✓".green());
            } else {
                println!(
                    "  Index:   {} records, expected {} {}",
                    summary.index_records,
                    expected,
                    "(repaired on next start)".yellow()
                );
            }
        }
    }
    Ok(())
}
