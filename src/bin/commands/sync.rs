use anyhow::{anyhow, Result};
use clap::Args;
use entity_tables::EntityTablesConfig;
use serde::Serialize;

use super::{load_session, print_json};

/// Arguments for the Sync command
#[derive(Args)]
pub struct SyncArgs {
    /// Only report what is out of sync, without touching the database
    #[clap(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct SyncSummary {
    database: String,
    synced: Vec<String>,
    dropped: Vec<String>,
}

pub fn run(config: &EntityTablesConfig, args: SyncArgs, json: bool) -> Result<()> {
    let SyncArgs { dry_run } = args;

    if dry_run {
        return super::status::print_drift(config, json);
    }

    let mut session = load_session(config)?;
    let report = session
        .registry
        .sync_all()
        .map_err(|e| anyhow!("Failed to sync entity tables: {}", e))?;
    session.backend.record_sync(&report)?;

    let summary = SyncSummary {
        database: config.sqlite_path(),
        synced: report.synced,
        dropped: report.dropped,
    };

    if json {
        return print_json(&summary);
    }

    println!("Database: {}", summary.database);
    println!("Synced {} tables", summary.synced.len());
    for table in &summary.synced {
        println!("  {}", table);
    }
    if !summary.dropped.is_empty() {
        println!("Dropped {} orphan tables", summary.dropped.len());
        for table in &summary.dropped {
            println!("  {}", table);
        }
    }
    Ok(())
}
