use std::collections::BTreeSet;

use anyhow::Result;
use clap::Args;
use entity_tables::router::physical_table_name;
use entity_tables::{format_size, get_database_info, EntityDefs, EntityTablesConfig};
use serde::Serialize;

use super::print_json;

/// Arguments for the Status command
#[derive(Args)]
pub struct StatusArgs {
    /// Also compare the database against the entity definitions
    #[clap(short, long)]
    pub verbose: bool,
}

/// Difference between the definitions and the physical tables
#[derive(Debug, Serialize)]
pub(crate) struct Drift {
    /// Defined entity types without a physical table
    missing: Vec<String>,
    /// Physical tables no entity type maps to
    orphans: Vec<String>,
}

pub fn run(config: &EntityTablesConfig, args: StatusArgs, json: bool) -> Result<()> {
    let StatusArgs { verbose } = args;
    let info = get_database_info(config);

    if json {
        print_json(&info)?;
    } else {
        println!("SQLite Database:");
        println!("  Path:           {}", info.path);
        println!(
            "  Status:         {}",
            if info.exists { "exists" } else { "not created" }
        );
        if let Some(size) = info.size_bytes {
            println!("  Size:           {}", format_size(size));
        }
        println!(
            "  Last sync:      {}",
            info.last_sync.as_deref().unwrap_or("never")
        );
        println!();

        println!("Entity Tables:");
        if info.tables.is_empty() {
            println!("  (none)");
        }
        for table in &info.tables {
            println!("  {:<32} {:>10} rows", table.table, table.rows);
        }
    }

    if verbose {
        if !json {
            println!();
        }
        print_drift(config, json)?;
    }
    Ok(())
}

pub(crate) fn drift(config: &EntityTablesConfig) -> Result<Drift> {
    let defs = EntityDefs::load_from_path(config.definitions_path())?;
    let defined: BTreeSet<String> = defs.iter().map(|d| physical_table_name(&d.name)).collect();
    let present: BTreeSet<String> = get_database_info(config)
        .tables
        .into_iter()
        .map(|t| t.table)
        .collect();

    Ok(Drift {
        missing: defined.difference(&present).cloned().collect(),
        orphans: present.difference(&defined).cloned().collect(),
    })
}

pub(crate) fn print_drift(config: &EntityTablesConfig, json: bool) -> Result<()> {
    let drift = drift(config)?;
    if json {
        return print_json(&drift);
    }

    if drift.missing.is_empty() && drift.orphans.is_empty() {
        println!("Database is in sync with the definitions");
        return Ok(());
    }
    for table in &drift.missing {
        println!("  create  {}", table);
    }
    for table in &drift.orphans {
        println!("  drop    {}", table);
    }
    Ok(())
}
