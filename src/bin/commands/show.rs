use anyhow::{anyhow, Result};
use clap::Args;
use entity_tables::router::physical_table_name;
use entity_tables::{DbId, EntityTablesConfig};

use super::{open_session, print_json};

/// Arguments for the Show command
#[derive(Args)]
pub struct ShowArgs {
    /// Entity type name
    #[clap()]
    pub entity: String,

    /// Entity database id
    #[clap()]
    pub id: DbId,
}

pub fn run(config: &EntityTablesConfig, args: ShowArgs, json: bool) -> Result<()> {
    let ShowArgs { entity, id } = args;

    let session = open_session(config)?;
    if session.registry.find_table(&entity).is_none() {
        return Err(anyhow!("Unknown entity type '{}'", entity));
    }

    let row = session
        .backend
        .load_row(&physical_table_name(&entity), id)?
        .ok_or_else(|| anyhow!("No {} with id {}", entity, id))?;

    if json {
        return print_json(&row);
    }

    if let Some(object) = row.as_object() {
        for (column, value) in object {
            println!("{:<32} {}", column, value);
        }
    }
    Ok(())
}
