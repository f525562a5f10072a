use anyhow::{anyhow, Result};
use clap::Args;
use entity_tables::database::encode_text_value;
use entity_tables::{DbId, EntityTablesConfig, RecordBuilder, RecordStream};
use serde::Serialize;
use tracing::info;

use super::{open_session, print_json};

/// Arguments for the Write command
#[derive(Args)]
pub struct WriteArgs {
    /// Entity type name
    #[clap()]
    pub entity: String,

    /// Entity database id
    #[clap()]
    pub id: DbId,

    /// Property values as name=value pairs, e.g. level=12 nickname=kestrel
    #[clap(required = true)]
    pub values: Vec<String>,
}

#[derive(Debug, Serialize)]
struct WriteSummary {
    entity: String,
    id: DbId,
    applied: usize,
}

pub fn run(config: &EntityTablesConfig, args: WriteArgs, json: bool) -> Result<()> {
    let WriteArgs { entity, id, values } = args;

    let session = open_session(config)?;
    let def = session
        .defs
        .find(&entity)
        .ok_or_else(|| anyhow!("Unknown entity type '{}'", entity))?;

    let mut record = RecordBuilder::new();
    for pair in &values {
        let (name, text) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected name=value, got '{}'", pair))?;
        let property = def
            .properties
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| anyhow!("{} has no property '{}'", entity, name))?;
        if !property.persistent {
            return Err(anyhow!("Property '{}' is not persistent", name));
        }
        record.uid(property.uid);
        encode_text_value(property.kind, text, &mut record)?;
    }

    info!("writing {} bytes to {} {}", record.len(), entity, id);
    let mut stream = RecordStream::new(record.as_bytes());
    let applied = session.registry.write_entity(id, &mut stream, def)?;

    let summary = WriteSummary {
        entity,
        id,
        applied,
    };
    if json {
        return print_json(&summary);
    }
    println!(
        "Wrote {} properties of {} {}",
        summary.applied, summary.entity, summary.id
    );
    Ok(())
}
