use anyhow::Result;
use clap::Args;
use entity_tables::router::{physical_table_name, ColumnDef};
use entity_tables::{EntityDefs, EntityTablesConfig};
use serde::Serialize;

use super::print_json;

/// Arguments for the Tables command
#[derive(Args)]
pub struct TablesArgs {
    /// Only show this entity type
    #[clap()]
    pub entity: Option<String>,
}

#[derive(Debug, Serialize)]
struct TableView {
    entity: String,
    table: String,
    columns: Vec<ColumnView>,
}

#[derive(Debug, Serialize)]
struct ColumnView {
    uid: i32,
    column: String,
    #[serde(rename = "type")]
    kind: String,
}

pub fn run(config: &EntityTablesConfig, args: TablesArgs, json: bool) -> Result<()> {
    let TablesArgs { entity } = args;
    let defs = EntityDefs::load_from_path(config.definitions_path())?;

    let views: Vec<TableView> = defs
        .iter()
        .filter(|def| entity.as_deref().map_or(true, |name| name == def.name))
        .map(|def| TableView {
            entity: def.name.clone(),
            table: physical_table_name(&def.name),
            columns: def
                .persistent_properties()
                .map(|p| ColumnView {
                    uid: p.uid,
                    column: ColumnDef::for_property(&p.name, p.kind).name,
                    kind: p.kind.to_string(),
                })
                .collect(),
        })
        .collect();

    if let Some(name) = &entity {
        if views.is_empty() {
            return Err(anyhow::anyhow!("Unknown entity type '{}'", name));
        }
    }

    if json {
        return print_json(&views);
    }

    for view in &views {
        println!("{} -> {}", view.entity, view.table);
        println!("  {:>6}  {:<32} {}", "uid", "column", "type");
        for column in &view.columns {
            println!("  {:>6}  {:<32} {}", column.uid, column.column, column.kind);
        }
        println!();
    }
    Ok(())
}
