pub mod config;
pub mod show;
pub mod status;
pub mod sync;
pub mod tables;
pub mod write;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use entity_tables::database::ensure_data_dir;
use entity_tables::{EntityDefs, EntityTablesConfig, SchemaRegistry, SqliteBackend};
use serde::Serialize;

/// Everything a command needs to reach the entity tables
pub(crate) struct Session {
    pub defs: EntityDefs,
    pub backend: Arc<SqliteBackend>,
    pub registry: SchemaRegistry,
}

/// Load the definitions and open the database; the registry is not ready yet
pub(crate) fn load_session(config: &EntityTablesConfig) -> Result<Session> {
    let defs = EntityDefs::load_from_path(config.definitions_path())?;

    ensure_data_dir(&config.data_dir)?;
    let backend = Arc::new(SqliteBackend::open(&config.sqlite_path())?);

    let mut registry = SchemaRegistry::new(backend.clone())
        .with_transactional_writes(config.transactional_writes);
    registry
        .load(&defs)
        .map_err(|e| anyhow!("Failed to load entity definitions: {}", e))?;

    Ok(Session {
        defs,
        backend,
        registry,
    })
}

/// Session over tables reconciled by an earlier `sync`; never alters the store
pub(crate) fn open_session(config: &EntityTablesConfig) -> Result<Session> {
    let mut session = load_session(config)?;
    session
        .registry
        .attach()
        .map_err(|e| anyhow!("{} (run `entity-tables sync` first)", e))?;
    Ok(session)
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| anyhow!("Failed to serialize to JSON: {}", e))?;
    println!("{}", json);
    Ok(())
}
