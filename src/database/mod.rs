//! Database module
//!
//! This module provides the physical storage for entity tables:
//!
//! - **core**: SQLite connection wrapper and the bookkeeping schema
//! - **sqlite**: the SQLite [`DatabaseBackend`](crate::router::DatabaseBackend)
//!   and its property handlers
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── connection  # SQLite DatabaseConn wrapper
//! │   └── schema      # entity_tables_meta bookkeeping table
//! │
//! └── sqlite/         # Entity storage
//!     ├── mod         # SqliteBackend: create/alter/list/drop tables
//!     └── handler     # SqlitePropertyHandler: per-column upserts
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use entity_tables::database::SqliteBackend;
//! use entity_tables::{EntityDefs, SchemaRegistry};
//!
//! let backend = Arc::new(SqliteBackend::open("entities.sqlite3")?);
//! let mut registry = SchemaRegistry::new(backend.clone());
//! registry.load(&EntityDefs::load_from_path("entities.json")?)?;
//! let report = registry.sync_all()?;
//! backend.record_sync(&report)?;
//! ```

pub mod core;
pub mod sqlite;

pub use core::{
    DatabaseConn, SchemaDefinitions, SchemaManager, SchemaStatus, META_TABLE_NAME, SCHEMA_VERSION,
};
pub use sqlite::{encode_text_value, SharedConn, SqliteBackend, SqlitePropertyHandler};

/// Ensure the data directory exists
pub fn ensure_data_dir(data_dir: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create data directory '{}': {}", data_dir, e))
}
