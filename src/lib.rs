#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! entity-tables - entity-to-table persistence routing
//!
//! entity-tables maps each entity type of a simulation to one relational
//! table, keeps those tables in sync with the entity definitions, and routes
//! every write record to the handler that persists each property. It can be
//! used as both a command-line application and a library.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `cli` | `entity-tables` binary (default) | `clap`, `tracing-subscriber` |
//!
//! ```toml
//! # Library only
//! entity-tables = { version = "0.1", default-features = false }
//! ```
//!
//! # Architecture
//!
//! - **[`router`]**: the storage-agnostic core
//!   - `SchemaRegistry`: all tables, sync/reconciliation, serialized writes
//!   - `TableSchema`: one entity type's table and its property handlers
//!   - `RecordStream` / `RecordBuilder`: the write record format
//!   - `DatabaseBackend` / `PropertyHandler`: seams to the physical store
//!
//! - **[`database`]**: the SQLite backend
//!   - `core`: connection wrapper and the bookkeeping meta table
//!   - `sqlite`: `SqliteBackend` and per-column property handlers
//!
//! - **[`entitydef`]**: entity definitions loaded from JSON
//!
//! - **[`config`]**: configuration management
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use entity_tables::{EntityDefs, RecordBuilder, RecordStream, SchemaRegistry, SqliteBackend};
//!
//! let defs = EntityDefs::load_from_path("entities.json")?;
//! let backend = Arc::new(SqliteBackend::open("entities.sqlite3")?);
//!
//! let mut registry = SchemaRegistry::new(backend.clone());
//! registry.load(&defs)?;
//! let report = registry.sync_all()?;
//! backend.record_sync(&report)?;
//!
//! // uid 1 = level (uint16), uid 2 = nickname (string)
//! let mut record = RecordBuilder::new();
//! record.uid(1).put_u16(12).uid(2).put_string("kestrel");
//!
//! let avatar = defs.find("Avatar").ok_or_else(|| anyhow::anyhow!("no Avatar"))?;
//! let mut stream = RecordStream::new(record.as_bytes());
//! registry.write_entity(42, &mut stream, avatar)?;
//! ```

pub mod config;
pub mod database;
pub mod entitydef;
pub mod router;

// =============================================================================
// Configuration
// =============================================================================

pub use crate::config::EntityTablesConfig;

// Shared database info types (used by the status and config commands)
pub use crate::config::{format_size, get_database_info, DatabaseInfo, EntityTableInfo};

// =============================================================================
// Router
// =============================================================================

pub use router::{
    DatabaseBackend, DbId, PropertyHandler, PropertyUid, RecordBuilder, RecordStream,
    RegistryState, RouterError, SchemaRegistry, StreamError, SyncReport, TableSchema,
};

// =============================================================================
// Definitions and storage
// =============================================================================

pub use database::{DatabaseConn, SchemaManager, SchemaStatus, SqliteBackend, SCHEMA_VERSION};
pub use entitydef::{EntityDef, EntityDefs, PropertyDef, PropertyType};
