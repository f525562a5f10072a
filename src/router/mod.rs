//! Entity persistence routing
//!
//! This module maps entity types to physical tables and routes write records
//! to per-property handlers:
//!
//! - [`SchemaRegistry`]: owns every [`TableSchema`], syncs them with the
//!   store, serializes writes
//! - [`TableSchema`]: one entity type's table and its [`PropertyHandler`]s
//! - [`RecordStream`]: forward-only cursor over a write record
//! - [`DatabaseBackend`]: the physical store
//!
//! # Write path
//!
//! ```text
//! SchemaRegistry::write_entity      (registry-wide write lock)
//!   └── TableSchema::update         (uid → handler, until stream exhausted)
//!         └── PropertyHandler::update   (decode one value, persist it)
//! ```

mod backend;
mod error;
mod handler;
mod registry;
mod stream;
mod table;

#[cfg(test)]
pub(crate) mod testing;

/// Property identifier, unique within one entity type
pub type PropertyUid = i32;

/// Database id of an entity record
pub type DbId = u64;

pub use backend::DatabaseBackend;
pub use error::RouterError;
pub use handler::{ColumnDef, PropertyHandler, COLUMN_PREFIX};
pub use registry::{RegistryState, SchemaRegistry, SyncReport};
pub use stream::{RecordBuilder, RecordStream, StreamError};
pub use table::{logical_table_name, physical_table_name, TableSchema, TABLE_PREFIX};
