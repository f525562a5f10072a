//! Core database infrastructure
//!
//! - `DatabaseConn`: SQLite connection wrapper with configuration
//! - `SchemaManager`: bookkeeping table initialization and metadata access
//! - `SchemaStatus`: bookkeeping schema state

mod connection;
mod schema;

pub use connection::DatabaseConn;
pub use schema::{SchemaDefinitions, SchemaManager, SchemaStatus, META_TABLE_NAME, SCHEMA_VERSION};
