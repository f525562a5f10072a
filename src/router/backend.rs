//! Physical store interface

use anyhow::Result;

use super::handler::PropertyHandler;
use super::table::TableSchema;
use crate::entitydef::PropertyDef;

/// The physical database behind the registry
///
/// Every method may fail (store unreachable, constraint violation); failures
/// are ordinary errors, never fatal ones.
pub trait DatabaseBackend: Send + Sync {
    /// Allocate an empty schema for the entity type `name`
    fn create_table_schema(&self, name: &str) -> TableSchema {
        TableSchema::new(name)
    }

    /// Build the handler persisting `property` into `table`
    ///
    /// `table` is the physical table name.
    fn create_handler(&self, table: &str, property: &PropertyDef)
        -> Result<Box<dyn PropertyHandler>>;

    /// Create the physical table for `schema`, or alter it to match the
    /// handler set if it already exists
    fn sync_table(&self, schema: &TableSchema) -> Result<()>;

    /// Physical table names starting with `prefix`
    fn list_table_names(&self, prefix: &str) -> Result<Vec<String>>;

    /// Drop a physical table
    fn drop_table(&self, name: &str) -> Result<()>;

    /// Open a write transaction. Default: no transaction support.
    fn begin_write(&self) -> Result<()> {
        Ok(())
    }

    fn commit_write(&self) -> Result<()> {
        Ok(())
    }

    fn rollback_write(&self) -> Result<()> {
        Ok(())
    }
}
