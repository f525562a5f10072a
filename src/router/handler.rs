//! Per-property persistence handlers

use anyhow::Result;

use super::stream::RecordStream;
use super::{DbId, PropertyUid};
use crate::entitydef::{EntityDef, PropertyType};

/// Prefix of every property column
pub const COLUMN_PREFIX: &str = "sm_";

/// Physical column backing one property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: PropertyType,
}

impl ColumnDef {
    /// Column for a property, named `sm_<property>`
    pub fn for_property(property: &str, kind: PropertyType) -> Self {
        Self {
            name: format!("{}{}", COLUMN_PREFIX, property),
            kind,
        }
    }
}

/// One persistable property of a table
///
/// Handlers are created by the [`DatabaseBackend`](super::DatabaseBackend)
/// and owned by their [`TableSchema`](super::TableSchema).
pub trait PropertyHandler: Send + Sync {
    /// The property uid this handler is registered under
    fn uid(&self) -> PropertyUid;

    /// The property name
    fn name(&self) -> &str;

    /// The column this property needs; consulted when the table is synced
    fn column(&self) -> ColumnDef;

    /// Consume this property's encoded value from `stream` and persist it for
    /// `entity_id`.
    ///
    /// Must read exactly the bytes of its own value, no more and no less.
    fn update(&self, entity_id: DbId, stream: &mut RecordStream<'_>, def: &EntityDef)
        -> Result<()>;
}

impl std::fmt::Debug for dyn PropertyHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyHandler")
            .field("uid", &self.uid())
            .field("name", &self.name())
            .finish()
    }
}
