//! In-memory descriptor of one entity type's table

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, error, warn};

use super::backend::DatabaseBackend;
use super::error::RouterError;
use super::handler::{ColumnDef, PropertyHandler};
use super::stream::RecordStream;
use super::{DbId, PropertyUid};
use crate::entitydef::EntityDef;

/// Namespace prefix of every entity table
///
/// Physical names are `tbl_<entity>`. Orphan detection relies on this exact
/// form, delimiter included.
pub const TABLE_PREFIX: &str = "tbl";

/// Physical table name of an entity type
pub fn physical_table_name(name: &str) -> String {
    format!("{}_{}", TABLE_PREFIX, name)
}

/// Entity type name of a physical table, if it lives in the entity namespace
pub fn logical_table_name(physical: &str) -> Option<&str> {
    physical
        .strip_prefix(TABLE_PREFIX)
        .and_then(|rest| rest.strip_prefix('_'))
        .filter(|name| !name.is_empty())
}

/// The table of one entity type and its property handlers
#[derive(Debug)]
pub struct TableSchema {
    name: String,
    table_name: String,
    handlers: BTreeMap<PropertyUid, Box<dyn PropertyHandler>>,
}

impl TableSchema {
    /// Create an empty schema for the entity type `name`
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            table_name: physical_table_name(name),
            handlers: BTreeMap::new(),
        }
    }

    /// Populate handlers from a definition
    ///
    /// Every persistent property gets a handler built by the backend. A uid
    /// declared twice in one definition is rejected.
    pub fn initialize(
        &mut self,
        backend: &dyn DatabaseBackend,
        def: &EntityDef,
    ) -> Result<(), RouterError> {
        let mut seen = HashSet::new();
        for property in &def.properties {
            if !seen.insert(property.uid) || self.handlers.contains_key(&property.uid) {
                error!(
                    "Property uid {} declared twice in entity '{}'",
                    property.uid, def.name
                );
                return Err(RouterError::DuplicateProperty {
                    table: self.name.clone(),
                    uid: property.uid,
                });
            }
        }

        for property in def.persistent_properties() {
            let handler = backend
                .create_handler(&self.table_name, property)
                .map_err(|e| {
                    RouterError::backend(
                        format!(
                            "Failed to create handler for '{}.{}'",
                            def.name, property.name
                        ),
                        e,
                    )
                })?;
            self.add_handler(handler);
        }

        debug!(
            "Initialized table '{}' with {} handlers",
            self.table_name,
            self.handlers.len()
        );
        Ok(())
    }

    /// Register a handler under its own uid, replacing any previous one
    pub fn add_handler(&mut self, handler: Box<dyn PropertyHandler>) {
        self.handlers.insert(handler.uid(), handler);
    }

    pub fn find_handler(&self, uid: PropertyUid) -> Option<&dyn PropertyHandler> {
        self.handlers.get(&uid).map(|h| h.as_ref())
    }

    /// Entity type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical table name
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn handlers(&self) -> impl Iterator<Item = &dyn PropertyHandler> {
        self.handlers.values().map(|h| h.as_ref())
    }

    /// Columns declared by the handlers, in uid order
    pub fn columns(&self) -> Vec<ColumnDef> {
        self.handlers.values().map(|h| h.column()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Create or alter the physical table to match the handler set
    pub fn sync_to_db(&self, backend: &dyn DatabaseBackend) -> Result<(), RouterError> {
        backend.sync_table(self).map_err(|e| {
            RouterError::backend(format!("Failed to sync table '{}'", self.table_name), e)
        })
    }

    /// Persist one write record for `entity_id`.
    ///
    /// Pairs are consumed until the stream is exhausted, each routed to the
    /// handler of its uid. Returns the number of properties written.
    ///
    /// The first failing handler stops the loop. Properties written before it
    /// stay written and the rest of the record is skipped; the returned
    /// [`RouterError::PropertyWrite`] reports how many were applied. An
    /// unknown uid is fatal: the cursor can no longer be trusted.
    pub fn update(
        &self,
        entity_id: DbId,
        stream: &mut RecordStream<'_>,
        def: &EntityDef,
    ) -> Result<usize, RouterError> {
        let mut applied = 0;

        while stream.remaining() > 0 {
            let uid = stream.read_uid()?;

            let handler = match self.find_handler(uid) {
                Some(h) => h,
                None => {
                    error!(
                        "Write record for entity {} of '{}' carries unknown property uid {} at offset {}",
                        entity_id,
                        self.name,
                        uid,
                        stream.position()
                    );
                    return Err(RouterError::UnknownProperty {
                        table: self.name.clone(),
                        uid,
                    });
                }
            };

            if let Err(e) = handler.update(entity_id, stream, def) {
                warn!(
                    "Failed to write property '{}' ({}) of entity {} in '{}': {}",
                    handler.name(),
                    uid,
                    entity_id,
                    self.table_name,
                    e
                );
                return Err(RouterError::PropertyWrite {
                    table: self.name.clone(),
                    uid,
                    applied,
                    source: e,
                });
            }
            applied += 1;
        }

        debug!(
            "Wrote {} properties of entity {} to '{}'",
            applied, entity_id, self.table_name
        );
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitydef::{PropertyDef, PropertyType};
    use crate::router::stream::{RecordBuilder, StreamError};
    use crate::router::testing::{MockBackend, RecordingHandler};

    fn avatar_def() -> EntityDef {
        EntityDef::new(
            "Avatar",
            vec![
                PropertyDef::new(1, "level", PropertyType::Int32),
                PropertyDef::new(2, "nickname", PropertyType::String),
                PropertyDef::new(3, "gold", PropertyType::Int32),
            ],
        )
    }

    fn avatar_table(backend: &MockBackend) -> TableSchema {
        let mut table = TableSchema::new("Avatar");
        table.initialize(backend, &avatar_def()).unwrap();
        table
    }

    #[test]
    fn test_table_names() {
        assert_eq!(physical_table_name("Avatar"), "tbl_Avatar");
        assert_eq!(logical_table_name("tbl_Avatar"), Some("Avatar"));
        assert_eq!(logical_table_name("tbl_"), None);
        assert_eq!(logical_table_name("tblAvatar"), None);
        assert_eq!(logical_table_name("kbe_accountinfos"), None);

        let table = TableSchema::new("Avatar");
        assert_eq!(table.name(), "Avatar");
        assert_eq!(table.table_name(), "tbl_Avatar");
    }

    #[test]
    fn test_initialize_skips_transient_properties() {
        let backend = MockBackend::new();
        let def = EntityDef::new(
            "Monster",
            vec![
                PropertyDef::new(1, "hp", PropertyType::Int32),
                PropertyDef::new(2, "target", PropertyType::Int32).transient(),
            ],
        );

        let mut table = TableSchema::new("Monster");
        table.initialize(&backend, &def).unwrap();

        assert_eq!(table.len(), 1);
        assert!(table.find_handler(1).is_some());
        assert!(table.find_handler(2).is_none());
        assert_eq!(table.columns()[0].name, "sm_hp");
    }

    #[test]
    fn test_initialize_rejects_duplicate_uid() {
        let backend = MockBackend::new();
        let def = EntityDef::new(
            "Avatar",
            vec![
                PropertyDef::new(1, "level", PropertyType::Int32),
                PropertyDef::new(1, "exp", PropertyType::Int32),
            ],
        );

        let mut table = TableSchema::new("Avatar");
        let err = table.initialize(&backend, &def).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, RouterError::DuplicateProperty { uid: 1, .. }));
    }

    #[test]
    fn test_initialize_propagates_backend_failure() {
        let backend = MockBackend::new().fail_handler_creation();
        let mut table = TableSchema::new("Avatar");

        let err = table.initialize(&backend, &avatar_def()).unwrap_err();
        assert!(!err.is_fatal());
        assert!(matches!(err, RouterError::Backend { .. }));
    }

    #[test]
    fn test_add_handler_overwrites() {
        let backend = MockBackend::new();
        let mut table = TableSchema::new("Avatar");
        table.add_handler(Box::new(RecordingHandler::new(
            7,
            "old",
            PropertyType::Int32,
            "Avatar",
            backend.log(),
        )));
        table.add_handler(Box::new(RecordingHandler::new(
            7,
            "new",
            PropertyType::Int32,
            "Avatar",
            backend.log(),
        )));

        assert_eq!(table.len(), 1);
        assert_eq!(table.find_handler(7).unwrap().name(), "new");
    }

    #[test]
    fn test_update_routes_any_order() {
        let backend = MockBackend::new();
        let table = avatar_table(&backend);

        let mut b = RecordBuilder::new();
        b.uid(3).put_i32(500);
        b.uid(1).put_i32(12);
        b.uid(2).put_string("arthur");
        let bytes = b.into_bytes();

        let mut stream = RecordStream::new(&bytes);
        let applied = table.update(42, &mut stream, &avatar_def()).unwrap();
        assert_eq!(applied, 3);
        assert!(stream.is_empty());

        let writes = backend.writes();
        assert_eq!(writes.len(), 3);
        assert_eq!(
            writes
                .iter()
                .map(|w| (w.uid, w.value.as_str()))
                .collect::<Vec<_>>(),
            vec![(3, "500"), (1, "12"), (2, "arthur")]
        );
        assert!(writes.iter().all(|w| w.entity_id == 42));
    }

    #[test]
    fn test_update_empty_stream() {
        let backend = MockBackend::new();
        let table = avatar_table(&backend);

        let mut stream = RecordStream::new(&[]);
        assert_eq!(table.update(1, &mut stream, &avatar_def()).unwrap(), 0);
        assert!(backend.writes().is_empty());
    }

    #[test]
    fn test_update_unknown_uid_is_fatal() {
        let backend = MockBackend::new();
        let table = avatar_table(&backend);

        let mut b = RecordBuilder::new();
        b.uid(1).put_i32(12);
        b.uid(99).put_i32(0);
        let bytes = b.into_bytes();

        let mut stream = RecordStream::new(&bytes);
        let err = table.update(1, &mut stream, &avatar_def()).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, RouterError::UnknownProperty { uid: 99, .. }));
        assert_eq!(backend.writes().len(), 1);
    }

    #[test]
    fn test_update_partial_failure_is_not_rolled_back() {
        let backend = MockBackend::new().fail_uid(2);
        let table = avatar_table(&backend);

        let mut b = RecordBuilder::new();
        b.uid(1).put_i32(12);
        b.uid(2).put_string("arthur");
        b.uid(3).put_i32(500);
        let bytes = b.into_bytes();

        let mut stream = RecordStream::new(&bytes);
        let err = table.update(1, &mut stream, &avatar_def()).unwrap_err();
        assert!(!err.is_fatal());
        assert!(matches!(
            err,
            RouterError::PropertyWrite {
                uid: 2,
                applied: 1,
                ..
            }
        ));

        let writes = backend.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].uid, 1);
    }

    #[test]
    fn test_update_truncated_value_is_ordinary_failure() {
        let backend = MockBackend::new();
        let table = avatar_table(&backend);

        let mut b = RecordBuilder::new();
        b.uid(1).put_i32(12);
        b.uid(3).put_u16(1);
        let bytes = b.into_bytes();

        let mut stream = RecordStream::new(&bytes);
        let err = table.update(1, &mut stream, &avatar_def()).unwrap_err();
        assert!(!err.is_fatal());
        assert!(matches!(
            err,
            RouterError::PropertyWrite {
                uid: 3,
                applied: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_update_truncated_uid_is_ordinary_failure() {
        let backend = MockBackend::new();
        let table = avatar_table(&backend);

        let mut b = RecordBuilder::new();
        b.uid(1).put_i32(12).put_u16(0);
        let bytes = b.into_bytes();

        let mut stream = RecordStream::new(&bytes);
        let err = table.update(1, &mut stream, &avatar_def()).unwrap_err();
        assert!(!err.is_fatal());
        assert!(matches!(
            err,
            RouterError::Stream(StreamError::Truncated {
                wanted: 4,
                remaining: 2
            })
        ));
    }

    #[test]
    fn test_sync_to_db() {
        let backend = MockBackend::new();
        let table = avatar_table(&backend);
        table.sync_to_db(&backend).unwrap();
        assert_eq!(backend.synced(), vec!["tbl_Avatar".to_string()]);

        let failing = MockBackend::new().fail_sync("tbl_Avatar");
        let err = table.sync_to_db(&failing).unwrap_err();
        assert!(!err.is_fatal());
    }
}
