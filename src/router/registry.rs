//! Schema registry
//!
//! The [`SchemaRegistry`] owns one [`TableSchema`] per entity type. It is the
//! single entry point for building schemas from definitions, reconciling them
//! with the physical store, and persisting entity records.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --load()--> Loaded --sync_all()--> Ready
//!                             |  ^                   |
//!                             |  +---add_table()-----+
//!                             +------attach()------> Ready
//! ```
//!
//! A failed `load` leaves the registry uninitialized and empty.
//!
//! Schema mutation takes `&mut self` and belongs to the bootstrap phase.
//! Writes take `&self`, so a ready registry can be shared across worker
//! threads behind an `Arc`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use super::backend::DatabaseBackend;
use super::error::RouterError;
use super::stream::RecordStream;
use super::table::{logical_table_name, TableSchema, TABLE_PREFIX};
use super::DbId;
use crate::entitydef::{EntityDef, EntityDefs};

/// Lifecycle state of a [`SchemaRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// No schemas registered
    Uninitialized,
    /// Schemas registered, physical tables not yet reconciled
    Loaded,
    /// Schemas registered and physically present
    Ready,
}

impl std::fmt::Display for RegistryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryState::Uninitialized => write!(f, "uninitialized"),
            RegistryState::Loaded => write!(f, "loaded"),
            RegistryState::Ready => write!(f, "ready"),
        }
    }
}

/// Outcome of [`SchemaRegistry::sync_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Physical tables created or altered, in registry order
    pub synced: Vec<String>,
    /// Orphan physical tables dropped
    pub dropped: Vec<String>,
}

/// Authority over all entity tables
pub struct SchemaRegistry {
    backend: Arc<dyn DatabaseBackend>,
    tables: BTreeMap<String, TableSchema>,
    state: RegistryState,
    transactional_writes: bool,
    /// Held for the whole of every `write_entity` call, whatever the target
    /// table. Guards write ordering, not the maps.
    write_serial: Mutex<()>,
}

impl SchemaRegistry {
    pub fn new(backend: Arc<dyn DatabaseBackend>) -> Self {
        Self {
            backend,
            tables: BTreeMap::new(),
            state: RegistryState::Uninitialized,
            transactional_writes: false,
            write_serial: Mutex::new(()),
        }
    }

    /// Wrap every `write_entity` call in a backend transaction
    ///
    /// Off by default: a failing property leaves the properties written
    /// before it in place.
    pub fn with_transactional_writes(mut self, enabled: bool) -> Self {
        self.transactional_writes = enabled;
        self
    }

    pub fn state(&self) -> RegistryState {
        self.state
    }

    pub fn backend(&self) -> &Arc<dyn DatabaseBackend> {
        &self.backend
    }

    /// Build and register one schema per entity definition
    ///
    /// Stops at the first failure and discards every schema of the call; the
    /// registry stays uninitialized so a half-loaded set is never synced.
    pub fn load(&mut self, defs: &EntityDefs) -> Result<usize, RouterError> {
        if self.state != RegistryState::Uninitialized {
            return Err(RouterError::NotReady {
                expected: RegistryState::Uninitialized,
                actual: self.state,
            });
        }

        info!("Loading {} entity definitions", defs.len());
        if let Err(e) = self.load_all(defs) {
            warn!("Discarding {} schemas of the failed load", self.tables.len());
            self.tables.clear();
            return Err(e);
        }

        self.state = RegistryState::Loaded;
        info!("Loaded {} entity tables", self.tables.len());
        Ok(self.tables.len())
    }

    fn load_all(&mut self, defs: &EntityDefs) -> Result<(), RouterError> {
        for def in defs {
            let mut schema = self.backend.create_table_schema(&def.name);
            schema.initialize(self.backend.as_ref(), def)?;
            self.register(schema)?;
        }
        Ok(())
    }

    /// Reconcile registered schemas with the physical store
    ///
    /// First every registered table is created or altered, in name order.
    /// Then every physical `tbl_*` table without a registered schema is
    /// dropped. Both loops stop at the first failure.
    pub fn sync_all(&mut self) -> Result<SyncReport, RouterError> {
        if self.state == RegistryState::Uninitialized {
            return Err(RouterError::NotReady {
                expected: RegistryState::Loaded,
                actual: self.state,
            });
        }

        let mut report = SyncReport::default();

        for schema in self.tables.values() {
            schema.sync_to_db(self.backend.as_ref())?;
            report.synced.push(schema.table_name().to_string());
        }

        let prefix = format!("{}_", TABLE_PREFIX);
        let physical = self
            .backend
            .list_table_names(&prefix)
            .map_err(|e| RouterError::backend("Failed to list tables", e))?;

        for table_name in physical {
            let Some(name) = logical_table_name(&table_name) else {
                continue;
            };
            // SQLite table names ignore ASCII case
            if self.tables.keys().any(|k| k.eq_ignore_ascii_case(name)) {
                continue;
            }

            info!("Dropping orphan table '{}'", table_name);
            self.backend.drop_table(&table_name).map_err(|e| {
                RouterError::backend(format!("Failed to drop table '{}'", table_name), e)
            })?;
            report.dropped.push(table_name);
        }

        self.state = RegistryState::Ready;
        info!(
            "Synced {} tables, dropped {} orphans",
            report.synced.len(),
            report.dropped.len()
        );
        Ok(report)
    }

    /// Mark the registry ready without touching the store
    ///
    /// Checks that every registered table is physically present and neither
    /// creates, alters nor drops anything. Use it when the tables were
    /// reconciled by an earlier [`sync_all`](Self::sync_all).
    pub fn attach(&mut self) -> Result<(), RouterError> {
        if self.state == RegistryState::Uninitialized {
            return Err(RouterError::NotReady {
                expected: RegistryState::Loaded,
                actual: self.state,
            });
        }

        let prefix = format!("{}_", TABLE_PREFIX);
        let physical = self
            .backend
            .list_table_names(&prefix)
            .map_err(|e| RouterError::backend("Failed to list tables", e))?;

        for schema in self.tables.values() {
            if !physical
                .iter()
                .any(|t| t.eq_ignore_ascii_case(schema.table_name()))
            {
                error!(
                    "Table '{}' is not in the store, run a sync first",
                    schema.table_name()
                );
                return Err(RouterError::TableNotFound(schema.name().to_string()));
            }
        }

        self.state = RegistryState::Ready;
        debug!("Attached to {} existing tables", self.tables.len());
        Ok(())
    }

    /// Register a schema outside of [`load`](Self::load)
    ///
    /// A ready registry falls back to loaded: the new table exists only in
    /// memory until the next [`sync_all`](Self::sync_all).
    pub fn add_table(&mut self, schema: TableSchema) -> Result<(), RouterError> {
        self.register(schema)?;
        self.state = RegistryState::Loaded;
        Ok(())
    }

    fn register(&mut self, schema: TableSchema) -> Result<(), RouterError> {
        if self
            .tables
            .keys()
            .any(|k| k.eq_ignore_ascii_case(schema.name()))
        {
            error!("Table '{}' already registered", schema.name());
            return Err(RouterError::DuplicateTable(schema.name().to_string()));
        }
        self.tables.insert(schema.name().to_string(), schema);
        Ok(())
    }

    pub fn find_table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    /// Registered schemas in name order
    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Persist one write record of an entity of type `def`
    ///
    /// Only one call runs at a time across the whole registry. Returns the
    /// number of properties written; see [`TableSchema::update`] for the
    /// failure semantics.
    pub fn write_entity(
        &self,
        entity_id: DbId,
        stream: &mut RecordStream<'_>,
        def: &EntityDef,
    ) -> Result<usize, RouterError> {
        if self.state != RegistryState::Ready {
            error!(
                "Write to '{}' rejected: schema registry is {}",
                def.name, self.state
            );
            return Err(RouterError::NotReady {
                expected: RegistryState::Ready,
                actual: self.state,
            });
        }

        // The guard protects `()`, so a panic in another writer leaves
        // nothing inconsistent behind.
        let _guard = self
            .write_serial
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let table = self.find_table(&def.name).ok_or_else(|| {
            error!("No table registered for entity type '{}'", def.name);
            RouterError::TableNotFound(def.name.clone())
        })?;

        if !self.transactional_writes {
            return table.update(entity_id, stream, def);
        }

        self.backend
            .begin_write()
            .map_err(|e| RouterError::backend("Failed to begin write transaction", e))?;

        match table.update(entity_id, stream, def) {
            Ok(applied) => {
                self.backend
                    .commit_write()
                    .map_err(|e| RouterError::backend("Failed to commit write transaction", e))?;
                Ok(applied)
            }
            Err(e) => {
                if let Err(rollback) = self.backend.rollback_write() {
                    warn!("Failed to roll back write transaction: {}", rollback);
                }
                Err(e)
            }
        }
    }

    /// Release every schema and handler
    pub fn shutdown(&mut self) {
        info!("Releasing {} entity tables", self.tables.len());
        self.tables.clear();
        self.state = RegistryState::Uninitialized;
    }
}
