//! In-memory backend and recording handlers for router tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};

use super::backend::DatabaseBackend;
use super::handler::{ColumnDef, PropertyHandler};
use super::stream::RecordStream;
use super::table::TableSchema;
use super::{DbId, PropertyUid};
use crate::entitydef::{EntityDef, PropertyDef, PropertyType};

/// One persisted property as seen by a [`RecordingHandler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Write {
    pub table: String,
    pub entity_id: DbId,
    pub uid: PropertyUid,
    pub value: String,
}

pub type WriteLog = Arc<Mutex<Vec<Write>>>;

pub struct RecordingHandler {
    uid: PropertyUid,
    name: String,
    kind: PropertyType,
    table: String,
    log: WriteLog,
    fail: bool,
    delay: Option<Duration>,
}

impl RecordingHandler {
    pub fn new(uid: PropertyUid, name: &str, kind: PropertyType, table: &str, log: WriteLog) -> Self {
        Self {
            uid,
            name: name.to_string(),
            kind,
            table: table.to_string(),
            log,
            fail: false,
            delay: None,
        }
    }
}

impl PropertyHandler for RecordingHandler {
    fn uid(&self) -> PropertyUid {
        self.uid
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn column(&self) -> ColumnDef {
        ColumnDef::for_property(&self.name, self.kind)
    }

    fn update(&self, entity_id: DbId, stream: &mut RecordStream<'_>, _def: &EntityDef) -> Result<()> {
        let value = match self.kind {
            PropertyType::Int32 => stream.read_i32()?.to_string(),
            PropertyType::String => stream.read_string()?.to_string(),
            other => bail!("unsupported test property type {}", other),
        };
        if self.fail {
            bail!("injected failure for uid {}", self.uid);
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.log.lock().unwrap().push(Write {
            table: self.table.clone(),
            entity_id,
            uid: self.uid,
            value,
        });
        Ok(())
    }
}

/// Backend keeping its "physical" tables in memory and recording every call
#[derive(Default)]
pub struct MockBackend {
    log: WriteLog,
    physical: Mutex<Vec<String>>,
    synced: Mutex<Vec<String>>,
    dropped: Mutex<Vec<String>>,
    transactions: Mutex<Vec<&'static str>>,
    fail_uids: Vec<PropertyUid>,
    fail_sync: Option<String>,
    fail_drop: Option<String>,
    fail_handler_creation: bool,
    delay: Option<Duration>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend these tables already exist in the store
    pub fn with_physical(self, tables: &[&str]) -> Self {
        *self.physical.lock().unwrap() = tables.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn fail_uid(mut self, uid: PropertyUid) -> Self {
        self.fail_uids.push(uid);
        self
    }

    pub fn fail_sync(mut self, table: &str) -> Self {
        self.fail_sync = Some(table.to_string());
        self
    }

    pub fn fail_drop(mut self, table: &str) -> Self {
        self.fail_drop = Some(table.to_string());
        self
    }

    pub fn fail_handler_creation(mut self) -> Self {
        self.fail_handler_creation = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn log(&self) -> WriteLog {
        self.log.clone()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.log.lock().unwrap().clone()
    }

    pub fn physical(&self) -> Vec<String> {
        self.physical.lock().unwrap().clone()
    }

    pub fn synced(&self) -> Vec<String> {
        self.synced.lock().unwrap().clone()
    }

    pub fn dropped(&self) -> Vec<String> {
        self.dropped.lock().unwrap().clone()
    }

    pub fn transactions(&self) -> Vec<&'static str> {
        self.transactions.lock().unwrap().clone()
    }
}

impl DatabaseBackend for MockBackend {
    fn create_handler(&self, table: &str, property: &PropertyDef) -> Result<Box<dyn PropertyHandler>> {
        if self.fail_handler_creation {
            bail!("handler creation disabled");
        }
        let mut handler = RecordingHandler::new(
            property.uid,
            &property.name,
            property.kind,
            table,
            self.log.clone(),
        );
        handler.fail = self.fail_uids.contains(&property.uid);
        handler.delay = self.delay;
        Ok(Box::new(handler))
    }

    fn sync_table(&self, schema: &TableSchema) -> Result<()> {
        if self.fail_sync.as_deref() == Some(schema.table_name()) {
            return Err(anyhow!("cannot alter {}", schema.table_name()));
        }
        self.synced.lock().unwrap().push(schema.table_name().to_string());
        let mut physical = self.physical.lock().unwrap();
        if !physical
            .iter()
            .any(|t| t.eq_ignore_ascii_case(schema.table_name()))
        {
            physical.push(schema.table_name().to_string());
        }
        Ok(())
    }

    fn list_table_names(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .physical
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn drop_table(&self, name: &str) -> Result<()> {
        if self.fail_drop.as_deref() == Some(name) {
            return Err(anyhow!("cannot drop {}", name));
        }
        self.dropped.lock().unwrap().push(name.to_string());
        self.physical.lock().unwrap().retain(|t| t != name);
        Ok(())
    }

    fn begin_write(&self) -> Result<()> {
        self.transactions.lock().unwrap().push("begin");
        Ok(())
    }

    fn commit_write(&self) -> Result<()> {
        self.transactions.lock().unwrap().push("commit");
        Ok(())
    }

    fn rollback_write(&self) -> Result<()> {
        self.transactions.lock().unwrap().push("rollback");
        Ok(())
    }
}
