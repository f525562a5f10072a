//! SQLite backend
//!
//! Each entity type gets a table `tbl_<entity>` with an `id INTEGER PRIMARY KEY`
//! column and one `sm_<property>` column per persistent property. Property
//! handlers upsert their own column, so a record only touches the columns it
//! carries.
//!
//! Syncing an existing table diffs its columns against the handler set:
//! missing columns are added, stale columns dropped, and a column whose
//! declared type changed is dropped and re-added (its data is lost).

mod handler;

pub use handler::{column_clause, decode_value, encode_text_value, sql_type, SqlitePropertyHandler};

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use rusqlite::types::ValueRef;
use tracing::{debug, info, warn};

use super::core::{DatabaseConn, SchemaManager, SchemaStatus};
use crate::entitydef::PropertyDef;
use crate::router::{DatabaseBackend, DbId, PropertyHandler, SyncReport, TableSchema};

/// Connection shared by the backend and every handler it creates
pub type SharedConn = Arc<Mutex<DatabaseConn>>;

/// Quote an SQL identifier, rejecting names that cannot be quoted safely
pub fn quote_ident(name: &str) -> Result<String> {
    if name.is_empty() || name.contains('"') || name.contains('\0') {
        bail!("Invalid SQL identifier '{}'", name);
    }
    Ok(format!("\"{}\"", name))
}

/// [`DatabaseBackend`] storing entity tables in one SQLite database
pub struct SqliteBackend {
    conn: SharedConn,
}

impl SqliteBackend {
    /// Open (or create) the database file at `path`
    pub fn open(path: &str) -> Result<Self> {
        Self::with_conn(DatabaseConn::open_path(path)?)
    }

    /// Create an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::with_conn(DatabaseConn::open_in_memory()?)
    }

    fn with_conn(db: DatabaseConn) -> Result<Self> {
        let schema = SchemaManager::new(&db.conn);
        match schema.check_status()? {
            SchemaStatus::Current => {
                debug!("Bookkeeping schema is current");
            }
            SchemaStatus::NotInitialized => {
                info!("Initializing bookkeeping schema");
                schema.initialize()?;
            }
            SchemaStatus::Incompatible {
                database_version,
                required_version,
            } => {
                // entity data lives here too, so never reset
                return Err(anyhow!(
                    "Database schema v{} is newer than supported v{}",
                    database_version,
                    required_version
                ));
            }
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(db)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, DatabaseConn>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))
    }

    /// The shared connection (for advanced queries)
    pub fn connection(&self) -> SharedConn {
        self.conn.clone()
    }

    /// Record the outcome of a sync in the meta table
    pub fn record_sync(&self, report: &SyncReport) -> Result<()> {
        let db = self.lock()?;
        let schema = SchemaManager::new(&db.conn);
        schema.set_meta("last_sync", &chrono::Utc::now().to_rfc3339())?;
        schema.set_meta("last_sync_tables", &report.synced.len().to_string())?;
        schema.set_meta("last_sync_dropped", &report.dropped.join(","))?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let db = self.lock()?;
        SchemaManager::new(&db.conn).get_meta(key)
    }

    /// Number of rows in a physical table
    pub fn row_count(&self, table: &str) -> Result<u64> {
        self.lock()?.table_count(table)
    }

    /// Load one entity row as a JSON object keyed by column name
    ///
    /// Blobs are rendered as lowercase hex strings.
    pub fn load_row(&self, table: &str, entity_id: DbId) -> Result<Option<serde_json::Value>> {
        let id = i64::try_from(entity_id)
            .map_err(|_| anyhow!("Entity id {} exceeds the SQLite integer range", entity_id))?;
        let db = self.lock()?;
        let sql = format!("SELECT * FROM {} WHERE id = ?1", quote_ident(table)?);
        let mut stmt = db
            .conn
            .prepare(&sql)
            .map_err(|e| anyhow!("Failed to prepare row query: {}", e))?;
        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let mut rows = stmt
            .query([id])
            .map_err(|e| anyhow!("Failed to query row: {}", e))?;
        let row = match rows.next().map_err(|e| anyhow!("Failed to read row: {}", e))? {
            Some(row) => row,
            None => return Ok(None),
        };

        let mut object = serde_json::Map::new();
        for (i, name) in names.into_iter().enumerate() {
            let value = match row.get_ref(i)? {
                ValueRef::Null => serde_json::Value::Null,
                ValueRef::Integer(v) => serde_json::json!(v),
                ValueRef::Real(v) => serde_json::json!(v),
                ValueRef::Text(v) => serde_json::json!(String::from_utf8_lossy(v)),
                ValueRef::Blob(v) => {
                    serde_json::json!(v.iter().map(|b| format!("{:02x}", b)).collect::<String>())
                }
            };
            object.insert(name, value);
        }
        Ok(Some(serde_json::Value::Object(object)))
    }
}

impl DatabaseBackend for SqliteBackend {
    fn create_handler(&self, table: &str, property: &PropertyDef) -> Result<Box<dyn PropertyHandler>> {
        Ok(Box::new(SqlitePropertyHandler::new(
            table,
            property,
            self.conn.clone(),
        )?))
    }

    fn sync_table(&self, schema: &TableSchema) -> Result<()> {
        let db = self.lock()?;
        let table = quote_ident(schema.table_name())?;
        let columns = schema.columns();

        if !db.table_exists(schema.table_name())? {
            let mut clauses = vec!["id INTEGER PRIMARY KEY".to_string()];
            for column in &columns {
                clauses.push(column_clause(column)?);
            }
            db.execute(&format!("CREATE TABLE {} ({})", table, clauses.join(", ")))?;
            info!(
                "Created table '{}' with {} columns",
                schema.table_name(),
                columns.len()
            );
            return Ok(());
        }

        let existing = db.table_columns(schema.table_name())?;
        let tx = db.transaction()?;
        let mut changes = 0;

        for column in &columns {
            let declared = existing
                .iter()
                .find(|(name, _)| name == &column.name)
                .map(|(_, ty)| ty.as_str());

            match declared {
                Some(ty) if ty.eq_ignore_ascii_case(sql_type(column.kind)) => {}
                Some(ty) => {
                    warn!(
                        "Column '{}.{}' changes type {} -> {}, existing values are dropped",
                        schema.table_name(),
                        column.name,
                        ty,
                        sql_type(column.kind)
                    );
                    tx.execute(
                        &format!(
                            "ALTER TABLE {} DROP COLUMN {}",
                            table,
                            quote_ident(&column.name)?
                        ),
                        [],
                    )
                    .map_err(|e| anyhow!("Failed to drop column '{}': {}", column.name, e))?;
                    tx.execute(
                        &format!("ALTER TABLE {} ADD COLUMN {}", table, column_clause(column)?),
                        [],
                    )
                    .map_err(|e| anyhow!("Failed to add column '{}': {}", column.name, e))?;
                    changes += 1;
                }
                None => {
                    tx.execute(
                        &format!("ALTER TABLE {} ADD COLUMN {}", table, column_clause(column)?),
                        [],
                    )
                    .map_err(|e| anyhow!("Failed to add column '{}': {}", column.name, e))?;
                    changes += 1;
                }
            }
        }

        let wanted: HashSet<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        for (name, _) in &existing {
            if name == "id" || wanted.contains(name.as_str()) {
                continue;
            }
            tx.execute(
                &format!("ALTER TABLE {} DROP COLUMN {}", table, quote_ident(name)?),
                [],
            )
            .map_err(|e| anyhow!("Failed to drop column '{}': {}", name, e))?;
            changes += 1;
        }

        tx.commit()
            .map_err(|e| anyhow!("Failed to commit alteration of '{}': {}", schema.table_name(), e))?;

        if changes > 0 {
            info!(
                "Altered table '{}' ({} column changes)",
                schema.table_name(),
                changes
            );
        }
        Ok(())
    }

    fn list_table_names(&self, prefix: &str) -> Result<Vec<String>> {
        self.lock()?.table_names(prefix)
    }

    fn drop_table(&self, name: &str) -> Result<()> {
        self.lock()?
            .execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(name)?))?;
        Ok(())
    }

    fn begin_write(&self) -> Result<()> {
        self.lock()?.execute("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit_write(&self) -> Result<()> {
        self.lock()?.execute("COMMIT")?;
        Ok(())
    }

    fn rollback_write(&self) -> Result<()> {
        self.lock()?.execute("ROLLBACK")?;
        Ok(())
    }
}
