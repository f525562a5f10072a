//! Database connection management
//!
//! This module provides the SQLite connection wrapper used by the SQLite backend.

use anyhow::{anyhow, Result};
use rusqlite::Connection;

/// Core database connection wrapper
///
/// `DatabaseConn` provides a thin wrapper around SQLite connections,
/// handling both file-based and in-memory databases with consistent
/// configuration and error handling.
pub struct DatabaseConn {
    pub conn: Connection,
}

impl DatabaseConn {
    /// Open a database at the specified path
    ///
    /// If the path is `None`, an in-memory database is created.
    pub fn open(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)
                .map_err(|e| anyhow!("Failed to open database at '{}': {}", p, e))?,
            None => Connection::open_in_memory()
                .map_err(|e| anyhow!("Failed to create in-memory database: {}", e))?,
        };

        let db = DatabaseConn { conn };
        db.configure()?;
        Ok(db)
    }

    /// Open a database at the specified path (convenience method)
    pub fn open_path(path: &str) -> Result<Self> {
        Self::open(Some(path))
    }

    /// Create an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::open(None)
    }

    fn configure(&self) -> Result<()> {
        // WAL lets readers proceed while a writer holds the database
        let _: String = self
            .conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to set journal mode: {}", e))?;

        self.conn
            .execute("PRAGMA synchronous=NORMAL", [])
            .map_err(|e| anyhow!("Failed to set synchronous mode: {}", e))?;

        self.conn
            .execute("PRAGMA temp_store=MEMORY", [])
            .map_err(|e| anyhow!("Failed to set temp store: {}", e))?;

        Ok(())
    }

    /// Execute a SQL statement
    pub fn execute(&self, sql: &str) -> Result<usize> {
        self.conn
            .execute(sql, [])
            .map_err(|e| anyhow!("Failed to execute SQL '{}': {}", sql, e))
    }

    /// Begin an unchecked transaction
    ///
    /// Used to apply a batch of DDL statements atomically.
    pub fn transaction(&self) -> Result<rusqlite::Transaction<'_>> {
        self.conn
            .unchecked_transaction()
            .map_err(|e| anyhow!("Failed to begin transaction: {}", e))
    }

    /// Check if a table exists in the database
    ///
    /// Table names match without regard to ASCII case, as SQLite resolves them.
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let count: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = ?1 COLLATE NOCASE",
                [table_name],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to check table existence: {}", e))?;
        Ok(count > 0)
    }

    /// Names of all tables starting with `prefix`, sorted
    pub fn table_names(&self, prefix: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master WHERE type='table' AND substr(name, 1, ?1) = ?2 ORDER BY name",
            )
            .map_err(|e| anyhow!("Failed to prepare table listing: {}", e))?;

        let names = stmt
            .query_map(
                rusqlite::params![prefix.chars().count() as i64, prefix],
                |row| row.get::<_, String>(0),
            )
            .map_err(|e| anyhow!("Failed to list tables: {}", e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow!("Failed to read table name: {}", e))?;
        Ok(names)
    }

    /// Columns of a table as `(name, declared type)` pairs, in table order
    pub fn table_columns(&self, table_name: &str) -> Result<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")
            .map_err(|e| anyhow!("Failed to prepare column listing: {}", e))?;

        let columns = stmt
            .query_map([table_name], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| anyhow!("Failed to list columns of '{}': {}", table_name, e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow!("Failed to read column info: {}", e))?;
        Ok(columns)
    }

    /// Get the row count for a table
    pub fn table_count(&self, table_name: &str) -> Result<u64> {
        let query = format!("SELECT COUNT(*) FROM \"{}\"", table_name);
        let count: u64 = self
            .conn
            .query_row(&query, [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to get table count: {}", e))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = DatabaseConn::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_table_exists() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE tbl_Avatar (id INTEGER PRIMARY KEY)")
            .unwrap();

        assert!(db.table_exists("tbl_Avatar").unwrap());
        assert!(db.table_exists("tbl_avatar").unwrap());
        assert!(!db.table_exists("tbl_Monster").unwrap());
    }

    #[test]
    fn test_table_names_by_prefix() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE tbl_Monster (id INTEGER PRIMARY KEY)")
            .unwrap();
        db.execute("CREATE TABLE tbl_Avatar (id INTEGER PRIMARY KEY)")
            .unwrap();
        db.execute("CREATE TABLE tblx (id INTEGER PRIMARY KEY)")
            .unwrap();
        db.execute("CREATE TABLE accounts (id INTEGER PRIMARY KEY)")
            .unwrap();

        assert_eq!(
            db.table_names("tbl_").unwrap(),
            vec!["tbl_Avatar".to_string(), "tbl_Monster".to_string()]
        );
        assert_eq!(db.table_names("").unwrap().len(), 4);
    }

    #[test]
    fn test_table_columns() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE tbl_Avatar (id INTEGER PRIMARY KEY, sm_name TEXT, sm_hp REAL)")
            .unwrap();

        let columns = db.table_columns("tbl_Avatar").unwrap();
        assert_eq!(
            columns,
            vec![
                ("id".to_string(), "INTEGER".to_string()),
                ("sm_name".to_string(), "TEXT".to_string()),
                ("sm_hp".to_string(), "REAL".to_string()),
            ]
        );
        assert!(db.table_columns("missing").unwrap().is_empty());
    }

    #[test]
    fn test_table_count() {
        let db = DatabaseConn::open_in_memory().unwrap();
        db.execute("CREATE TABLE test_table (id INTEGER PRIMARY KEY)")
            .unwrap();
        db.execute("INSERT INTO test_table (id) VALUES (1), (2), (3)")
            .unwrap();

        assert_eq!(db.table_count("test_table").unwrap(), 3);
    }
}
