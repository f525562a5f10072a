use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::database::SqliteBackend;
use crate::router::TABLE_PREFIX;

pub struct EntityTablesConfig {
    /// Path to the directory holding the entity database
    pub data_dir: String,

    /// Path to the entity definitions JSON document
    pub definitions_path: Option<String>,

    /// Wrap every entity write in a database transaction (default: false)
    pub transactional_writes: bool,
}

const EMPTY_CONFIG: &str = r#"### entity-tables configuration file

### directory holding the entity database
# data_dir = "~/.entity-tables"

### entity definitions (JSON)
# definitions_path = "~/.entity-tables/entities.json"

### roll back every property of a record when one of them fails to persist
# transactional_writes = false
"#;

impl Default for EntityTablesConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            data_dir: format!("{}/.entity-tables", home_dir),
            definitions_path: None,
            transactional_writes: false,
        }
    }
}

impl EntityTablesConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<EntityTablesConfig> {
        let mut builder = Config::builder();

        // By default use $HOME/.entity-tables/entity-tables.toml as the configuration file path
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();

        let app_dir = format!("{}/.entity-tables", home_dir.as_str());

        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(app_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create entity-tables directory: {}", e))?;
                let p = format!("{}/entity-tables.toml", app_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Add in settings from the environment (with a prefix of ENTITY_TABLES)
        // E.g., `ENTITY_TABLES_TRANSACTIONAL_WRITES=true entity-tables sync`
        builder = builder.add_source(config::Environment::with_prefix("ENTITY_TABLES"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_settings(&config, &app_dir)
    }

    fn from_settings(config: &HashMap<String, String>, app_dir: &str) -> Result<Self> {
        let data_dir = match config.get("data_dir") {
            Some(p) => expand_home(p),
            None => {
                std::fs::create_dir_all(app_dir)
                    .map_err(|e| anyhow!("Unable to create data directory: {}", e))?;
                app_dir.to_string()
            }
        };

        let definitions_path = config.get("definitions_path").map(|p| expand_home(p));

        let transactional_writes = match config.get("transactional_writes") {
            Some(v) => v
                .parse()
                .map_err(|_| anyhow!("Invalid transactional_writes value '{}'", v))?,
            None => false,
        };

        Ok(EntityTablesConfig {
            data_dir,
            definitions_path,
            transactional_writes,
        })
    }

    /// Get the path to the SQLite database file
    pub fn sqlite_path(&self) -> String {
        let data_dir = self.data_dir.trim_end_matches('/');
        format!("{}/entity-tables.sqlite3", data_dir)
    }

    /// Definitions path, falling back to `{data_dir}/entities.json`
    pub fn definitions_path(&self) -> String {
        match &self.definitions_path {
            Some(p) => p.clone(),
            None => format!("{}/entities.json", self.data_dir.trim_end_matches('/')),
        }
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        [
            format!("Data Directory:       {}", self.data_dir),
            format!("SQLite Path:          {}", self.sqlite_path()),
            format!("Definitions Path:     {}", self.definitions_path()),
            format!("Transactional Writes: {}", self.transactional_writes),
        ]
        .join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.entity-tables/entity-tables.toml", home_dir)
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => format!("{}/{}", home.to_string_lossy(), rest),
        _ => path.to_string(),
    }
}

// =============================================================================
// Database info (used by the status command)
// =============================================================================

/// One physical entity table
#[derive(Debug, Serialize, Clone)]
pub struct EntityTableInfo {
    pub table: String,
    pub rows: u64,
}

/// Information about the SQLite database
#[derive(Debug, Serialize, Clone)]
pub struct DatabaseInfo {
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<String>,
    pub tables: Vec<EntityTableInfo>,
}

/// Get SQLite database information
pub fn get_database_info(config: &EntityTablesConfig) -> DatabaseInfo {
    let path = config.sqlite_path();
    let exists = Path::new(&path).exists();
    let size_bytes = if exists {
        std::fs::metadata(&path).ok().map(|m| m.len())
    } else {
        None
    };

    let (last_sync, tables) = if exists {
        match SqliteBackend::open(&path) {
            Ok(backend) => table_info(&backend),
            Err(_) => (None, vec![]),
        }
    } else {
        (None, vec![])
    };

    DatabaseInfo {
        path,
        exists,
        size_bytes,
        last_sync,
        tables,
    }
}

fn table_info(backend: &SqliteBackend) -> (Option<String>, Vec<EntityTableInfo>) {
    use crate::router::DatabaseBackend;

    let last_sync = backend.get_meta("last_sync").ok().flatten();
    let prefix = format!("{}_", TABLE_PREFIX);
    let tables = backend
        .list_table_names(&prefix)
        .unwrap_or_default()
        .into_iter()
        .map(|table| EntityTableInfo {
            rows: backend.row_count(&table).unwrap_or(0),
            table,
        })
        .collect();
    (last_sync, tables)
}

/// Format a byte size in human-readable form
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = EntityTablesConfig::default();
        assert!(config.data_dir.ends_with(".entity-tables"));
        assert!(config.definitions_path.is_none());
        assert!(!config.transactional_writes);
    }

    #[test]
    fn test_paths() {
        let config = EntityTablesConfig {
            data_dir: "/test/dir/".to_string(),
            definitions_path: None,
            transactional_writes: false,
        };

        assert_eq!(config.sqlite_path(), "/test/dir/entity-tables.sqlite3");
        assert_eq!(config.definitions_path(), "/test/dir/entities.json");
    }

    #[test]
    fn test_from_settings() {
        let config = EntityTablesConfig::from_settings(
            &settings(&[
                ("data_dir", "/srv/game"),
                ("definitions_path", "/srv/game/defs.json"),
                ("transactional_writes", "true"),
            ]),
            "/unused",
        )
        .unwrap();

        assert_eq!(config.data_dir, "/srv/game");
        assert_eq!(config.definitions_path(), "/srv/game/defs.json");
        assert!(config.transactional_writes);
    }

    #[test]
    fn test_from_settings_invalid_bool() {
        let result = EntityTablesConfig::from_settings(
            &settings(&[("data_dir", "/srv/game"), ("transactional_writes", "maybe")]),
            "/unused",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entity-tables.toml");
        std::fs::write(
            &path,
            "data_dir = \"/srv/game\"\ntransactional_writes = true\n",
        )
        .unwrap();

        let config = EntityTablesConfig::new(&Some(path.to_string_lossy().to_string())).unwrap();
        assert_eq!(config.data_dir, "/srv/game");
        assert!(config.transactional_writes);
    }

    #[test]
    fn test_database_info_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = EntityTablesConfig {
            data_dir: dir.path().to_string_lossy().to_string(),
            definitions_path: None,
            transactional_writes: false,
        };

        let info = get_database_info(&config);
        assert!(!info.exists);
        assert!(info.tables.is_empty());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
    }
}
