//! Entity definitions
//!
//! The definition system describes every entity type the server knows about:
//! its name and the ordered list of its properties. Definitions are read once
//! at bootstrap and handed to [`SchemaRegistry::load`](crate::SchemaRegistry::load).
//!
//! Definitions are stored as a JSON document:
//!
//! ```json
//! {
//!   "entities": [
//!     {
//!       "name": "Avatar",
//!       "properties": [
//!         { "uid": 1, "name": "level", "type": "uint16" },
//!         { "uid": 2, "name": "nickname", "type": "string" },
//!         { "uid": 3, "name": "position", "type": "blob", "persistent": false }
//!       ]
//!     }
//!   ]
//! }
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::router::PropertyUid;

/// Wire/storage type of a property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float,
    Double,
    Bool,
    String,
    Blob,
}

impl PropertyType {
    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::Int8 => "int8",
            PropertyType::Uint8 => "uint8",
            PropertyType::Int16 => "int16",
            PropertyType::Uint16 => "uint16",
            PropertyType::Int32 => "int32",
            PropertyType::Uint32 => "uint32",
            PropertyType::Int64 => "int64",
            PropertyType::Uint64 => "uint64",
            PropertyType::Float => "float",
            PropertyType::Double => "double",
            PropertyType::Bool => "bool",
            PropertyType::String => "string",
            PropertyType::Blob => "blob",
        }
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn default_persistent() -> bool {
    true
}

/// A single property of an entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub uid: PropertyUid,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PropertyType,
    /// Only persistent properties are mapped to columns
    #[serde(default = "default_persistent")]
    pub persistent: bool,
}

impl PropertyDef {
    pub fn new(uid: PropertyUid, name: &str, kind: PropertyType) -> Self {
        Self {
            uid,
            name: name.to_string(),
            kind,
            persistent: true,
        }
    }

    /// Mark the property as runtime-only
    pub fn transient(mut self) -> Self {
        self.persistent = false;
        self
    }
}

/// An entity type: a name and its ordered properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
}

impl EntityDef {
    pub fn new(name: &str, properties: Vec<PropertyDef>) -> Self {
        Self {
            name: name.to_string(),
            properties,
        }
    }

    pub fn find_property(&self, uid: PropertyUid) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.uid == uid)
    }

    /// Properties that get a column
    pub fn persistent_properties(&self) -> impl Iterator<Item = &PropertyDef> {
        self.properties.iter().filter(|p| p.persistent)
    }
}

/// The ordered collection of all entity definitions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDefs {
    #[serde(default)]
    pub entities: Vec<EntityDef>,
}

impl EntityDefs {
    pub fn new(entities: Vec<EntityDef>) -> Self {
        Self { entities }
    }

    /// Parse definitions from a JSON document
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| anyhow!("Failed to parse entity definitions: {}", e))
    }

    /// Load definitions from a JSON file
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow!(
                "Failed to read entity definitions '{}': {}",
                path.display(),
                e
            )
        })?;
        Self::from_json_str(&content)
    }

    pub fn find(&self, name: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EntityDef> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl<'a> IntoIterator for &'a EntityDefs {
    type Item = &'a EntityDef;
    type IntoIter = std::slice::Iter<'a, EntityDef>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}
