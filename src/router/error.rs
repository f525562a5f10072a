//! Router error types
//!
//! Errors fall in two classes:
//!
//! - **fatal**: the in-memory schema and the data it is asked to process have
//!   diverged (unknown property uid, missing table, duplicate registration,
//!   writes before the registry is ready). Callers must not retry or carry on
//!   silently; [`RouterError::is_fatal`] returns `true`.
//! - **recoverable**: backend failures, decode failures and per-property write
//!   failures. These stop the current loop and are reported upward.

use super::stream::StreamError;
use super::{PropertyUid, RegistryState};

/// Errors raised by [`TableSchema`](super::TableSchema) and
/// [`SchemaRegistry`](super::SchemaRegistry)
#[derive(Debug)]
pub enum RouterError {
    /// A write record carries a property uid the table does not know
    UnknownProperty { table: String, uid: PropertyUid },

    /// No schema is registered under this entity name
    TableNotFound(String),

    /// A schema is already registered under this entity name
    DuplicateTable(String),

    /// Two property definitions of one entity share a uid
    DuplicateProperty { table: String, uid: PropertyUid },

    /// The registry has not reached the state the operation requires
    NotReady {
        expected: RegistryState,
        actual: RegistryState,
    },

    /// The backend failed while doing `context`
    Backend {
        context: String,
        source: anyhow::Error,
    },

    /// A property handler failed mid-record.
    ///
    /// `applied` properties of the same record were already persisted and are
    /// not rolled back unless transactional writes are enabled.
    PropertyWrite {
        table: String,
        uid: PropertyUid,
        applied: usize,
        source: anyhow::Error,
    },

    /// The record stream ended in the middle of a property uid
    Stream(StreamError),
}

impl RouterError {
    /// Whether this error signals schema/data divergence
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RouterError::UnknownProperty { .. }
                | RouterError::TableNotFound(_)
                | RouterError::DuplicateTable(_)
                | RouterError::DuplicateProperty { .. }
                | RouterError::NotReady { .. }
        )
    }

    pub(crate) fn backend(context: impl Into<String>, source: anyhow::Error) -> Self {
        RouterError::Backend {
            context: context.into(),
            source,
        }
    }
}

impl std::fmt::Display for RouterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouterError::UnknownProperty { table, uid } => {
                write!(f, "Property uid {} is not registered in table '{}'", uid, table)
            }
            RouterError::TableNotFound(name) => write!(f, "Table '{}' not found", name),
            RouterError::DuplicateTable(name) => write!(f, "Table '{}' already exists", name),
            RouterError::DuplicateProperty { table, uid } => {
                write!(f, "Property uid {} declared twice in table '{}'", uid, table)
            }
            RouterError::NotReady { expected, actual } => write!(
                f,
                "Schema registry is {}, operation requires {}",
                actual, expected
            ),
            RouterError::Backend { context, source } => write!(f, "{}: {}", context, source),
            RouterError::PropertyWrite {
                table,
                uid,
                applied,
                source,
            } => write!(
                f,
                "Failed to write property {} of table '{}' after {} applied: {}",
                uid, table, applied, source
            ),
            RouterError::Stream(e) => write!(f, "Malformed record: {}", e),
        }
    }
}

impl std::error::Error for RouterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RouterError::Backend { source, .. } | RouterError::PropertyWrite { source, .. } => {
                Some(source.as_ref())
            }
            RouterError::Stream(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StreamError> for RouterError {
    fn from(e: StreamError) -> Self {
        RouterError::Stream(e)
    }
}
