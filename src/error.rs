//! Error types shared by the schema model, the criteria compiler, the row
//! reconstructor and the persistence helpers.
//!
//! Schema misconfiguration (`UnknownTable`, `UnknownRelationship`,
//! `SchemaIntegrity`) is fatal at startup. `MissingPrimaryKey` and
//! `InconsistentKeyState` signal caller misuse when deciding between insert
//! and update. Executor failures are wrapped unchanged in `Executor`.

use std::fmt;

use crate::executor::ExecutorError;

/// Error type returned by every fallible operation of the crate
#[derive(Debug)]
pub enum OrmError {
    /// A table name was not registered in the schema
    UnknownTable(String),
    /// A relationship name was not declared on the given table
    UnknownRelationship {
        /// Table that was searched
        table: String,
        /// Relationship name that was not found
        relationship: String,
    },
    /// The schema failed its one-time integrity check
    SchemaIntegrity(String),
    /// At least one not generated primary key column is unset
    MissingPrimaryKey {
        /// Table of the object
        table: String,
        /// The not generated primary key columns of the table
        columns: Vec<String>,
    },
    /// Generated primary key columns are partly null and partly set
    InconsistentKeyState {
        /// Table of the object
        table: String,
    },
    /// Criteria could not be parsed from their JSON form
    InvalidCriteria(String),
    /// A nested object does not match the shape its table declares
    InvalidEntity(String),
    /// An entity graph contains a cycle and cannot be rendered as a tree
    CyclicGraph {
        /// Table of the entity where the cycle was detected
        table: String,
    },
    /// The injected query executor failed
    Executor(ExecutorError),
    /// Configuration could not be loaded
    Config(String),
}

impl fmt::Display for OrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrmError::UnknownTable(table) => write!(f, "Table not contained in schema: {table}"),
            OrmError::UnknownRelationship {
                table,
                relationship,
            } => write!(
                f,
                "Relationship '{relationship}' not contained in table '{table}'"
            ),
            OrmError::SchemaIntegrity(msg) => write!(f, "Schema integrity error: {msg}"),
            OrmError::MissingPrimaryKey { table, columns } => write!(
                f,
                "At least one not generated primary key field ({}) of table '{table}' is not set",
                columns.join(", ")
            ),
            OrmError::InconsistentKeyState { table } => write!(
                f,
                "Table '{table}' has generated primary key columns which are null and others which are not null. Cannot determine if the object is to be inserted or to be updated"
            ),
            OrmError::InvalidCriteria(msg) => write!(f, "Invalid criteria: {msg}"),
            OrmError::InvalidEntity(msg) => write!(f, "Invalid entity: {msg}"),
            OrmError::CyclicGraph { table } => write!(
                f,
                "Entity of table '{table}' is part of a cycle and cannot be rendered as a tree"
            ),
            OrmError::Executor(e) => write!(f, "Executor error: {e}"),
            OrmError::Config(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for OrmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OrmError::Executor(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ExecutorError> for OrmError {
    fn from(err: ExecutorError) -> Self {
        OrmError::Executor(err)
    }
}

impl From<config::ConfigError> for OrmError {
    fn from(err: config::ConfigError) -> Self {
        OrmError::Config(err.to_string())
    }
}
