//! Error types for FlatDB
//!
//! This module defines all error types used throughout the query engine.

use thiserror::Error;

use crate::catalog::TableId;

/// The main error type for FlatDB
#[derive(Error, Debug)]
pub enum Error {
    // ========== Table Errors ==========
    #[error("Table error: storage '{0}' already exists")]
    AlreadyExists(String),

    #[error("Table error: storage '{0}' not found")]
    NotFound(String),

    #[error("Table error: storage '{0}' has no header row")]
    NoSchema(String),

    #[error("Table error: column '{column}' appears twice in the schema of '{table}'")]
    DuplicateColumn { column: String, table: String },

    #[error("Table error: record columns {found:?} do not match schema {expected:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Table error: column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    // ========== Evaluation Errors ==========
    #[error("Type error: cannot convert '{value}' to {to}")]
    CoercionFailure { value: String, to: &'static str },

    #[error("Evaluation error: table {0} is not part of the row")]
    TableNotInRow(TableId),

    #[error("Evaluation error: invalid pattern - {0}")]
    InvalidPattern(String),

    // ========== Query Errors ==========
    #[error("Query error: output alias '{0}' is used more than once")]
    DuplicateAlias(String),

    #[error("Query error: {0}")]
    InvalidArgument(String),

    // ========== Storage Errors ==========
    #[error("Storage error: {0}")]
    Csv(#[from] csv::Error),

    // ========== I/O Errors ==========
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    // ========== Internal Errors ==========
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for FlatDB operations
pub type Result<T> = std::result::Result<T, Error>;
