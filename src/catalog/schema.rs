//! Schema definitions for FlatDB
//!
//! This module defines table schemas, table handles and column references.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-local handle identifying an open table.
///
/// Handles are handed out in increasing order every time a table is opened or
/// created, so two handles on the same file are still distinct tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(u64);

impl TableId {
    /// Allocate the next unused handle
    pub fn next() -> Self {
        TableId(NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Table schema - the ordered column names of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Ordered list of column names
    columns: Vec<String>,
    /// Column names, for membership checks
    names: HashSet<String>,
}

impl Schema {
    /// Create a schema from an ordered list of column names.
    ///
    /// `table` is only used to label the error when a column is repeated.
    pub fn new<I, S>(table: &str, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut schema = Self {
            columns: Vec::new(),
            names: HashSet::new(),
        };
        for column in columns {
            let column = column.into();
            if !schema.names.insert(column.clone()) {
                return Err(Error::DuplicateColumn {
                    column,
                    table: table.to_string(),
                });
            }
            schema.columns.push(column);
        }
        Ok(schema)
    }

    /// Get all column names in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Get number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Check if column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A reference to one column of one table.
///
/// Column references carry only the table handle and the column name, so they
/// can be reused freely across queries, mutations and sorts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Handle of the owning table
    pub table: TableId,
    /// Column name
    pub name: String,
}

impl ColumnRef {
    pub fn new(table: TableId, name: impl Into<String>) -> Self {
        Self {
            table,
            name: name.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.name)
    }
}
