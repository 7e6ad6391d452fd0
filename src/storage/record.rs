//! Records and composite rows for FlatDB
//!
//! A `Record` is one stored row: column name to string value, in column order.
//! A `Row` is what queries evaluate predicates against: the current record of
//! every participating table, keyed by table handle.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::catalog::{ColumnRef, TableId};
use crate::error::{Error, Result};

/// A single record (row) of a table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Field values keyed by column name, in insertion order
    fields: IndexMap<String, String>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, returning the previous value if any
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.fields.insert(column.into(), value.into())
    }

    /// Get a field by column name
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Get a mutable field by column name
    pub fn get_mut(&mut self, column: &str) -> Option<&mut String> {
        self.fields.get_mut(column)
    }

    /// Check if a column is present
    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    /// Column names in field order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Field values in field order
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.values().map(String::as_str)
    }

    /// `(column, value)` pairs in field order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A composite row: the current record of each table taking part in a query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// One entry per table, in declaration order
    entries: Vec<(TableId, Record)>,
}

impl Row {
    /// Create a composite row from per-table records
    pub fn new(entries: Vec<(TableId, Record)>) -> Self {
        Self { entries }
    }

    /// Create a row holding a single table's record
    pub fn single(table: TableId, record: Record) -> Self {
        Self {
            entries: vec![(table, record)],
        }
    }

    /// Get the record contributed by a table
    pub fn record(&self, table: TableId) -> Option<&Record> {
        self.entries
            .iter()
            .find(|(id, _)| *id == table)
            .map(|(_, record)| record)
    }

    /// Resolve a column reference to its raw string value
    pub fn value(&self, column: &ColumnRef) -> Result<&str> {
        let record = self
            .record(column.table)
            .ok_or(Error::TableNotInRow(column.table))?;
        record
            .get(&column.name)
            .ok_or_else(|| Error::ColumnNotFound(column.name.clone(), column.table.to_string()))
    }
}
