//! Group-by aggregation for FlatDB
//!
//! Counts a query's rows per distinct tuple of grouping column values. All
//! distinct keys are held in memory; the input is streamed.

use indexmap::IndexMap;
use tracing::debug;

use super::query::{Projection, Query};
use crate::catalog::{ColumnRef, TableId};
use crate::error::{Error, Result};
use crate::storage::Record;

/// Name of the aggregate column in the output
pub const COUNT_COLUMN: &str = "count";

/// Group a query's rows by a tuple of columns
#[derive(Debug, Clone)]
pub struct GroupBy<'a> {
    query: Query<'a>,
    columns: Vec<ColumnRef>,
}

impl<'a> GroupBy<'a> {
    pub fn new(query: Query<'a>, columns: impl IntoIterator<Item = ColumnRef>) -> Self {
        Self {
            query,
            columns: columns.into_iter().collect(),
        }
    }

    /// Count rows per distinct key.
    ///
    /// Returns one record per key, in first-seen order, holding the grouping
    /// columns followed by `count`.
    pub fn count(&self) -> Result<Vec<Record>> {
        let key = self.key_projection()?;

        let mut counts: IndexMap<Vec<String>, usize> = IndexMap::new();
        for row in self.query.rows()? {
            let row = row?;
            let values = key.apply(&row)?.values().map(str::to_string).collect();
            *counts.entry(values).or_insert(0) += 1;
        }
        debug!(groups = counts.len(), "grouped rows");

        let aliases = key.aliases();
        Ok(counts
            .into_iter()
            .map(|(values, count)| {
                let mut record: Record = aliases.iter().map(String::as_str).zip(values).collect();
                record.insert(COUNT_COLUMN, count.to_string());
                record
            })
            .collect())
    }

    /// Output column names, `count` last
    pub fn columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| c.name.clone())
            .chain(std::iter::once(COUNT_COLUMN.to_string()))
            .collect()
    }

    fn key_projection(&self) -> Result<Projection> {
        if let Some(column) = self.columns.iter().find(|c| c.name == COUNT_COLUMN) {
            return Err(Error::DuplicateAlias(column.name.clone()));
        }
        let ids: Vec<TableId> = self.query.tables().iter().map(|t| t.id()).collect();
        Projection::new(
            self.columns
                .iter()
                .map(|c| (c.clone(), c.name.clone()))
                .collect(),
            &ids,
        )
    }
}
