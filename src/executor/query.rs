//! Query execution for FlatDB
//!
//! A query joins one or more tables with a nested-loop cartesian product,
//! keeps the composite rows that pass every filter, projects them onto output
//! aliases and stops after an optional row cap. Everything is pulled lazily:
//! only one record per table is held at a time.

use std::collections::HashSet;
use std::io::Write;

use tracing::debug;

use super::output::write_csv;
use super::predicate::{all_match, Predicate};
use crate::catalog::{ColumnRef, TableId};
use crate::error::{Error, Result};
use crate::storage::{Record, Row, Table, TableScan};

/// A join + filter + project + limit pipeline over one or more tables
#[derive(Debug, Clone)]
pub struct Query<'a> {
    /// Joined tables, outermost loop first
    tables: Vec<&'a Table>,
    /// Filters, implicitly AND-ed
    filters: Vec<Predicate>,
    /// `(column, alias)` pairs; every column of every table when unset
    projection: Option<Vec<(ColumnRef, String)>>,
    /// Row cap
    limit: Option<usize>,
}

impl<'a> Query<'a> {
    /// Create a query over `tables`, joined in the given order
    pub fn new(tables: impl IntoIterator<Item = &'a Table>) -> Self {
        Self {
            tables: tables.into_iter().collect(),
            filters: Vec::new(),
            projection: None,
            limit: None,
        }
    }

    /// Add a filter
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    /// Output exactly these columns, each under its own column name
    pub fn project(mut self, columns: impl IntoIterator<Item = ColumnRef>) -> Self {
        self.projection = Some(
            columns
                .into_iter()
                .map(|column| {
                    let alias = column.name.clone();
                    (column, alias)
                })
                .collect(),
        );
        self
    }

    /// Output exactly these columns under the given aliases
    pub fn project_as<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = (ColumnRef, S)>,
        S: Into<String>,
    {
        self.projection = Some(
            columns
                .into_iter()
                .map(|(column, alias)| (column, alias.into()))
                .collect(),
        );
        self
    }

    /// Stop after `n` matching rows
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn tables(&self) -> &[&'a Table] {
        &self.tables
    }

    /// Output aliases in projection order
    pub fn columns(&self) -> Vec<String> {
        self.projection_pairs()
            .into_iter()
            .map(|(_, alias)| alias)
            .collect()
    }

    /// The filtered, capped stream of composite rows, before projection.
    ///
    /// Each call starts fresh scans of every table.
    pub fn rows(&self) -> Result<Rows<'_>> {
        debug!(
            tables = self.tables.len(),
            filters = self.filters.len(),
            limit = ?self.limit,
            "executing query"
        );
        Ok(Rows {
            product: CrossProduct::new(&self.tables),
            filters: &self.filters,
            limit: self.limit,
            emitted: 0,
        })
    }

    /// Execute the query, producing one projected record per result row.
    ///
    /// Fails with `DuplicateAlias` before any table is read if two output
    /// columns share an alias.
    pub fn execute(&self) -> Result<Records<'_>> {
        let projection = self.projection()?;
        Ok(Records {
            rows: self.rows()?,
            projection,
        })
    }

    /// Print the result as CSV (header of aliases, then one record per row)
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let records = self.execute()?;
        let header = records.projection().aliases();
        write_csv(writer, &header, records)
    }

    /// The validated projection
    pub(crate) fn projection(&self) -> Result<Projection> {
        let ids: Vec<TableId> = self.tables.iter().map(|t| t.id()).collect();
        Projection::new(self.projection_pairs(), &ids)
    }

    fn projection_pairs(&self) -> Vec<(ColumnRef, String)> {
        match &self.projection {
            Some(pairs) => pairs.clone(),
            None => self
                .tables
                .iter()
                .flat_map(|table| table.columns())
                .map(|column| {
                    let alias = column.name.clone();
                    (column, alias)
                })
                .collect(),
        }
    }
}

/// A checked list of `(column, alias)` pairs
#[derive(Debug, Clone)]
pub struct Projection {
    columns: Vec<(ColumnRef, String)>,
}

impl Projection {
    /// Aliases must be pairwise distinct and every column must come from one
    /// of `tables`
    pub fn new(columns: Vec<(ColumnRef, String)>, tables: &[TableId]) -> Result<Self> {
        let mut seen = HashSet::new();
        for (column, alias) in &columns {
            if !seen.insert(alias.as_str()) {
                return Err(Error::DuplicateAlias(alias.clone()));
            }
            if !tables.contains(&column.table) {
                return Err(Error::TableNotInRow(column.table));
            }
        }
        Ok(Self { columns })
    }

    pub fn aliases(&self) -> Vec<String> {
        self.columns.iter().map(|(_, alias)| alias.clone()).collect()
    }

    /// Flatten a composite row into an output record
    pub fn apply(&self, row: &Row) -> Result<Record> {
        let mut record = Record::new();
        for (column, alias) in &self.columns {
            record.insert(alias.as_str(), row.value(column)?);
        }
        Ok(record)
    }
}

/// Depth-first cartesian product over the tables' scans.
///
/// Holds one open scan and one current record per nesting level. The
/// innermost scan is restarted for every combination of outer records.
struct CrossProduct<'q> {
    tables: &'q [&'q Table],
    /// Open scans, outermost first; always one more than `current` while
    /// searching for the next tuple
    scans: Vec<TableScan>,
    current: Vec<Record>,
    done: bool,
}

impl<'q> CrossProduct<'q> {
    fn new(tables: &'q [&'q Table]) -> Self {
        Self {
            tables,
            scans: Vec::with_capacity(tables.len()),
            current: Vec::with_capacity(tables.len()),
            done: tables.is_empty(),
        }
    }

    fn advance(&mut self) -> Result<Option<Row>> {
        let depth_limit = self.tables.len();
        if self.current.len() == depth_limit {
            // Last call yielded a full tuple; move the innermost level on
            self.current.pop();
        } else if self.scans.is_empty() {
            self.scans.push(self.tables[0].scan()?);
        }

        loop {
            let depth = self.current.len();
            match self.scans[depth].next() {
                Some(record) => {
                    self.current.push(record?);
                    if self.current.len() == depth_limit {
                        return Ok(Some(self.row()));
                    }
                    self.scans.push(self.tables[depth + 1].scan()?);
                }
                None => {
                    self.scans.pop();
                    if depth == 0 {
                        return Ok(None);
                    }
                    self.current.pop();
                }
            }
        }
    }

    fn row(&self) -> Row {
        Row::new(
            self.tables
                .iter()
                .map(|t| t.id())
                .zip(self.current.iter().cloned())
                .collect(),
        )
    }

    /// Release every open scan
    fn close(&mut self) {
        self.done = true;
        self.scans.clear();
        self.current.clear();
    }
}

impl Iterator for CrossProduct<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.close();
                None
            }
            Err(e) => {
                self.close();
                Some(Err(e))
            }
        }
    }
}

/// Composite rows that pass every filter, up to the row cap
pub struct Rows<'q> {
    product: CrossProduct<'q>,
    filters: &'q [Predicate],
    limit: Option<usize>,
    emitted: usize,
}

impl Iterator for Rows<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.limit.is_some_and(|limit| self.emitted >= limit) {
            self.product.close();
            return None;
        }
        loop {
            let row = match self.product.next()? {
                Ok(row) => row,
                Err(e) => return Some(Err(e)),
            };
            match all_match(self.filters, &row) {
                Ok(true) => {
                    self.emitted += 1;
                    return Some(Ok(row));
                }
                Ok(false) => continue,
                Err(e) => {
                    self.product.close();
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Projected output records of a query
pub struct Records<'q> {
    rows: Rows<'q>,
    projection: Projection,
}

impl Records<'_> {
    pub fn projection(&self) -> &Projection {
        &self.projection
    }
}

impl Iterator for Records<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.rows.next()? {
            Ok(row) => row,
            Err(e) => return Some(Err(e)),
        };
        Some(self.projection.apply(&row))
    }
}
