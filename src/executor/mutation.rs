//! Update and delete for FlatDB
//!
//! Both mutations rewrite the whole table in one pass: every record is run
//! through the filters and re-emitted (possibly changed) or dropped. The new
//! content replaces the table only if the entire pass succeeds.

use tracing::info;

use super::predicate::{all_match, Predicate};
use crate::catalog::ColumnRef;
use crate::error::{Error, Result};
use crate::storage::{Record, Row, Table};

/// Set one column to a literal value on every record matching the filters
#[derive(Debug)]
pub struct Update<'t> {
    table: &'t mut Table,
    filters: Vec<Predicate>,
    column: ColumnRef,
    value: String,
}

impl<'t> Update<'t> {
    /// `column` must belong to `table`
    pub fn new(table: &'t mut Table, column: &ColumnRef, value: impl Into<String>) -> Result<Self> {
        if column.table != table.id() || !table.schema().has_column(&column.name) {
            return Err(Error::ColumnNotFound(
                column.name.clone(),
                table.name().to_string(),
            ));
        }
        Ok(Self {
            table,
            filters: Vec::new(),
            column: column.clone(),
            value: value.into(),
        })
    }

    /// Add a filter
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    /// Rewrite the table, returning the number of updated records
    pub fn execute(&mut self) -> Result<usize> {
        let column = self.column.name.as_str();
        let value = self.value.as_str();
        let updated = rewrite_matching(self.table, &self.filters, |mut record| {
            if let Some(field) = record.get_mut(column) {
                *field = value.to_string();
            }
            Some(record)
        })?;
        info!(table = %self.table.name(), column, updated, "updated records");
        Ok(updated)
    }
}

/// Remove every record matching the filters
#[derive(Debug)]
pub struct Delete<'t> {
    table: &'t mut Table,
    filters: Vec<Predicate>,
}

impl<'t> Delete<'t> {
    pub fn new(table: &'t mut Table) -> Self {
        Self {
            table,
            filters: Vec::new(),
        }
    }

    /// Add a filter
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    /// Rewrite the table, returning the number of deleted records
    pub fn execute(&mut self) -> Result<usize> {
        let deleted = rewrite_matching(self.table, &self.filters, |_| None)?;
        info!(table = %self.table.name(), deleted, "deleted records");
        Ok(deleted)
    }
}

/// Rewrite `table`, passing records that match every filter through
/// `on_match` and keeping all others unchanged. Returns the match count.
fn rewrite_matching<F>(table: &mut Table, filters: &[Predicate], mut on_match: F) -> Result<usize>
where
    F: FnMut(Record) -> Option<Record>,
{
    let id = table.id();
    let mut matched = 0;
    table.rewrite(|record| {
        if all_match(filters, &Row::single(id, record.clone()))? {
            matched += 1;
            Ok(on_match(record))
        } else {
            Ok(Some(record))
        }
    })?;
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn users(dir: &std::path::Path) -> Table {
        let mut table = Table::create(dir.join("users.csv"), ["id", "name", "age"]).unwrap();
        for (id, name, age) in [("1", "Alice", "25"), ("2", "Bob", "31"), ("3", "Carol", "40")] {
            let record: Record = [("id", id), ("name", name), ("age", age)].into_iter().collect();
            table.append(&record).unwrap();
        }
        table
    }

    fn names(table: &Table) -> Vec<String> {
        table
            .scan()
            .unwrap()
            .map(|r| r.unwrap().get("name").unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_update_matching_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = users(dir.path());
        let age = table.column("age").unwrap();
        let name = table.column("name").unwrap();

        let updated = Update::new(&mut table, &name, "Senior")
            .unwrap()
            .filter(age.greater_than(30))
            .execute()
            .unwrap();

        assert_eq!(updated, 2);
        assert_eq!(names(&table), vec!["Alice", "Senior", "Senior"]);
        let ids: Vec<String> = table
            .scan()
            .unwrap()
            .map(|r| r.unwrap().get("id").unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_update_without_filters_touches_every_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = users(dir.path());
        let name = table.column("name").unwrap();

        let updated = Update::new(&mut table, &name, "x").unwrap().execute().unwrap();
        assert_eq!(updated, 3);
        assert_eq!(names(&table), vec!["x", "x", "x"]);
    }

    #[test]
    fn test_update_foreign_column_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = users(dir.path());
        let other = Table::create(dir.path().join("other.csv"), ["name"]).unwrap();
        let foreign = other.column("name").unwrap();

        assert!(matches!(
            Update::new(&mut table, &foreign, "x"),
            Err(Error::ColumnNotFound(..))
        ));
    }

    #[test]
    fn test_delete_matching_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = users(dir.path());
        let name = table.column("name").unwrap();

        let deleted = Delete::new(&mut table)
            .filter(name.member_of(["Alice", "Carol"]))
            .execute()
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(names(&table), vec!["Bob"]);
    }

    #[test]
    fn test_delete_everything_leaves_header() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = users(dir.path());

        assert_eq!(Delete::new(&mut table).execute().unwrap(), 3);
        assert_eq!(
            fs::read_to_string(table.path()).unwrap(),
            "id,name,age\r\n"
        );
    }

    #[test]
    fn test_failed_predicate_leaves_table_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = users(dir.path());
        let name = table.column("name").unwrap();
        let before = fs::read(table.path()).unwrap();

        // Names cannot be read as integers
        let result = Delete::new(&mut table)
            .filter(name.less_than(3))
            .execute();
        assert!(matches!(result, Err(Error::CoercionFailure { .. })));
        assert_eq!(fs::read(table.path()).unwrap(), before);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
