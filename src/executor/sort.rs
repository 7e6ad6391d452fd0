//! External sort for FlatDB
//!
//! Orders a query's rows by a key without holding the whole input in memory:
//!
//! 1. Rows are pulled in chunks, each chunk is stable-sorted in memory and
//!    written out as a run.
//! 2. While there are more runs than can be merged at once, consecutive groups
//!    of runs are merged into longer runs.
//! 3. The remaining runs are merged lazily through a heap as the caller pulls
//!    output rows.
//!
//! Equal keys keep their input order: runs are sorted stably and the merge
//! prefers the earlier run on ties, so the output does not depend on the chunk
//! size.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use super::output::write_csv;
use super::query::{Projection, Query};
use crate::catalog::{ColumnRef, ValueType};
use crate::config::SortConfig;
use crate::error::{Error, Result};
use crate::storage::{Record, Row, Run, RunReader, RunStore, Value};

/// Caller-supplied key transform
pub type KeyFn = Arc<dyn Fn(&str) -> Result<Value> + Send + Sync>;

/// How to derive a sort key from a row
#[derive(Clone)]
pub enum SortKey {
    /// The raw string value
    Column(ColumnRef),
    /// The value parsed as the given type
    Typed(ColumnRef, ValueType),
    /// The value passed through a transform
    Map(ColumnRef, KeyFn),
}

impl SortKey {
    /// Order by the raw string value
    pub fn column(column: &ColumnRef) -> Self {
        SortKey::Column(column.clone())
    }

    /// Order by the value read as an integer
    pub fn integer(column: &ColumnRef) -> Self {
        SortKey::Typed(column.clone(), ValueType::Integer)
    }

    /// Order by the value read as a float
    pub fn float(column: &ColumnRef) -> Self {
        SortKey::Typed(column.clone(), ValueType::Float)
    }

    /// Order by `f(value)`
    pub fn map<F>(column: &ColumnRef, f: F) -> Self
    where
        F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        SortKey::Map(column.clone(), Arc::new(f))
    }

    /// The column the key is read from
    pub fn column_ref(&self) -> &ColumnRef {
        match self {
            SortKey::Column(column) | SortKey::Typed(column, _) | SortKey::Map(column, _) => column,
        }
    }

    /// Extract the key of a row
    pub fn extract(&self, row: &Row) -> Result<Value> {
        let raw = row.value(self.column_ref())?;
        match self {
            SortKey::Column(_) => Ok(Value::String(raw.to_string())),
            SortKey::Typed(_, ty) => Value::parse(raw, *ty),
            SortKey::Map(_, f) => f(raw),
        }
    }
}

impl fmt::Debug for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Column(column) => f.debug_tuple("Column").field(column).finish(),
            SortKey::Typed(column, ty) => f.debug_tuple("Typed").field(column).field(ty).finish(),
            SortKey::Map(column, _) => f.debug_tuple("Map").field(column).finish(),
        }
    }
}

/// A row and its extracted key. Only the row goes into run files; the key is
/// extracted again when the row is read back.
#[derive(Debug, Clone)]
struct SortEntry {
    key: Value,
    row: Row,
}

fn compare_keys(a: &Value, b: &Value, reverse: bool) -> Ordering {
    if reverse {
        b.cmp(a)
    } else {
        a.cmp(b)
    }
}

/// Sort a query's rows by a key
#[derive(Debug, Clone)]
pub struct Sort<'a> {
    query: Query<'a>,
    key: SortKey,
    reverse: bool,
    limit: Option<usize>,
    config: SortConfig,
}

impl<'a> Sort<'a> {
    pub fn new(query: Query<'a>, key: SortKey) -> Self {
        Self {
            query,
            key,
            reverse: false,
            limit: None,
            config: SortConfig::default(),
        }
    }

    /// Sort in descending order
    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Stop after `n` output rows
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Replace the whole sort configuration
    pub fn config(mut self, config: SortConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the chunk size
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    /// Keep run files in `dir` instead of discarding them
    pub fn debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.debug_dir = Some(dir.into());
        self
    }

    /// Output aliases in projection order
    pub fn columns(&self) -> Vec<String> {
        self.query.columns()
    }

    /// Run the sort.
    ///
    /// The whole input is consumed and spilled into runs before this returns;
    /// the final merge happens lazily as the returned records are pulled.
    pub fn execute(&self) -> Result<SortedRecords> {
        self.config.validate()?;
        let projection = self.query.projection()?;
        let key_table = self.key.column_ref().table;
        if !self.query.tables().iter().any(|t| t.id() == key_table) {
            return Err(Error::TableNotInRow(key_table));
        }

        let store = RunStore::new(&self.config)?;
        let mut runs = self.generate_runs(&store)?;

        let fan_in = self.config.fan_in();
        let mut pass = 1;
        while runs.len() > fan_in {
            runs = self.merge_pass(&store, pass, runs)?;
            pass += 1;
        }
        debug!(runs = runs.len(), passes = pass - 1, "starting final merge");

        Ok(SortedRecords {
            merger: Merger::new(runs, &self.key, self.reverse)?,
            projection,
            limit: self.limit,
            emitted: 0,
        })
    }

    /// Print the sorted result as CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let records = self.execute()?;
        let header = records.projection.aliases();
        write_csv(writer, &header, records)
    }

    fn generate_runs(&self, store: &RunStore) -> Result<Vec<Run>> {
        let chunk_size = self.config.chunk_size;
        let mut rows = self.query.rows()?;
        let mut runs = Vec::new();

        loop {
            let mut batch = Vec::with_capacity(chunk_size);
            for row in rows.by_ref().take(chunk_size) {
                let row = row?;
                let key = self.key.extract(&row)?;
                batch.push(SortEntry { key, row });
            }
            if batch.is_empty() {
                break;
            }
            let exhausted = batch.len() < chunk_size;

            batch.sort_by(|a, b| compare_keys(&a.key, &b.key, self.reverse));
            let mut writer = store.create_run(0, runs.len())?;
            for entry in &batch {
                writer.write(&entry.row)?;
            }
            runs.push(writer.finish()?);

            if exhausted {
                break;
            }
        }

        debug!(runs = runs.len(), chunk_size, "generated runs");
        Ok(runs)
    }

    fn merge_pass(&self, store: &RunStore, pass: usize, runs: Vec<Run>) -> Result<Vec<Run>> {
        let fan_in = self.config.fan_in();
        let input = runs.len();
        let mut remaining = runs.into_iter();
        let mut merged = Vec::new();

        loop {
            let group: Vec<Run> = remaining.by_ref().take(fan_in).collect();
            if group.is_empty() {
                break;
            }
            let mut writer = store.create_run(pass, merged.len())?;
            for entry in Merger::new(group, &self.key, self.reverse)? {
                writer.write(&entry?.row)?;
            }
            merged.push(writer.finish()?);
        }

        debug!(pass, input, output = merged.len(), "merge pass");
        Ok(merged)
    }
}

/// Heap slot: the current head of one run
struct HeapItem {
    entry: SortEntry,
    run: usize,
    reverse: bool,
}

// BinaryHeap pops the greatest item, so "greater" means "emitted sooner":
// the smaller key (larger when reversed), then the earlier run.
impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_keys(&other.entry.key, &self.entry.key, self.reverse)
            .then_with(|| other.run.cmp(&self.run))
    }
}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapItem {}

/// Lazy k-way merge over sorted runs
struct Merger {
    readers: Vec<RunReader<Row>>,
    heap: BinaryHeap<HeapItem>,
    key: SortKey,
    reverse: bool,
}

impl Merger {
    fn new(runs: Vec<Run>, key: &SortKey, reverse: bool) -> Result<Self> {
        let mut merger = Self {
            readers: runs.into_iter().map(Run::into_reader).collect(),
            heap: BinaryHeap::new(),
            key: key.clone(),
            reverse,
        };
        for run in 0..merger.readers.len() {
            merger.refill(run)?;
        }
        Ok(merger)
    }

    /// Push the next row of `run` onto the heap, if any
    fn refill(&mut self, run: usize) -> Result<()> {
        if let Some(row) = self.readers[run].next() {
            let row = row?;
            let key = self.key.extract(&row)?;
            self.heap.push(HeapItem {
                entry: SortEntry { key, row },
                run,
                reverse: self.reverse,
            });
        }
        Ok(())
    }

    /// Drop every run
    fn close(&mut self) {
        self.heap.clear();
        self.readers.clear();
    }
}

impl Iterator for Merger {
    type Item = Result<SortEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.heap.pop()?;
        if let Err(e) = self.refill(item.run) {
            self.close();
            return Some(Err(e));
        }
        Some(Ok(item.entry))
    }
}

/// Projected records in sorted order
pub struct SortedRecords {
    merger: Merger,
    projection: Projection,
    limit: Option<usize>,
    emitted: usize,
}

impl SortedRecords {
    pub fn projection(&self) -> &Projection {
        &self.projection
    }
}

impl Iterator for SortedRecords {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.limit.is_some_and(|limit| self.emitted >= limit) {
            self.merger.close();
            return None;
        }
        let entry = match self.merger.next()? {
            Ok(entry) => entry,
            Err(e) => return Some(Err(e)),
        };
        self.emitted += 1;
        Some(self.projection.apply(&entry.row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Table;
    use std::fs;

    fn numbers(dir: &std::path::Path, values: &[&str]) -> Table {
        let mut table = Table::create(dir.join("numbers.csv"), ["seq", "n"]).unwrap();
        for (seq, n) in values.iter().enumerate() {
            let record: Record = [("seq", seq.to_string()), ("n", n.to_string())]
                .into_iter()
                .collect();
            table.append(&record).unwrap();
        }
        table
    }

    fn column(records: SortedRecords, name: &str) -> Vec<String> {
        records
            .map(|r| r.unwrap().get(name).unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_sort_strings_and_integers() {
        let dir = tempfile::tempdir().unwrap();
        let table = numbers(dir.path(), &["10", "9", "100", "1"]);
        let n = table.column("n").unwrap();

        let by_string = Sort::new(Query::new([&table]), SortKey::column(&n)).chunk_size(2);
        assert_eq!(column(by_string.execute().unwrap(), "n"), vec!["1", "10", "100", "9"]);

        let by_number = Sort::new(Query::new([&table]), SortKey::integer(&n)).chunk_size(2);
        assert_eq!(column(by_number.execute().unwrap(), "n"), vec!["1", "9", "10", "100"]);

        let descending = by_number.reverse(true);
        assert_eq!(column(descending.execute().unwrap(), "n"), vec!["100", "10", "9", "1"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let table = numbers(dir.path(), &["2", "1", "2", "1", "2", "1", "2"]);
        let n = table.column("n").unwrap();

        for chunk_size in [1, 2, 3, 1000] {
            let sort = Sort::new(Query::new([&table]), SortKey::integer(&n)).chunk_size(chunk_size);
            assert_eq!(
                column(sort.execute().unwrap(), "seq"),
                vec!["1", "3", "5", "0", "2", "4", "6"],
                "chunk size {}",
                chunk_size
            );

            let sort = sort.reverse(true);
            assert_eq!(
                column(sort.execute().unwrap(), "seq"),
                vec!["0", "2", "4", "6", "1", "3", "5"],
                "reversed, chunk size {}",
                chunk_size
            );
        }
    }

    #[test]
    fn test_map_key_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let table = numbers(dir.path(), &["-3", "2", "-1", "4"]);
        let n = table.column("n").unwrap();

        let key = SortKey::map(&n, |raw| {
            let value: i64 = raw.parse().map_err(|_| Error::CoercionFailure {
                value: raw.to_string(),
                to: "INTEGER",
            })?;
            Ok(Value::Integer(value.abs()))
        });
        let sort = Sort::new(Query::new([&table]), key).chunk_size(3).limit(3);
        assert_eq!(column(sort.execute().unwrap(), "n"), vec!["-1", "2", "-3"]);
    }

    #[test]
    fn test_non_finite_float_keys() {
        let dir = tempfile::tempdir().unwrap();
        let table = numbers(dir.path(), &["1.5", "inf", "-2", "NaN", "-inf", "0.1"]);
        let n = table.column("n").unwrap();

        for chunk_size in [1, 2, 1000] {
            let sort = Sort::new(Query::new([&table]), SortKey::float(&n)).chunk_size(chunk_size);
            assert_eq!(
                column(sort.execute().unwrap(), "n"),
                vec!["-inf", "-2", "0.1", "1.5", "inf", "NaN"],
                "chunk size {}",
                chunk_size
            );

            let sort = sort.reverse(true);
            assert_eq!(
                column(sort.execute().unwrap(), "n"),
                vec!["NaN", "inf", "1.5", "0.1", "-2", "-inf"],
                "reversed, chunk size {}",
                chunk_size
            );
        }
    }

    #[test]
    fn test_run_files_hold_rows_only() {
        let dir = tempfile::tempdir().unwrap();
        let table = numbers(dir.path(), &["0.1", "NaN"]);
        let n = table.column("n").unwrap();
        let runs = dir.path().join("runs");

        let sort = Sort::new(Query::new([&table]), SortKey::float(&n))
            .chunk_size(2)
            .debug_dir(&runs);
        assert_eq!(sort.execute().unwrap().count(), 2);

        let line = fs::read_to_string(runs.join("pass0-run0.jsonl")).unwrap();
        let row: Row = serde_json::from_str(line.lines().next().unwrap()).unwrap();
        assert_eq!(row.value(&n).unwrap(), "0.1");
    }

    #[test]
    fn test_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let table = numbers(dir.path(), &[]);
        let n = table.column("n").unwrap();

        let sort = Sort::new(Query::new([&table]), SortKey::column(&n));
        assert_eq!(sort.execute().unwrap().count(), 0);
    }

    #[test]
    fn test_key_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let table = numbers(dir.path(), &["1", "x"]);
        let n = table.column("n").unwrap();

        let sort = Sort::new(Query::new([&table]), SortKey::integer(&n));
        assert!(matches!(sort.execute(), Err(Error::CoercionFailure { .. })));
    }

    #[test]
    fn test_invalid_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let table = numbers(dir.path(), &["1"]);
        let n = table.column("n").unwrap();

        let sort = Sort::new(Query::new([&table]), SortKey::column(&n)).chunk_size(0);
        assert!(matches!(sort.execute(), Err(Error::InvalidArgument(_))));

        let other = Table::create(dir.path().join("other.csv"), ["n"]).unwrap();
        let sort = Sort::new(Query::new([&table]), SortKey::column(&other.column("n").unwrap()));
        assert!(matches!(sort.execute(), Err(Error::TableNotInRow(_))));
    }

    #[test]
    fn test_debug_dir_keeps_runs() {
        let dir = tempfile::tempdir().unwrap();
        let values: Vec<String> = (0..10).rev().map(|i| i.to_string()).collect();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        let table = numbers(dir.path(), &refs);
        let n = table.column("n").unwrap();
        let runs = dir.path().join("runs");

        let sort = Sort::new(Query::new([&table]), SortKey::integer(&n))
            .chunk_size(2)
            .debug_dir(&runs);
        let sorted = column(sort.execute().unwrap(), "n");
        assert_eq!(sorted, (0..10).map(|i| i.to_string()).collect::<Vec<_>>());

        // 5 initial runs, merged into 3, then into 2
        assert_eq!(fs::read_dir(&runs).unwrap().count(), 10);
        let first = fs::read_to_string(runs.join("pass0-run0.jsonl")).unwrap();
        assert_eq!(first.lines().count(), 2);
        let merged = fs::read_to_string(runs.join("pass2-run0.jsonl")).unwrap();
        assert_eq!(merged.lines().count(), 8);
    }
}
