//! Table storage for FlatDB
//!
//! A table is one header-delimited text file: the first row holds the column
//! names, every following row is one record in column order.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::record::Record;
use crate::catalog::{ColumnRef, Schema, TableId};
use crate::error::{Error, Result};

/// A table backed by a single file
#[derive(Debug)]
pub struct Table {
    /// Process-local handle
    id: TableId,
    /// Display name (file stem)
    name: String,
    /// Location of the backing file
    path: PathBuf,
    /// Column names, fixed for the table's lifetime
    schema: Arc<Schema>,
    /// Read/write handle held for appends
    file: File,
}

impl Table {
    /// Create a new table file and write its header.
    ///
    /// Fails with `AlreadyExists` if anything is already stored at `path`.
    pub fn create<I, S>(path: impl AsRef<Path>, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path = path.as_ref();
        let name = table_name(path);
        let schema = Schema::new(&name, columns)?;
        if schema.is_empty() {
            return Err(Error::NoSchema(path.display().to_string()));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => Error::AlreadyExists(path.display().to_string()),
                _ => Error::IoError(e),
            })?;

        let table = Self {
            id: TableId::next(),
            name,
            path: path.to_path_buf(),
            schema: Arc::new(schema),
            file,
        };

        if let Err(e) = table.write_header() {
            // No half-created tables
            fs::remove_file(path).ok();
            return Err(e);
        }

        info!(table = %table.name, id = %table.id, columns = table.schema.column_count(), "created table");
        Ok(table)
    }

    /// Open an existing table, reading its schema from the header row
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
                _ => Error::IoError(e),
            })?;

        let name = table_name(path);
        let headers = {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .from_reader(&file);
            reader.headers()?.clone()
        };
        if headers.is_empty() {
            return Err(Error::NoSchema(path.display().to_string()));
        }
        let schema = Schema::new(&name, headers.iter())?;

        let table = Self {
            id: TableId::next(),
            name,
            path: path.to_path_buf(),
            schema: Arc::new(schema),
            file,
        };
        info!(table = %table.name, id = %table.id, columns = table.schema.column_count(), "opened table");
        Ok(table)
    }

    /// Open the table at `path` if it exists, otherwise create it
    pub fn open_or_create<I, S>(path: impl AsRef<Path>, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path)
        } else {
            Self::create(path, columns)
        }
    }

    /// Get the table handle
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Get table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the backing file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get table schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Get a reference to one of this table's columns
    pub fn column(&self, name: &str) -> Result<ColumnRef> {
        if !self.schema.has_column(name) {
            return Err(Error::ColumnNotFound(name.to_string(), self.name.clone()));
        }
        Ok(ColumnRef::new(self.id, name))
    }

    /// References to every column, in schema order
    pub fn columns(&self) -> Vec<ColumnRef> {
        self.schema
            .columns()
            .iter()
            .map(|name| ColumnRef::new(self.id, name.as_str()))
            .collect()
    }

    /// Scan all records from the start of the file.
    ///
    /// Every call opens its own read cursor, so several scans of the same
    /// table can be in flight at once (as in a self-join).
    pub fn scan(&self) -> Result<TableScan> {
        let file = File::open(&self.path)?;
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(file);
        Ok(TableScan {
            schema: Arc::clone(&self.schema),
            records: reader.into_records(),
        })
    }

    /// Append a record at the end of the table
    pub fn append(&mut self, record: &Record) -> Result<()> {
        self.check_record(record)?;

        self.file.seek(SeekFrom::End(0))?;
        let mut writer = csv_writer(&self.file);
        writer.write_record(self.ordered_values(record))?;
        writer.flush()?;
        Ok(())
    }

    /// Replace the table's content with the records produced by `f`.
    ///
    /// Every stored record is passed to `f` in order; `Some` re-emits the
    /// returned record, `None` drops it. Output goes to a scratch file next to
    /// the table which is renamed over the table file only once the whole pass
    /// has succeeded. On error the scratch file is removed and the table file
    /// is untouched.
    pub fn rewrite<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(Record) -> Result<Option<Record>>,
    {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let scratch = tempfile::Builder::new()
            .prefix(".flatdb-")
            .suffix(".csv")
            .tempfile_in(&dir)?;
        debug!(table = %self.name, scratch = %scratch.path().display(), "rewriting table");

        {
            let mut writer = csv_writer(scratch.as_file());
            writer.write_record(self.schema.columns())?;
            for record in self.scan()? {
                if let Some(record) = f(record?)? {
                    self.check_record(&record)?;
                    writer.write_record(self.ordered_values(&record))?;
                }
            }
            writer.flush()?;
        }
        scratch.as_file().sync_all()?;

        let permissions = fs::metadata(&self.path)?.permissions();
        fs::set_permissions(scratch.path(), permissions)?;
        scratch
            .persist(&self.path)
            .map_err(|e| Error::IoError(e.error))?;

        self.file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        Ok(())
    }

    fn write_header(&self) -> Result<()> {
        let mut writer = csv_writer(&self.file);
        writer.write_record(self.schema.columns())?;
        writer.flush()?;
        Ok(())
    }

    /// A record must hold exactly the schema's columns
    fn check_record(&self, record: &Record) -> Result<()> {
        let matches = record.len() == self.schema.column_count()
            && self.schema.columns().iter().all(|c| record.contains(c));
        if !matches {
            return Err(Error::SchemaMismatch {
                expected: self.schema.columns().to_vec(),
                found: record.columns().map(str::to_string).collect(),
            });
        }
        Ok(())
    }

    fn ordered_values<'r>(&'r self, record: &'r Record) -> impl Iterator<Item = &'r str> {
        self.schema
            .columns()
            .iter()
            .map(move |c| record.get(c).unwrap_or_default())
    }
}

/// A lazy pass over a table's records in storage order
pub struct TableScan {
    schema: Arc<Schema>,
    records: csv::StringRecordsIntoIter<File>,
}

impl Iterator for TableScan {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let fields = match self.records.next()? {
            Ok(fields) => fields,
            Err(e) => return Some(Err(e.into())),
        };
        Some(Ok(self
            .schema
            .columns()
            .iter()
            .map(String::as_str)
            .zip(fields.iter())
            .collect()))
    }
}

/// CSV writer with the standard quoting rules and CRLF row terminators
pub(crate) fn csv_writer<W: io::Write>(inner: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(inner)
}

fn table_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
