//! Spill files for FlatDB
//!
//! Sorted runs produced by the external sort are written as JSON Lines, one
//! entry per line. Runs are anonymous temporary files that vanish when dropped,
//! unless a debug directory is configured, in which case they are kept under
//! predictable names for inspection.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Lines, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::config::SortConfig;
use crate::error::{Error, Result};

/// Allocates run files for one sort
#[derive(Debug, Clone)]
pub struct RunStore {
    /// Keep runs here under `pass{P}-run{R}.jsonl`
    debug_dir: Option<PathBuf>,
    /// Anonymous runs go here (system temp dir when unset)
    scratch_dir: Option<PathBuf>,
}

impl RunStore {
    pub fn new(config: &SortConfig) -> Result<Self> {
        if let Some(dir) = &config.debug_dir {
            fs::create_dir_all(dir)?;
        }
        Ok(Self {
            debug_dir: config.debug_dir.clone(),
            scratch_dir: config.scratch_dir.clone(),
        })
    }

    /// Start writing the `index`-th run of merge pass `pass`
    pub fn create_run(&self, pass: usize, index: usize) -> Result<RunWriter> {
        let (file, path) = match &self.debug_dir {
            Some(dir) => {
                let path = dir.join(format!("pass{}-run{}.jsonl", pass, index));
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&path)?;
                (file, Some(path))
            }
            None => {
                let file = match &self.scratch_dir {
                    Some(dir) => tempfile::tempfile_in(dir)?,
                    None => tempfile::tempfile()?,
                };
                (file, None)
            }
        };
        Ok(RunWriter {
            writer: BufWriter::new(file),
            path,
            len: 0,
        })
    }
}

/// Writes one run, entry by entry
pub struct RunWriter {
    writer: BufWriter<File>,
    path: Option<PathBuf>,
    len: usize,
}

impl RunWriter {
    /// Append one entry
    pub fn write<T: Serialize>(&mut self, entry: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, entry)
            .map_err(|e| Error::Internal(e.to_string()))?;
        self.writer.write_all(b"\n")?;
        self.len += 1;
        Ok(())
    }

    /// Flush the run and rewind it for reading
    pub fn finish(self) -> Result<Run> {
        let mut file = self.writer.into_inner().map_err(|e| e.into_error())?;
        file.seek(SeekFrom::Start(0))?;
        trace!(entries = self.len, path = ?self.path, "finished run");
        Ok(Run {
            file,
            path: self.path,
            len: self.len,
        })
    }
}

/// A finished run, ready to be read back from the start
#[derive(Debug)]
pub struct Run {
    file: File,
    path: Option<PathBuf>,
    len: usize,
}

impl Run {
    /// Number of entries in the run
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Location of a persisted run; `None` for anonymous runs
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read the run's entries in order
    pub fn into_reader<T: DeserializeOwned>(self) -> RunReader<T> {
        RunReader {
            lines: BufReader::new(self.file).lines(),
            _entry: PhantomData,
        }
    }
}

/// Reads a run back entry by entry
pub struct RunReader<T> {
    lines: Lines<BufReader<File>>,
    _entry: PhantomData<T>,
}

impl<T: DeserializeOwned> Iterator for RunReader<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.lines.next()? {
            Ok(line) => line,
            Err(e) => return Some(Err(e.into())),
        };
        Some(serde_json::from_str(&line).map_err(|e| Error::Internal(e.to_string())))
    }
}
