//! Configuration for FlatDB
//!
//! Settings for the external sort: run size, merge fan-in and where run files
//! live.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default number of rows per initial run, also the merge fan-in
pub const DEFAULT_CHUNK_SIZE: usize = 16;

/// External sort configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    /// Rows per initial run and maximum runs merged at once
    pub chunk_size: usize,
    /// Persist run files here instead of using anonymous temporary files
    pub debug_dir: Option<PathBuf>,
    /// Directory for anonymous run files (system temp dir when unset)
    pub scratch_dir: Option<PathBuf>,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            debug_dir: None,
            scratch_dir: None,
        }
    }
}

impl SortConfig {
    /// Create a new sort config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: SortConfig =
            serde_json::from_str(&json).map_err(|e| Error::Internal(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the chunk size
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Persist run files into `dir`
    pub fn debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    /// Create anonymous run files in `dir`
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Number of runs merged at once. Never below 2, otherwise a merge pass
    /// would not reduce the run count.
    pub fn fan_in(&self) -> usize {
        self.chunk_size.max(2)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidArgument(
                "sort chunk size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_builder() {
        let config = SortConfig::new();
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(config.debug_dir.is_none());

        let config = SortConfig::new().chunk_size(1).debug_dir("runs");
        assert_eq!(config.fan_in(), 2);
        assert_eq!(config.debug_dir, Some(PathBuf::from("runs")));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let result = SortConfig::new().chunk_size(0).validate();
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sort.json");
        std::fs::write(&path, r#"{ "chunk_size": 4 }"#).unwrap();

        let config = SortConfig::from_json_file(&path).unwrap();
        assert_eq!(config.chunk_size, 4);
        assert!(config.scratch_dir.is_none());

        std::fs::write(&path, r#"{ "chunk_size": 0 }"#).unwrap();
        assert!(SortConfig::from_json_file(&path).is_err());
    }
}
