//! FlatDB - A minimal query engine over CSV tables
//!
//! This library provides:
//! - Table files with a header row and one record per line
//! - Predicates over column references
//! - Nested-loop join queries with projection and limits
//! - Whole-file update and delete
//! - Group-by counting
//! - External merge sort

pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod storage;

pub use catalog::{ColumnRef, TableId};
pub use config::SortConfig;
pub use error::{Error, Result};
pub use executor::{Delete, GroupBy, Predicate, Query, Sort, SortKey, Update};
pub use storage::{Record, Row, Table, Value};
