//! Storage engine module
//!
//! This module contains the storage components:
//! - Header-delimited table files
//! - Records and composite rows
//! - Typed values
//! - Spill files for the external sort

pub mod record;
pub mod spill;
pub mod table;
pub mod value;

pub use record::{Record, Row};
pub use spill::{Run, RunReader, RunStore, RunWriter};
pub use table::{Table, TableScan};
pub use value::Value;
