//! Catalog module
//!
//! This module contains schema definitions, table handles and value types.

pub mod schema;
pub mod types;

pub use schema::{ColumnRef, Schema, TableId};
pub use types::ValueType;
