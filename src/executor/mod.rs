//! Query execution module
//!
//! This module contains predicates, the nested-loop query, mutations,
//! group-by counting and the external sort.

pub mod group_by;
pub mod mutation;
pub mod output;
pub mod predicate;
pub mod query;
pub mod sort;

pub use group_by::{GroupBy, COUNT_COLUMN};
pub use mutation::{Delete, Update};
pub use output::write_csv;
pub use predicate::{all_match, CmpOp, Operand, Predicate};
pub use query::{Projection, Query, Records, Rows};
pub use sort::{KeyFn, Sort, SortKey, SortedRecords};
