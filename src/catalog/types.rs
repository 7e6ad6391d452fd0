//! Data types for FlatDB
//!
//! Every stored field is a string. These types describe how a stored string is
//! interpreted when it is compared against a typed literal or used as a sort key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic type of a literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Raw string, no conversion
    String,
    /// 64-bit signed integer
    Integer,
    /// 64-bit floating point
    Float,
}

impl ValueType {
    /// Type name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::String => "STRING",
            ValueType::Integer => "INTEGER",
            ValueType::Float => "FLOAT",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
