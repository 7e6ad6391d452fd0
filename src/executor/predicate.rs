//! Predicate expressions for FlatDB
//!
//! Predicates are immutable boolean expressions over a composite row. They are
//! built from column references and combined with `and`, `or` and `not`;
//! nothing is evaluated until `evaluate` is called on a row.

use indexmap::IndexSet;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

use crate::catalog::ColumnRef;
use crate::error::{Error, Result};
use crate::storage::{Row, Value};

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// Whether `left <op> right` holds given `left.cmp(right)`
    pub fn test(self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        write!(f, "{}", symbol)
    }
}

/// Right-hand side of a comparison
#[derive(Debug, Clone)]
pub enum Operand {
    /// Typed literal; the stored field is converted to its type
    Literal(Value),
    /// Another column; both raw strings are compared as-is
    Column(ColumnRef),
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Literal(v)
    }
}

impl From<ColumnRef> for Operand {
    fn from(c: ColumnRef) -> Self {
        Operand::Column(c)
    }
}

impl From<&ColumnRef> for Operand {
    fn from(c: &ColumnRef) -> Self {
        Operand::Column(c.clone())
    }
}

impl From<&str> for Operand {
    fn from(v: &str) -> Self {
        Operand::Literal(v.into())
    }
}

impl From<String> for Operand {
    fn from(v: String) -> Self {
        Operand::Literal(v.into())
    }
}

impl From<i32> for Operand {
    fn from(v: i32) -> Self {
        Operand::Literal(v.into())
    }
}

impl From<i64> for Operand {
    fn from(v: i64) -> Self {
        Operand::Literal(v.into())
    }
}

impl From<f64> for Operand {
    fn from(v: f64) -> Self {
        Operand::Literal(v.into())
    }
}

/// A boolean expression over a composite row
#[derive(Debug, Clone)]
pub enum Predicate {
    /// `column <op> operand`
    Compare {
        column: ColumnRef,
        op: CmpOp,
        operand: Operand,
    },
    /// Raw field value is one of `values`
    MemberOf {
        column: ColumnRef,
        values: IndexSet<String>,
    },
    /// Raw field value matches `pattern` starting at its first character
    Matches { column: ColumnRef, pattern: Regex },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare(column: &ColumnRef, op: CmpOp, operand: impl Into<Operand>) -> Self {
        Predicate::Compare {
            column: column.clone(),
            op,
            operand: operand.into(),
        }
    }

    /// Both predicates hold
    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    /// At least one predicate holds
    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    /// The predicate does not hold
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Evaluate against a row.
    ///
    /// `and`/`or` stop at the left operand when it decides the result, so a
    /// right operand that would fail to convert its field is never reached.
    pub fn evaluate(&self, row: &Row) -> Result<bool> {
        match self {
            Predicate::Compare {
                column,
                op,
                operand,
            } => {
                let raw = row.value(column)?;
                let ordering = match operand {
                    Operand::Column(other) => Some(raw.cmp(row.value(other)?)),
                    Operand::Literal(literal) => literal.coerce(raw)?.compare(literal),
                };
                // Unordered (NaN) only satisfies `!=`
                Ok(ordering.map_or(*op == CmpOp::Ne, |ordering| op.test(ordering)))
            }
            Predicate::MemberOf { column, values } => Ok(values.contains(row.value(column)?)),
            Predicate::Matches { column, pattern } => Ok(pattern.is_match(row.value(column)?)),
            Predicate::And(left, right) => Ok(left.evaluate(row)? && right.evaluate(row)?),
            Predicate::Or(left, right) => Ok(left.evaluate(row)? || right.evaluate(row)?),
            Predicate::Not(inner) => Ok(!inner.evaluate(row)?),
        }
    }
}

/// Evaluate an implicitly AND-ed filter list, stopping at the first miss
pub fn all_match(filters: &[Predicate], row: &Row) -> Result<bool> {
    for filter in filters {
        if !filter.evaluate(row)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Predicate constructors on column references
impl ColumnRef {
    pub fn equals(&self, operand: impl Into<Operand>) -> Predicate {
        Predicate::compare(self, CmpOp::Eq, operand)
    }

    pub fn not_equals(&self, operand: impl Into<Operand>) -> Predicate {
        Predicate::compare(self, CmpOp::Ne, operand)
    }

    pub fn less_than(&self, operand: impl Into<Operand>) -> Predicate {
        Predicate::compare(self, CmpOp::Lt, operand)
    }

    pub fn less_or_equal(&self, operand: impl Into<Operand>) -> Predicate {
        Predicate::compare(self, CmpOp::Le, operand)
    }

    pub fn greater_than(&self, operand: impl Into<Operand>) -> Predicate {
        Predicate::compare(self, CmpOp::Gt, operand)
    }

    pub fn greater_or_equal(&self, operand: impl Into<Operand>) -> Predicate {
        Predicate::compare(self, CmpOp::Ge, operand)
    }

    /// Raw value is one of `values`
    pub fn member_of<I, S>(&self, values: I) -> Predicate
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::MemberOf {
            column: self.clone(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Raw value matches the regular expression `pattern` at its start
    pub fn matches(&self, pattern: &str) -> Result<Predicate> {
        let anchored = Regex::new(&format!("^(?:{})", pattern))
            .map_err(|e| Error::InvalidPattern(e.to_string()))?;
        Ok(Predicate::Matches {
            column: self.clone(),
            pattern: anchored,
        })
    }
}
