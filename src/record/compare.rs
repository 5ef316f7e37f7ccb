//! Value comparison and predicates
//!
//! Comparisons involving NULL never match. A missing predicate matches every
//! row.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::Result;
use crate::ArgonError;

use super::codec::Record;
use super::types::Value;

// =============================================================================
// Operator
// =============================================================================

/// Comparison operator of a WHERE condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl Operator {
    /// Operator selecting exactly the rows this one rejects (for `NOT`)
    pub fn negate(self) -> Self {
        match self {
            Operator::Equal => Operator::NotEqual,
            Operator::NotEqual => Operator::Equal,
            Operator::Less => Operator::GreaterEqual,
            Operator::LessEqual => Operator::Greater,
            Operator::Greater => Operator::LessEqual,
            Operator::GreaterEqual => Operator::Less,
        }
    }

    /// Does `stored <op> target` hold, given `stored.cmp(target)`?
    pub fn matches(self, ordering: Ordering) -> bool {
        match self {
            Operator::Equal => ordering == Ordering::Equal,
            Operator::NotEqual => ordering != Ordering::Equal,
            Operator::Less => ordering == Ordering::Less,
            Operator::LessEqual => ordering != Ordering::Greater,
            Operator::Greater => ordering == Ordering::Greater,
            Operator::GreaterEqual => ordering != Ordering::Less,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::Less => "<",
            Operator::LessEqual => "<=",
            Operator::Greater => ">",
            Operator::GreaterEqual => ">=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = ArgonError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" => Ok(Operator::Equal),
            "!=" | "<>" => Ok(Operator::NotEqual),
            "<" => Ok(Operator::Less),
            "<=" => Ok(Operator::LessEqual),
            ">" => Ok(Operator::Greater),
            ">=" => Ok(Operator::GreaterEqual),
            other => Err(ArgonError::Parse(format!("Unknown operator: {}", other))),
        }
    }
}

// =============================================================================
// Comparison
// =============================================================================

/// Typed comparison of two values
///
/// Returns `None` when either side is NULL or the types are incomparable.
/// Integer-like types compare as `i64`, floating types as `f64` with a total
/// order so that indexes stay sorted even with NaN.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Year(a), Value::Year(b)) => Some(a.cmp(b)),
        (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b))
        | (Value::DateTime(a), Value::DateTime(b))
        | (Value::Date(a), Value::DateTime(b))
        | (Value::DateTime(a), Value::Date(b)) => Some(a.cmp(b)),
        _ => match (as_integer(left), as_integer(right)) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => match (as_float(left), as_float(right)) {
                (Some(a), Some(b)) => Some(a.total_cmp(&b)),
                _ => None,
            },
        },
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::TinyInt(v) => Some(*v as i64),
        Value::SmallInt(v) => Some(*v as i64),
        Value::Int(v) => Some(*v as i64),
        Value::BigInt(v) => Some(*v),
        _ => None,
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Float(v) => Some(*v as f64),
        Value::Double(v) => Some(*v),
        other => as_integer(other).map(|v| v as f64),
    }
}

// =============================================================================
// Predicate
// =============================================================================

/// `column <op> value` over a record's values
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: usize,
    pub op: Operator,
    pub value: Value,
}

impl Predicate {
    pub fn new(column: usize, op: Operator, value: Value) -> Self {
        Self { column, op, value }
    }

    pub fn matches(&self, record: &Record) -> bool {
        record
            .values
            .get(self.column)
            .and_then(|stored| compare_values(stored, &self.value))
            .is_some_and(|ordering| self.op.matches(ordering))
    }
}

/// Evaluate an optional predicate; `None` matches every record
pub fn matches(predicate: Option<&Predicate>, record: &Record) -> bool {
    predicate.map_or(true, |p| p.matches(record))
}
