//! Record Module
//!
//! Typed, nullable column values and their compact binary encoding.
//!
//! ## Responsibilities
//! - Column types and type tags (`DataType`)
//! - Values, literal parsing and display (`Value`)
//! - Record encoding with an inline type-tag header (`Record`)
//! - Typed comparison and WHERE predicates (`compare_values`, `Predicate`)

mod codec;
mod compare;
mod types;

pub use codec::{body_len, decode_body, decode_value, encode_body, encode_value, Record, RECORD_HEADER_SIZE};
pub use compare::{compare_values, matches, Operator, Predicate};
pub use types::{DataType, Value, TEXT_MAX_LEN, TEXT_TAG_BASE, YEAR_BASE};

/// Internal row identifier, unique and monotonic within a table
pub type RowId = u32;
