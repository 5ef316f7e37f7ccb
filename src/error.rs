//! Error types for ArgonBase
//!
//! Provides a unified error type for all operations, from page I/O up to
//! the command shell.

use thiserror::Error;

use crate::storage::PageId;

/// Result type alias using ArgonError
pub type Result<T> = std::result::Result<T, ArgonError>;

/// Unified error type for ArgonBase operations
#[derive(Debug, Error)]
pub enum ArgonError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Page Store Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid page: {0}")]
    InvalidPage(PageId),

    #[error("Page {page} overflow: needed {needed} bytes, {available} available")]
    PageOverflow {
        page: PageId,
        needed: usize,
        available: usize,
    },

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Codec error: {0}")]
    Codec(String),

    #[error("TEXT value of {len} bytes exceeds the maximum of {max}")]
    TextTooLong { len: usize, max: usize },

    #[error("Cell of {size} bytes exceeds the maximum of {max}")]
    CellOverflow { size: usize, max: usize },

    // -------------------------------------------------------------------------
    // Tree Errors
    // -------------------------------------------------------------------------
    #[error("Row id {0} not found")]
    RowNotFound(u32),

    #[error("Value {0} not found in index")]
    ValueNotFound(String),

    #[error("Row id {row_id} not present in index cell for {value}")]
    RowIdNotInCell { row_id: u32, value: String },

    #[error("Index cell for {0} still holds row ids")]
    CellNotEmpty(String),

    // -------------------------------------------------------------------------
    // Schema / Constraint Errors
    // -------------------------------------------------------------------------
    #[error("Table '{0}' does not exist")]
    TableNotFound(String),

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Column '{column}' does not exist in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    #[error("Duplicate value {value} for key column '{column}'")]
    DuplicateKey { column: String, value: String },

    #[error("Column '{0}' cannot be NULL")]
    NullViolation(String),

    #[error("Column '{column}' expects {expected}, got {found}")]
    TypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    #[error("Invalid value: {0}")]
    ValueParse(String),

    #[error("Table '{0}' is read-only")]
    ReadOnly(String),

    // -------------------------------------------------------------------------
    // Command Errors
    // -------------------------------------------------------------------------
    #[error("Syntax error: {0}")]
    Parse(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
