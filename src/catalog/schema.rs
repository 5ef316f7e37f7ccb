//! Table and column definitions
//!
//! A `TableSchema` is what the two catalog tables store about a user table:
//! one row in `argonbase_tables` and one row per column in
//! `argonbase_columns`.

use std::fmt;

use crate::error::Result;
use crate::record::{DataType, Value};
use crate::ArgonError;

/// Key constraint of a column, stored as `PRI` / `UNI` in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKey {
    Primary,
    Unique,
}

impl ColumnKey {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnKey::Primary => "PRI",
            ColumnKey::Unique => "UNI",
        }
    }

    pub fn from_catalog(text: &str) -> Option<Self> {
        match text {
            "PRI" => Some(ColumnKey::Primary),
            "UNI" => Some(ColumnKey::Unique),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Column Definition
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub key: Option<ColumnKey>,
}

impl ColumnDef {
    /// A nullable column without key constraints
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            key: None,
        }
    }

    /// Primary key columns are unique and never NULL
    pub fn primary_key(mut self) -> Self {
        self.key = Some(ColumnKey::Primary);
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        if self.key.is_none() {
            self.key = Some(ColumnKey::Unique);
        }
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Primary and unique columns get an index at table creation
    pub fn is_keyed(&self) -> bool {
        self.key.is_some()
    }
}

// =============================================================================
// Table Schema
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Position of a column (case-insensitive)
    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(column))
            .ok_or_else(|| ArgonError::ColumnNotFound {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    pub fn column(&self, column: &str) -> Result<&ColumnDef> {
        Ok(&self.columns[self.column_index(column)?])
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Reject names that cannot be used as file names or statement tokens,
    /// duplicate columns and more than one primary key
    pub fn validate(&self) -> Result<()> {
        check_identifier(&self.name)?;
        if self.columns.is_empty() {
            return Err(ArgonError::Parse(format!(
                "Table '{}' must have at least one column",
                self.name
            )));
        }
        // ordinal positions are stored as TINYINT
        if self.columns.len() > i8::MAX as usize {
            return Err(ArgonError::Parse(format!(
                "Table '{}' has more than {} columns",
                self.name,
                i8::MAX
            )));
        }

        for (i, column) in self.columns.iter().enumerate() {
            check_identifier(&column.name)?;
            if column.data_type == DataType::Null {
                return Err(ArgonError::Parse(format!(
                    "Column '{}' cannot be declared NULL",
                    column.name
                )));
            }
            if self.columns[..i]
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&column.name))
            {
                return Err(ArgonError::Parse(format!("Duplicate column '{}'", column.name)));
            }
        }

        let primaries = self
            .columns
            .iter()
            .filter(|c| c.key == Some(ColumnKey::Primary))
            .count();
        if primaries > 1 {
            return Err(ArgonError::Parse(format!(
                "Table '{}' declares {} primary keys",
                self.name, primaries
            )));
        }
        Ok(())
    }

    /// Type-check a full row against the declared columns
    pub fn check_row(&self, values: &[Value]) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(ArgonError::ValueParse(format!(
                "Table '{}' has {} columns, {} values given",
                self.name,
                self.columns.len(),
                values.len()
            )));
        }
        for (column, value) in self.columns.iter().zip(values) {
            column.check_value(value)?;
        }
        Ok(())
    }
}

impl ColumnDef {
    /// NULL and type checks for one value
    pub fn check_value(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            if !self.nullable {
                return Err(ArgonError::NullViolation(self.name.clone()));
            }
            return Ok(());
        }
        if value.data_type() != self.data_type {
            return Err(ArgonError::TypeMismatch {
                column: self.name.clone(),
                expected: self.data_type.to_string(),
                found: value.data_type().to_string(),
            });
        }
        Ok(())
    }
}

/// Longest table or column name; keeps every catalog row within one cell
pub const MAX_IDENTIFIER_LEN: usize = 64;

fn check_identifier(name: &str) -> Result<()> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(ArgonError::Parse(format!("Invalid identifier '{}'", name)));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(ArgonError::Parse(format!(
            "Identifier '{}' is longer than {} characters",
            name, MAX_IDENTIFIER_LEN
        )));
    }
    Ok(())
}
