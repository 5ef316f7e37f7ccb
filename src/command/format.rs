//! Aligned text tables for query results
//!
//! ```text
//! +----+-------+
//! | id | name  |
//! +----+-------+
//! | 1  | alice |
//! +----+-------+
//! 1 row
//! ```

use std::fmt;

use crate::record::Record;

/// Rows of a query, already rendered as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append the values at `positions` of a record
    pub fn push_record(&mut self, record: &Record, positions: &[usize]) {
        self.rows.push(
            positions
                .iter()
                .map(|&i| record.values.get(i).map(ToString::to_string).unwrap_or_default())
                .collect(),
        );
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }
        widths
    }
}

fn write_rule(f: &mut fmt::Formatter<'_>, widths: &[usize]) -> fmt::Result {
    for width in widths {
        write!(f, "+{}", "-".repeat(width + 2))?;
    }
    writeln!(f, "+")
}

fn write_row(f: &mut fmt::Formatter<'_>, widths: &[usize], cells: &[String]) -> fmt::Result {
    for (width, cell) in widths.iter().zip(cells) {
        write!(f, "| {:<width$} ", cell, width = *width)?;
    }
    writeln!(f, "|")
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.widths();
        write_rule(f, &widths)?;
        write_row(f, &widths, &self.columns)?;
        write_rule(f, &widths)?;
        for row in &self.rows {
            write_row(f, &widths, row)?;
        }
        write_rule(f, &widths)?;
        match self.rows.len() {
            1 => write!(f, "1 row"),
            n => write!(f, "{} rows", n),
        }
    }
}
