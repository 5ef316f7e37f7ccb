//! Table handle
//!
//! Drives one table tree plus the index trees of its indexed columns.
//!
//! ## Responsibilities
//! - Check NULL, type, key and capacity constraints before any page changes
//! - Keep every index in step with the table on insert, update and delete
//! - Answer predicates through an index when the column has one, otherwise
//!   by a full scan
//!
//! ## Files
//! ```text
//! <dir>/<table>.tbl            table tree
//! <dir>/<table>.<column>.ndx   one index tree per indexed column
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::record::{compare_values, Operator, Predicate, Record, RowId, Value};
use crate::tree::{IndexEntry, IndexTree, TableTree, MAX_RECORD_CELL};
use crate::ArgonError;

use super::schema::{ColumnDef, TableSchema};
use super::Catalog;

/// Path of a table file
pub(crate) fn table_path(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{}.tbl", table))
}

/// Path of the index file for one column
pub(crate) fn index_path(dir: &Path, table: &str, column: &str) -> PathBuf {
    dir.join(format!("{}.{}.ndx", table, column))
}

// =============================================================================
// Table
// =============================================================================

/// An open table: schema, record tree and secondary indexes
pub struct Table {
    schema: TableSchema,
    tree: TableTree,
    /// Column position -> index on that column
    indexes: BTreeMap<usize, IndexTree>,
    dir: PathBuf,
    sync_on_write: bool,
    read_only: bool,
}

impl Table {
    /// Create the table file and an index for every PRI / UNI column
    pub(crate) fn create(dir: &Path, schema: TableSchema, sync_on_write: bool) -> Result<Self> {
        let tree = TableTree::create(&table_path(dir, &schema.name), sync_on_write)?;

        let mut indexes = BTreeMap::new();
        for (position, column) in schema.columns.iter().enumerate() {
            if column.is_keyed() {
                let path = index_path(dir, &schema.name, &column.name);
                indexes.insert(position, IndexTree::create(&path, sync_on_write)?);
            }
        }

        tracing::info!(table = %schema.name, indexes = indexes.len(), "table created");
        Ok(Self {
            schema,
            tree,
            indexes,
            dir: dir.to_path_buf(),
            sync_on_write,
            read_only: false,
        })
    }

    /// Open an existing table; indexes are found by their file names
    pub(crate) fn open(dir: &Path, schema: TableSchema, sync_on_write: bool, read_only: bool) -> Result<Self> {
        let path = table_path(dir, &schema.name);
        if !path.exists() {
            return Err(ArgonError::Storage(format!(
                "Table file {} is missing",
                path.display()
            )));
        }
        let tree = TableTree::open(&path, sync_on_write)?;

        let mut indexes = BTreeMap::new();
        for (position, column) in schema.columns.iter().enumerate() {
            let path = index_path(dir, &schema.name, &column.name);
            if path.exists() {
                indexes.insert(position, IndexTree::open(&path, sync_on_write)?);
            }
        }

        Ok(Self {
            schema,
            tree,
            indexes,
            dir: dir.to_path_buf(),
            sync_on_write,
            read_only,
        })
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn tree(&self) -> &TableTree {
        &self.tree
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Index on `column`, if one exists
    pub fn index(&self, column: &str) -> Result<Option<&IndexTree>> {
        let position = self.schema.column_index(column)?;
        Ok(self.indexes.get(&position))
    }

    /// Names of the indexed columns in declaration order
    pub fn indexed_columns(&self) -> Vec<&str> {
        self.indexes
            .keys()
            .map(|&position| self.schema.columns[position].name.as_str())
            .collect()
    }

    pub fn record_count(&self) -> Result<usize> {
        self.tree.record_count()
    }

    /// Parse a literal as a value of `column`'s declared type
    pub fn parse_value(&self, column: &str, literal: &str) -> Result<Value> {
        Value::parse(literal, self.schema.column(column)?.data_type)
    }

    /// Build `column <op> literal`, parsing the literal by the column's type
    pub fn predicate(&self, column: &str, op: Operator, literal: &str) -> Result<Predicate> {
        let position = self.schema.column_index(column)?;
        let value = Value::parse(literal, self.schema.columns[position].data_type)?;
        Ok(Predicate::new(position, op, value))
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(ArgonError::ReadOnly(self.schema.name.clone()));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Constraint Checks
    // -------------------------------------------------------------------------

    /// Fail with `DuplicateKey` if a row other than `exclude` holds `value`
    /// in key column `position`
    fn check_unique(&self, position: usize, value: &Value, exclude: Option<RowId>) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }

        let holders: Vec<RowId> = match self.indexes.get(&position) {
            Some(index) => index.get(value)?.map(|entry| entry.row_ids).unwrap_or_default(),
            None => {
                let predicate = Predicate::new(position, Operator::Equal, value.clone());
                self.tree
                    .search(Some(&predicate))?
                    .into_iter()
                    .map(|record| record.row_id)
                    .collect()
            }
        };

        if holders.iter().any(|&row_id| Some(row_id) != exclude) {
            return Err(ArgonError::DuplicateKey {
                column: self.schema.columns[position].name.clone(),
                value: value.to_string(),
            });
        }
        Ok(())
    }

    /// Fail with `CellOverflow` if the record could not be stored
    pub(crate) fn check_record_size(record: &Record) -> Result<()> {
        let size = record.encode()?.len();
        if size > MAX_RECORD_CELL {
            return Err(ArgonError::CellOverflow {
                size,
                max: MAX_RECORD_CELL,
            });
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Insert
    // -------------------------------------------------------------------------

    /// Insert a full row and return its row id
    pub fn insert(&mut self, values: Vec<Value>) -> Result<RowId> {
        self.ensure_writable()?;
        self.schema.check_row(&values)?;

        for (position, column) in self.schema.columns.iter().enumerate() {
            if column.is_keyed() {
                self.check_unique(position, &values[position], None)?;
            }
        }

        let row_id = self.tree.next_row_id()?;
        let record = Record::new(row_id, values);
        Self::check_record_size(&record)?;
        for (&position, index) in &self.indexes {
            index.check_capacity(&record.values[position], row_id)?;
        }

        self.tree.insert_record(&record)?;
        for (&position, index) in self.indexes.iter_mut() {
            let value = &record.values[position];
            if !value.is_null() {
                index.add_row_id(value, row_id)?;
            }
        }

        tracing::trace!(table = %self.schema.name, row_id, "row inserted");
        Ok(row_id)
    }

    /// Insert values for the named columns; every other column is NULL
    pub fn insert_columns(&mut self, columns: &[&str], values: Vec<Value>) -> Result<RowId> {
        if columns.len() != values.len() {
            return Err(ArgonError::ValueParse(format!(
                "{} columns named, {} values given",
                columns.len(),
                values.len()
            )));
        }

        let mut row = vec![Value::Null; self.schema.columns.len()];
        let mut assigned = vec![false; row.len()];
        for (column, value) in columns.iter().zip(values) {
            let position = self.schema.column_index(column)?;
            if assigned[position] {
                return Err(ArgonError::ValueParse(format!(
                    "Column '{}' given more than once",
                    column
                )));
            }
            assigned[position] = true;
            row[position] = value;
        }
        self.insert(row)
    }

    // -------------------------------------------------------------------------
    // Search
    // -------------------------------------------------------------------------

    /// Records matching `predicate` in row-id order (all records for `None`)
    pub fn search(&self, predicate: Option<&Predicate>) -> Result<Vec<Record>> {
        let predicate = match predicate {
            Some(predicate) => predicate,
            None => return self.tree.search(None),
        };

        match self.indexes.get(&predicate.column) {
            Some(index) => {
                let mut records = Vec::new();
                for row_id in index.search(predicate.op, &predicate.value)? {
                    let record = self.tree.get(row_id)?.ok_or_else(|| {
                        ArgonError::Corruption(format!(
                            "Index on {}.{} refers to missing row {}",
                            self.schema.name, self.schema.columns[predicate.column].name, row_id
                        ))
                    })?;
                    records.push(record);
                }
                Ok(records)
            }
            None => self.tree.search(Some(predicate)),
        }
    }

    // -------------------------------------------------------------------------
    // Delete
    // -------------------------------------------------------------------------

    /// Delete every matching record; returns how many were removed
    pub fn delete(&mut self, predicate: Option<&Predicate>) -> Result<usize> {
        self.ensure_writable()?;
        let records = self.search(predicate)?;

        for record in &records {
            self.tree.delete(record.row_id)?;
            for (&position, index) in self.indexes.iter_mut() {
                let value = &record.values[position];
                if !value.is_null() {
                    index.remove_row_id(value, record.row_id)?;
                }
            }
        }

        tracing::debug!(table = %self.schema.name, rows = records.len(), "rows deleted");
        Ok(records.len())
    }

    // -------------------------------------------------------------------------
    // Update
    // -------------------------------------------------------------------------

    /// Set `column` to `value` on every matching record; returns how many
    /// were updated
    pub fn update(&mut self, column: &str, value: Value, predicate: Option<&Predicate>) -> Result<usize> {
        self.ensure_writable()?;
        let position = self.schema.column_index(column)?;
        let definition: &ColumnDef = &self.schema.columns[position];
        definition.check_value(&value)?;

        let records = self.search(predicate)?;
        if records.is_empty() {
            return Ok(0);
        }

        if definition.is_keyed() && !value.is_null() {
            if records.len() > 1 {
                return Err(ArgonError::DuplicateKey {
                    column: definition.name.clone(),
                    value: value.to_string(),
                });
            }
            self.check_unique(position, &value, Some(records[0].row_id))?;
        }

        for record in &records {
            let mut updated = record.clone();
            updated.values[position] = value.clone();
            Self::check_record_size(&updated)?;
        }
        if let Some(index) = self.indexes.get(&position) {
            if !value.is_null() {
                let mut row_ids = index.get(&value)?.map(|entry| entry.row_ids).unwrap_or_default();
                row_ids.extend(records.iter().map(|record| record.row_id));
                IndexEntry::new(value.clone(), row_ids).check_capacity()?;
            }
        }

        for record in &records {
            let old = self.tree.update(record.row_id, position, value.clone())?;
            let unchanged = compare_values(&old, &value) == Some(std::cmp::Ordering::Equal);
            if let (Some(index), false) = (self.indexes.get_mut(&position), unchanged) {
                if !old.is_null() {
                    index.remove_row_id(&old, record.row_id)?;
                }
                if !value.is_null() {
                    index.add_row_id(&value, record.row_id)?;
                }
            }
        }

        tracing::debug!(table = %self.schema.name, column, rows = records.len(), "rows updated");
        Ok(records.len())
    }

    // -------------------------------------------------------------------------
    // Indexes
    // -------------------------------------------------------------------------

    /// Build an index on `column` from the current rows
    ///
    /// Returns false if the column was already indexed.
    pub fn create_index(&mut self, column: &str) -> Result<bool> {
        self.ensure_writable()?;
        let position = self.schema.column_index(column)?;
        if self.indexes.contains_key(&position) {
            return Ok(false);
        }

        let mut pairs = Vec::new();
        for record in self.tree.scan() {
            let mut record = record?;
            pairs.push((std::mem::replace(&mut record.values[position], Value::Null), record.row_id));
        }

        let name = &self.schema.columns[position].name;
        let path = index_path(&self.dir, &self.schema.name, name);
        let mut index = IndexTree::create(&path, self.sync_on_write)?;
        if let Err(e) = index.populate(pairs) {
            drop(index);
            fs::remove_file(&path)?;
            return Err(e);
        }

        tracing::info!(table = %self.schema.name, column = %name, "index created");
        self.indexes.insert(position, index);
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Drop
    // -------------------------------------------------------------------------

    /// Drop this table: its files and its catalog rows
    pub fn drop_table(self, catalog: &Catalog) -> Result<()> {
        let name = self.schema.name.clone();
        drop(self);
        catalog.drop_table(&name)
    }

    /// Close the table and delete its table and index files
    pub(crate) fn remove_files(self) -> Result<()> {
        let Table {
            schema,
            tree,
            indexes,
            dir,
            ..
        } = self;
        drop(tree);
        drop(indexes);

        fs::remove_file(table_path(&dir, &schema.name))?;
        for column in &schema.columns {
            let path = index_path(&dir, &schema.name, &column.name);
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}
