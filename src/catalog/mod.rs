//! Catalog Module
//!
//! Explicit catalog context: every table is created, opened and dropped
//! through a `Catalog`, which owns the configuration and the two catalog
//! tables describing all user tables.
//!
//! ## Responsibilities
//! - Create the catalog and user-data directories
//! - Bootstrap `argonbase_tables` / `argonbase_columns` on first run
//! - Resolve table schemas from the catalog tables
//! - Create, open and drop user tables
//!
//! ## Catalog Tables
//! ```text
//! argonbase_tables   (table_name TEXT PRI)
//! argonbase_columns  (table_name TEXT, column_name TEXT, data_type TEXT,
//!                     ordinal_position TINYINT, is_nullable TEXT,
//!                     column_key TEXT NULL)
//! ```
//! Both describe themselves, and both are read-only to table handles.
//! The catalog trees are opened per operation, so a `Catalog` never holds a
//! second handle on a file a `Table` may be writing.

mod schema;
mod table;

pub use schema::{ColumnDef, ColumnKey, TableSchema, MAX_IDENTIFIER_LEN};
pub use table::Table;

use std::fs;

use crate::config::Config;
use crate::error::Result;
use crate::record::{DataType, Record, RowId, Value};
use crate::tree::TableTree;
use crate::ArgonError;

use table::{index_path, table_path};

/// Catalog table listing every table
pub const TABLES_TABLE: &str = "argonbase_tables";

/// Catalog table listing every column of every table
pub const COLUMNS_TABLE: &str = "argonbase_columns";

/// Schema of `argonbase_tables`
pub fn tables_schema() -> TableSchema {
    TableSchema::new(
        TABLES_TABLE,
        vec![ColumnDef::new("table_name", DataType::Text).primary_key()],
    )
}

/// Schema of `argonbase_columns`
pub fn columns_schema() -> TableSchema {
    TableSchema::new(
        COLUMNS_TABLE,
        vec![
            ColumnDef::new("table_name", DataType::Text).not_null(),
            ColumnDef::new("column_name", DataType::Text).not_null(),
            ColumnDef::new("data_type", DataType::Text).not_null(),
            ColumnDef::new("ordinal_position", DataType::TinyInt).not_null(),
            ColumnDef::new("is_nullable", DataType::Text).not_null(),
            ColumnDef::new("column_key", DataType::Text),
        ],
    )
}

fn is_catalog_table(name: &str) -> bool {
    name == TABLES_TABLE || name == COLUMNS_TABLE
}

/// Table names are case-insensitive and stored lowercase
fn normalize(name: &str) -> String {
    name.to_ascii_lowercase()
}

fn text_at(record: &Record, position: usize) -> Result<&str> {
    match record.values.get(position) {
        Some(Value::Text(text)) => Ok(text),
        other => Err(ArgonError::Corruption(format!(
            "Catalog row {} has {:?} where text was expected",
            record.row_id, other
        ))),
    }
}

// =============================================================================
// Catalog
// =============================================================================

pub struct Catalog {
    config: Config,
}

impl Catalog {
    /// Open the catalog under `config.data_dir`, bootstrapping it if needed
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(config.catalog_dir())?;
        fs::create_dir_all(config.user_data_dir())?;

        let catalog = Self { config };
        catalog.bootstrap()?;

        tracing::info!(data_dir = %catalog.config.data_dir.display(), "catalog opened");
        Ok(catalog)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create any missing catalog table, seeded with rows describing both
    /// catalog tables
    fn bootstrap(&self) -> Result<()> {
        let dir = self.config.catalog_dir();
        let sync = self.config.sync_on_write;
        let schemas = [tables_schema(), columns_schema()];

        let tables_path = table_path(&dir, TABLES_TABLE);
        if !tables_path.exists() {
            let mut tree = TableTree::create(&tables_path, sync)?;
            for schema in &schemas {
                tree.insert(vec![Value::text(schema.name.as_str())?])?;
            }
            tracing::info!(path = %tables_path.display(), "catalog table created");
        }

        let columns_path = table_path(&dir, COLUMNS_TABLE);
        if !columns_path.exists() {
            let mut tree = TableTree::create(&columns_path, sync)?;
            for schema in &schemas {
                for row in Self::column_rows(schema)? {
                    tree.insert(row)?;
                }
            }
            tracing::info!(path = %columns_path.display(), "catalog table created");
        }
        Ok(())
    }

    /// `argonbase_columns` rows for a schema
    fn column_rows(schema: &TableSchema) -> Result<Vec<Vec<Value>>> {
        let mut rows = Vec::with_capacity(schema.columns.len());
        for (i, column) in schema.columns.iter().enumerate() {
            rows.push(vec![
                Value::text(schema.name.as_str())?,
                Value::text(column.name.as_str())?,
                Value::text(column.data_type.name())?,
                Value::TinyInt((i + 1) as i8),
                Value::text(if column.nullable { "YES" } else { "NO" })?,
                match column.key {
                    Some(key) => Value::text(key.as_str())?,
                    None => Value::Null,
                },
            ]);
        }
        Ok(rows)
    }

    fn tables_tree(&self) -> Result<TableTree> {
        TableTree::open(
            &table_path(&self.config.catalog_dir(), TABLES_TABLE),
            self.config.sync_on_write,
        )
    }

    fn columns_tree(&self) -> Result<TableTree> {
        TableTree::open(
            &table_path(&self.config.catalog_dir(), COLUMNS_TABLE),
            self.config.sync_on_write,
        )
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Every table name in creation order, catalog tables included
    pub fn table_names(&self) -> Result<Vec<String>> {
        let tree = self.tables_tree()?;
        let mut names = Vec::new();
        for record in tree.scan() {
            names.push(text_at(&record?, 0)?.to_string());
        }
        Ok(names)
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let name = normalize(name);
        Ok(self.table_names()?.contains(&name))
    }

    /// Load a table's schema from `argonbase_columns`
    pub fn schema(&self, name: &str) -> Result<TableSchema> {
        let name = normalize(name);
        if !self.table_exists(&name)? {
            return Err(ArgonError::TableNotFound(name));
        }

        let mut rows: Vec<(i8, ColumnDef)> = Vec::new();
        for record in self.columns_tree()?.scan() {
            let record = record?;
            if text_at(&record, 0)? != name {
                continue;
            }

            let data_type: DataType = text_at(&record, 2)?.parse()?;
            let ordinal = match record.values.get(3) {
                Some(Value::TinyInt(ordinal)) => *ordinal,
                other => {
                    return Err(ArgonError::Corruption(format!(
                        "Catalog row {} has ordinal position {:?}",
                        record.row_id, other
                    )))
                }
            };
            let key = match record.values.get(5) {
                Some(Value::Text(key)) => ColumnKey::from_catalog(key),
                _ => None,
            };
            rows.push((
                ordinal,
                ColumnDef {
                    name: text_at(&record, 1)?.to_string(),
                    data_type,
                    nullable: text_at(&record, 4)?.eq_ignore_ascii_case("YES"),
                    key,
                },
            ));
        }

        if rows.is_empty() {
            return Err(ArgonError::Corruption(format!("Table '{}' has no columns", name)));
        }
        rows.sort_by_key(|(ordinal, _)| *ordinal);
        Ok(TableSchema::new(name, rows.into_iter().map(|(_, column)| column).collect()))
    }

    // -------------------------------------------------------------------------
    // Table Lifecycle
    // -------------------------------------------------------------------------

    /// Create a user table; PRI and UNI columns are indexed immediately
    pub fn create_table(&self, name: &str, columns: Vec<ColumnDef>) -> Result<Table> {
        let schema = TableSchema::new(normalize(name), columns);
        schema.validate()?;
        if is_catalog_table(&schema.name) || self.table_exists(&schema.name)? {
            return Err(ArgonError::TableExists(schema.name));
        }

        // every catalog row must fit before any file is created
        let table_row = vec![Value::text(schema.name.as_str())?];
        let rows = Self::column_rows(&schema)?;
        for row in std::iter::once(&table_row).chain(&rows) {
            Table::check_record_size(&Record::new(0, row.clone()))?;
        }

        let table = Table::create(&self.config.user_data_dir(), schema, self.config.sync_on_write)?;

        self.tables_tree()?.insert(table_row)?;
        let mut columns_tree = self.columns_tree()?;
        for row in rows {
            columns_tree.insert(row)?;
        }
        Ok(table)
    }

    /// Open a table by name; catalog tables open read-only
    pub fn open_table(&self, name: &str) -> Result<Table> {
        let name = normalize(name);
        let sync = self.config.sync_on_write;
        if name == TABLES_TABLE {
            return Table::open(&self.config.catalog_dir(), tables_schema(), sync, true);
        }
        if name == COLUMNS_TABLE {
            return Table::open(&self.config.catalog_dir(), columns_schema(), sync, true);
        }

        let schema = self.schema(&name)?;
        Table::open(&self.config.user_data_dir(), schema, sync, false)
    }

    /// Drop a user table: catalog rows, table file and index files
    pub fn drop_table(&self, name: &str) -> Result<()> {
        let name = normalize(name);
        if is_catalog_table(&name) {
            return Err(ArgonError::ReadOnly(name));
        }
        let table = self.open_table(&name)?;

        for mut tree in [self.tables_tree()?, self.columns_tree()?] {
            let mut doomed: Vec<RowId> = Vec::new();
            for record in tree.scan() {
                let record = record?;
                if text_at(&record, 0)? == name {
                    doomed.push(record.row_id);
                }
            }
            for row_id in doomed {
                tree.delete(row_id)?;
            }
        }
        table.remove_files()?;

        tracing::info!(table = %name, "table dropped");
        Ok(())
    }

    /// Path of the index file for `table.column` in the user-data directory
    pub fn index_file(&self, table: &str, column: &str) -> std::path::PathBuf {
        index_path(&self.config.user_data_dir(), &normalize(table), column)
    }
}
