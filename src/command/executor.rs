//! Statement execution against a catalog

use std::fmt;

use crate::catalog::{Catalog, Table, MAX_IDENTIFIER_LEN, TABLES_TABLE};
use crate::config::Config;
use crate::error::Result;
use crate::record::{DataType, Predicate, Value};
use crate::tree::{row_id_capacity, MAX_INDEXED_TEXT, MAX_RECORD_CELL};
use crate::ArgonError;

use super::format::ResultSet;
use super::parser::{parse, Condition, Literal, Statement};

const HELP: &str = "\
Statements end with ';'. Keywords are case-insensitive.

  SHOW TABLES;
  CREATE TABLE t (col TYPE [PRIMARY_KEY] [UNIQUE] [NOT_NULL], ...);
  CREATE INDEX ON t (col);
  INSERT INTO t [(col, ...)] VALUES (value, ...);
  SELECT * | col, ... FROM t [WHERE [NOT] col op value];
  UPDATE t SET col = value [WHERE [NOT] col op value];
  DELETE FROM t [WHERE [NOT] col op value];
  DROP TABLE t;
  VERSION;  HELP;  EXIT;

Types: TINYINT SMALLINT INT BIGINT FLOAT DOUBLE YEAR TIME DATE DATETIME TEXT
Operators: = <> != < <= > >=";

/// Statement summary followed by the storage limits
fn help_text() -> String {
    format!(
        "{}\n\n\
         Limits:\n  \
         A stored row is at most {} bytes; names are at most {} characters.\n  \
         Indexed columns (PRIMARY_KEY, UNIQUE, CREATE INDEX) keep one entry per value:\n  \
         at most {} rows may share one INT value ({} for BIGINT), and an\n  \
         indexed TEXT value is at most {} bytes.",
        HELP,
        MAX_RECORD_CELL,
        MAX_IDENTIFIER_LEN,
        row_id_capacity(DataType::Int.fixed_size().unwrap_or(4)),
        row_id_capacity(DataType::BigInt.fixed_size().unwrap_or(8)),
        MAX_INDEXED_TEXT,
    )
}

/// Result of one statement
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Rows(ResultSet),
    Message(String),
    Exit,
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Rows(rows) => write!(f, "{}", rows),
            Output::Message(message) => f.write_str(message),
            Output::Exit => f.write_str("Bye."),
        }
    }
}

fn plural(count: usize, noun: &str) -> String {
    match count {
        1 => format!("1 {}", noun),
        n => format!("{} {}s", n, noun),
    }
}

// =============================================================================
// Session
// =============================================================================

/// One shell session: parses and runs statements against a catalog
pub struct Session {
    catalog: Catalog,
}

impl Session {
    pub fn open(config: Config) -> Result<Self> {
        Ok(Self::new(Catalog::open(config)?))
    }

    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Parse and run one statement
    pub fn execute(&mut self, input: &str) -> Result<Output> {
        let statement = parse(input)?;
        tracing::debug!(?statement, "executing");
        self.run(statement)
    }

    pub fn run(&mut self, statement: Statement) -> Result<Output> {
        match statement {
            Statement::ShowTables => self.show_tables(),
            Statement::CreateTable { table, columns } => {
                let table = self.catalog.create_table(&table, columns)?;
                Ok(Output::Message(format!("Table '{}' created.", table.name())))
            }
            Statement::CreateIndex { table, column } => {
                let mut table = self.catalog.open_table(&table)?;
                let message = if table.create_index(&column)? {
                    format!("Index created on {} ({}).", table.name(), column)
                } else {
                    format!("Index on {} ({}) already exists.", table.name(), column)
                };
                Ok(Output::Message(message))
            }
            Statement::Insert {
                table,
                columns,
                values,
            } => self.insert(&table, columns, values),
            Statement::Select {
                table,
                columns,
                condition,
            } => self.select(&table, columns, condition),
            Statement::Update {
                table,
                column,
                value,
                condition,
            } => {
                let mut table = self.catalog.open_table(&table)?;
                let predicate = predicate(&table, condition.as_ref())?;
                let data_type = table.schema().column(&column)?.data_type;
                let value = value.to_value(data_type)?;
                let count = table.update(&column, value, predicate.as_ref())?;
                Ok(Output::Message(format!("{} updated.", plural(count, "row"))))
            }
            Statement::Delete { table, condition } => {
                let mut table = self.catalog.open_table(&table)?;
                let predicate = predicate(&table, condition.as_ref())?;
                let count = table.delete(predicate.as_ref())?;
                Ok(Output::Message(format!("{} deleted.", plural(count, "row"))))
            }
            Statement::DropTable { table } => {
                self.catalog.drop_table(&table)?;
                Ok(Output::Message(format!("Table '{}' dropped.", table)))
            }
            Statement::Help => Ok(Output::Message(help_text())),
            Statement::Version => Ok(Output::Message(format!("ArgonBase v{}", crate::VERSION))),
            Statement::Exit => Ok(Output::Exit),
        }
    }

    fn show_tables(&self) -> Result<Output> {
        let table = self.catalog.open_table(TABLES_TABLE)?;
        let mut result = ResultSet::new(vec!["table_name".to_string()]);
        for record in table.search(None)? {
            result.push_record(&record, &[0]);
        }
        Ok(Output::Rows(result))
    }

    fn insert(&mut self, table: &str, columns: Option<Vec<String>>, literals: Vec<Literal>) -> Result<Output> {
        let mut table = self.catalog.open_table(table)?;
        let schema = table.schema();

        let row_id = match columns {
            Some(columns) => {
                if columns.len() != literals.len() {
                    return Err(ArgonError::ValueParse(format!(
                        "{} columns named, {} values given",
                        columns.len(),
                        literals.len()
                    )));
                }
                let mut values = Vec::with_capacity(literals.len());
                for (column, literal) in columns.iter().zip(&literals) {
                    values.push(literal.to_value(schema.column(column)?.data_type)?);
                }
                let names: Vec<&str> = columns.iter().map(String::as_str).collect();
                table.insert_columns(&names, values)?
            }
            None => {
                if literals.len() != schema.columns.len() {
                    return Err(ArgonError::ValueParse(format!(
                        "Table '{}' has {} columns, {} values given",
                        schema.name,
                        schema.columns.len(),
                        literals.len()
                    )));
                }
                let values = schema
                    .columns
                    .iter()
                    .zip(&literals)
                    .map(|(column, literal)| literal.to_value(column.data_type))
                    .collect::<Result<Vec<Value>>>()?;
                table.insert(values)?
            }
        };

        tracing::trace!(table = %table.name(), row_id, "insert statement");
        Ok(Output::Message("1 row inserted.".to_string()))
    }

    fn select(&self, table: &str, columns: Option<Vec<String>>, condition: Option<Condition>) -> Result<Output> {
        let table = self.catalog.open_table(table)?;
        let schema = table.schema();

        let positions: Vec<usize> = match &columns {
            Some(columns) => columns
                .iter()
                .map(|column| schema.column_index(column))
                .collect::<Result<_>>()?,
            None => (0..schema.columns.len()).collect(),
        };
        let headers = positions.iter().map(|&i| schema.columns[i].name.clone()).collect();

        let predicate = predicate(&table, condition.as_ref())?;
        let mut result = ResultSet::new(headers);
        for record in table.search(predicate.as_ref())? {
            result.push_record(&record, &positions);
        }
        Ok(Output::Rows(result))
    }
}

/// Resolve a parsed condition against a table's schema
fn predicate(table: &Table, condition: Option<&Condition>) -> Result<Option<Predicate>> {
    let condition = match condition {
        Some(condition) => condition,
        None => return Ok(None),
    };
    let position = table.schema().column_index(&condition.column)?;
    let value = condition
        .value
        .to_value(table.schema().columns[position].data_type)?;
    Ok(Some(Predicate::new(position, condition.op, value)))
}
