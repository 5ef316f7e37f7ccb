//! Statement tokenizer and parser
//!
//! Keywords are case-insensitive. A literal is any run of characters other
//! than whitespace, quotes and `( ) , ; * = < > !`, so dates (`2024-01-31`),
//! times (`12:30:00`) and negative numbers need no quoting. Quoted literals
//! use single or double quotes, with a doubled quote as escape.

use crate::catalog::ColumnDef;
use crate::error::Result;
use crate::record::{DataType, Operator, Value};
use crate::ArgonError;

// =============================================================================
// Statements
// =============================================================================

/// A literal as written: quoted literals are always text
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub text: String,
    pub quoted: bool,
}

impl Literal {
    pub fn bare(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: false,
        }
    }

    pub fn quoted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: true,
        }
    }

    /// Convert to a value of the given column type
    pub fn to_value(&self, data_type: DataType) -> Result<Value> {
        match (self.quoted, data_type) {
            (true, DataType::Text) => Value::text(self.text.as_str()),
            _ => Value::parse(&self.text, data_type),
        }
    }
}

/// `[NOT] column <op> literal`, with `NOT` already folded into the operator
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: Operator,
    pub value: Literal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    ShowTables,
    CreateTable {
        table: String,
        columns: Vec<ColumnDef>,
    },
    CreateIndex {
        table: String,
        column: String,
    },
    Insert {
        table: String,
        /// Explicit column list; `None` means every column in order
        columns: Option<Vec<String>>,
        values: Vec<Literal>,
    },
    Select {
        table: String,
        /// Projected columns; `None` for `*`
        columns: Option<Vec<String>>,
        condition: Option<Condition>,
    },
    Update {
        table: String,
        column: String,
        value: Literal,
        condition: Option<Condition>,
    },
    Delete {
        table: String,
        condition: Option<Condition>,
    },
    DropTable {
        table: String,
    },
    Help,
    Version,
    Exit,
}

// =============================================================================
// Tokenizer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Keyword, identifier or unquoted literal
    Word(String),
    /// Contents of a quoted literal
    Quoted(String),
    Symbol(&'static str),
}

const SYMBOLS: [&str; 11] = ["<>", "!=", "<=", ">=", "=", "<", ">", "(", ")", ",", "*"];

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '\'' | '"' | '(' | ')' | ',' | ';' | '*' | '=' | '<' | '>' | '!')
}

/// Split one statement into tokens; a trailing `;` is dropped
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = input.trim();
    if let Some(stripped) = rest.strip_suffix(';') {
        rest = stripped;
    }

    while let Some(c) = rest.chars().next() {
        if c.is_whitespace() {
            rest = rest.trim_start();
            continue;
        }

        if c == '\'' || c == '"' {
            let (text, remaining) = read_quoted(rest, c)?;
            tokens.push(Token::Quoted(text));
            rest = remaining;
            continue;
        }

        if let Some(symbol) = SYMBOLS.iter().find(|s| rest.starts_with(**s)) {
            tokens.push(Token::Symbol(*symbol));
            rest = &rest[symbol.len()..];
            continue;
        }

        let end = rest.find(|c: char| !is_word_char(c)).unwrap_or(rest.len());
        if end == 0 {
            return Err(ArgonError::Parse(format!("Unexpected character '{}'", c)));
        }
        tokens.push(Token::Word(rest[..end].to_string()));
        rest = &rest[end..];
    }
    Ok(tokens)
}

/// Read a quoted literal starting at `input[0] == quote`
fn read_quoted(input: &str, quote: char) -> Result<(String, &str)> {
    let mut text = String::new();
    let mut chars = input.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if c != quote {
            text.push(c);
            continue;
        }
        match chars.peek() {
            Some(&(_, next)) if next == quote => {
                text.push(quote);
                chars.next();
            }
            _ => return Ok((text, &input[i + c.len_utf8()..])),
        }
    }
    Err(ArgonError::Parse("Unterminated quoted literal".to_string()))
}

/// Split input into `;`-terminated statements (quotes respected)
///
/// Returns the complete statements and whatever follows the last `;`.
pub fn split_statements(input: &str) -> (Vec<String>, String) {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in input.chars() {
        current.push(c);
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, ';') => {
                let statement = current.trim();
                if statement != ";" {
                    statements.push(statement.to_string());
                }
                current.clear();
            }
            _ => {}
        }
    }
    (statements, current.trim().to_string())
}

// =============================================================================
// Parser
// =============================================================================

/// Parse one statement (the trailing `;` is optional)
pub fn parse(input: &str) -> Result<Statement> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
    };
    let statement = parser.statement()?;
    if let Some(token) = parser.peek() {
        return Err(ArgonError::Parse(format!("Unexpected {} after statement", describe(token))));
    }
    Ok(statement)
}

fn describe(token: &Token) -> String {
    match token {
        Token::Word(word) => format!("'{}'", word),
        Token::Quoted(text) => format!("'{}'", text),
        Token::Symbol(symbol) => format!("'{}'", symbol),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(word)) if word.eq_ignore_ascii_case(keyword))
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.check_keyword(keyword) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.consume_keyword(keyword) {
            return Ok(());
        }
        Err(self.unexpected(keyword))
    }

    fn consume_symbol(&mut self, symbol: &str) -> bool {
        if matches!(self.peek(), Some(Token::Symbol(s)) if *s == symbol) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<()> {
        if self.consume_symbol(symbol) {
            return Ok(());
        }
        Err(self.unexpected(&format!("'{}'", symbol)))
    }

    fn unexpected(&self, expected: &str) -> ArgonError {
        match self.peek() {
            Some(token) => ArgonError::Parse(format!("Expected {}, found {}", expected, describe(token))),
            None => ArgonError::Parse(format!("Expected {}, found end of statement", expected)),
        }
    }

    fn identifier(&mut self) -> Result<String> {
        match self.peek() {
            Some(Token::Word(word)) => {
                let word = word.clone();
                self.pos += 1;
                Ok(word)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn literal(&mut self) -> Result<Literal> {
        match self.next() {
            Some(Token::Word(word)) => Ok(Literal::bare(word)),
            Some(Token::Quoted(text)) => Ok(Literal::quoted(text)),
            _ => {
                self.pos -= 1;
                Err(self.unexpected("value"))
            }
        }
    }

    /// `( item, item, ... )`
    fn list<T>(&mut self, mut item: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        self.expect_symbol("(")?;
        let mut items = vec![item(self)?];
        while self.consume_symbol(",") {
            items.push(item(self)?);
        }
        self.expect_symbol(")")?;
        Ok(items)
    }

    // -------------------------------------------------------------------------
    // Statements
    // -------------------------------------------------------------------------

    fn statement(&mut self) -> Result<Statement> {
        let keyword = match self.next() {
            Some(Token::Word(word)) => word.to_ascii_uppercase(),
            Some(token) => return Err(ArgonError::Parse(format!("Unexpected {}", describe(&token)))),
            None => return Err(ArgonError::Parse("Empty statement".to_string())),
        };

        match keyword.as_str() {
            "SHOW" => {
                self.expect_keyword("TABLES")?;
                Ok(Statement::ShowTables)
            }
            "CREATE" => {
                if self.consume_keyword("TABLE") {
                    self.create_table()
                } else if self.consume_keyword("INDEX") {
                    self.create_index()
                } else {
                    Err(self.unexpected("TABLE or INDEX"))
                }
            }
            "INSERT" => self.insert(),
            "SELECT" => self.select(),
            "UPDATE" => self.update(),
            "DELETE" => {
                self.expect_keyword("FROM")?;
                let table = self.identifier()?;
                let condition = self.condition()?;
                Ok(Statement::Delete { table, condition })
            }
            "DROP" => {
                self.expect_keyword("TABLE")?;
                Ok(Statement::DropTable {
                    table: self.identifier()?,
                })
            }
            "HELP" => Ok(Statement::Help),
            "VERSION" => Ok(Statement::Version),
            "EXIT" | "QUIT" => Ok(Statement::Exit),
            other => Err(ArgonError::Parse(format!("Unknown command '{}'", other))),
        }
    }

    /// `CREATE TABLE t (col TYPE [constraints], ...)`
    fn create_table(&mut self) -> Result<Statement> {
        let table = self.identifier()?;
        let columns = self.list(Self::column_def)?;
        Ok(Statement::CreateTable { table, columns })
    }

    fn column_def(&mut self) -> Result<ColumnDef> {
        let name = self.identifier()?;
        let data_type: DataType = self.identifier()?.parse()?;
        let mut column = ColumnDef::new(name, data_type);

        loop {
            if self.consume_keyword("PRIMARY_KEY") {
                column = column.primary_key();
            } else if self.consume_keyword("PRIMARY") {
                self.expect_keyword("KEY")?;
                column = column.primary_key();
            } else if self.consume_keyword("UNIQUE") {
                column = column.unique();
            } else if self.consume_keyword("NOT_NULL") {
                column = column.not_null();
            } else if self.consume_keyword("NOT") {
                self.expect_keyword("NULL")?;
                column = column.not_null();
            } else if self.consume_keyword("NULL") {
                // explicit nullable; the default
            } else {
                return Ok(column);
            }
        }
    }

    /// `CREATE INDEX ON t (col)`
    fn create_index(&mut self) -> Result<Statement> {
        self.expect_keyword("ON")?;
        let table = self.identifier()?;
        let mut columns = self.list(Self::identifier)?;
        if columns.len() != 1 {
            return Err(ArgonError::Parse("An index covers exactly one column".to_string()));
        }
        Ok(Statement::CreateIndex {
            table,
            column: columns.remove(0),
        })
    }

    /// `INSERT INTO t [(cols)] VALUES (values)`
    fn insert(&mut self) -> Result<Statement> {
        self.expect_keyword("INTO")?;
        let table = self.identifier()?;
        let columns = if matches!(self.peek(), Some(Token::Symbol("("))) {
            Some(self.list(Self::identifier)?)
        } else {
            None
        };
        self.expect_keyword("VALUES")?;
        let values = self.list(Self::literal)?;
        Ok(Statement::Insert {
            table,
            columns,
            values,
        })
    }

    /// `SELECT * | cols FROM t [WHERE ...]`
    fn select(&mut self) -> Result<Statement> {
        let columns = if self.consume_symbol("*") {
            None
        } else {
            let mut columns = vec![self.identifier()?];
            while self.consume_symbol(",") {
                columns.push(self.identifier()?);
            }
            Some(columns)
        };
        self.expect_keyword("FROM")?;
        let table = self.identifier()?;
        let condition = self.condition()?;
        Ok(Statement::Select {
            table,
            columns,
            condition,
        })
    }

    /// `UPDATE t SET col = value [WHERE ...]`
    fn update(&mut self) -> Result<Statement> {
        let table = self.identifier()?;
        self.expect_keyword("SET")?;
        let column = self.identifier()?;
        self.expect_symbol("=")?;
        let value = self.literal()?;
        let condition = self.condition()?;
        Ok(Statement::Update {
            table,
            column,
            value,
            condition,
        })
    }

    /// Optional `WHERE [NOT] col op value`
    fn condition(&mut self) -> Result<Option<Condition>> {
        if !self.consume_keyword("WHERE") {
            return Ok(None);
        }
        let negated = self.consume_keyword("NOT");
        let column = self.identifier()?;
        let op: Operator = match self.next() {
            Some(Token::Symbol(symbol)) => symbol.parse()?,
            _ => {
                self.pos -= 1;
                return Err(self.unexpected("comparison operator"));
            }
        };
        let value = self.literal()?;
        Ok(Some(Condition {
            column,
            op: if negated { op.negate() } else { op },
            value,
        }))
    }
}
