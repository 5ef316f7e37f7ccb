//! Command Module
//!
//! The statement layer of the `argonsql` shell.
//!
//! ## Responsibilities
//! - Tokenize and parse statements (`parser.rs`)
//! - Run them against a `Catalog` (`executor.rs`)
//! - Render query results as aligned text tables (`format.rs`)
//!
//! ## Flow
//! ```text
//!   "SELECT * FROM t WHERE id = 5;"
//!        │ parse
//!        ▼
//!   Statement::Select { table, columns, condition }
//!        │ Session::run
//!        ▼
//!   Catalog::open_table ──► Table::search(Predicate)
//!        │
//!        ▼
//!   Output::Rows(ResultSet)
//! ```

mod executor;
mod format;
mod parser;

pub use executor::{Output, Session};
pub use format::ResultSet;
pub use parser::{parse, split_statements, tokenize, Condition, Literal, Statement, Token};
