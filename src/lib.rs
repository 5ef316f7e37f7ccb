//! # ArgonBase
//!
//! A single-file, page-oriented storage engine with:
//! - Fixed 512-byte pages with slotted cells and a free-page list
//! - A B+-tree per table, clustering records by row id
//! - B-tree secondary indexes mapping column values to row ids
//! - A small catalog and SQL-like shell on top
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  argonsql shell (command)                   │
//! │              parse ──► Session::run ──► format              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Catalog / Table                        │
//! │        schemas, constraint checks, index maintenance        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  TableTree  │          │  IndexTree  │
//!   │ (B+, rowid) │          │ (B, value)  │
//!   └──────┬──────┘          └──────┬──────┘
//!          │      Record Codec      │
//!          └────────────┬───────────┘
//!                       ▼
//!                ┌─────────────┐
//!                │  PageFile   │
//!                │ (512B pages)│
//!                └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod storage;
pub mod record;
pub mod tree;
pub mod catalog;
pub mod command;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use catalog::{Catalog, ColumnDef, ColumnKey, Table, TableSchema};
pub use command::{Output, Session};
pub use config::Config;
pub use error::{ArgonError, Result};
pub use record::{DataType, Operator, Predicate, Record, RowId, Value};
pub use tree::{IndexTree, TableTree};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of ArgonBase
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
