//! Storage Module
//!
//! Page Store: a file of fixed-size pages with slotted-cell semantics,
//! independent of what the cells mean. Used by both the table tree and the
//! index tree.
//!
//! ## Responsibilities
//! - Page header and cell pointer array management
//! - Intra-page content shifting (`Page::cell_shift`)
//! - Page allocation and deletion through a free list
//! - Root discovery by walking parent pointers
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header block (512 bytes)                                │
//! │   Magic: "ARGN" (4) | Version: u16 (2) | PageSize (2)   │
//! │   FreeHead: u32 (4) | Watermark: u32 (4) | CRC32 (4)    │
//! │   zero padding                                          │
//! ├─────────────────────────────────────────────────────────┤
//! │ Page 0 (512 bytes) - always the leftmost leaf           │
//! ├─────────────────────────────────────────────────────────┤
//! │ Page 1 ... Page N-1                                     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//! All integers are big-endian.

mod file;
mod page;

pub use file::PageFile;
pub use page::{
    Page, PageId, PageLink, PageType, CELL_POINTER_SIZE, NO_PAGE, PAGE_HEADER_SIZE, PAGE_SIZE,
};

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes identifying an ArgonBase page file
pub(crate) const MAGIC: &[u8; 4] = b"ARGN";

/// Current page file format version
pub(crate) const FORMAT_VERSION: u16 = 1;

/// The header block occupies one page-sized slot so pages stay aligned
pub const FILE_HEADER_SIZE: usize = PAGE_SIZE;
