//! Index cells
//!
//! ```text
//! ┌────────────────────────┬─────────────┬───────┬─────┬───────┬──────────────┐
//! │ LeftChild: u32         │ Payload: u16│ N: u8 │ Tag │ Value │ RowIds: u32*N│
//! │ (interior pages only)  │             │       │     │       │ (ascending)  │
//! └────────────────────────┴─────────────┴───────┴─────┴───────┴──────────────┘
//! Payload = 2 + value width + 4 * N
//! ```

use bytes::{Buf, BufMut};

use crate::error::Result;
use crate::record::{decode_value, encode_value, RowId, Value};
use crate::storage::{Page, PageId, PageType};
use crate::ArgonError;

/// Largest index cell, child pointer included
pub const MAX_INDEX_CELL: usize = 160;

/// Row ids one cell can hold (the count is a single byte)
pub const MAX_ROW_IDS: usize = u8::MAX as usize;

/// Interior cell bytes other than the value and its row ids
const CELL_OVERHEAD: usize = 8;

/// Longest TEXT value an index can store, with a single row id
pub const MAX_INDEXED_TEXT: usize = MAX_INDEX_CELL - CELL_OVERHEAD - 4;

/// Row ids that fit in one cell for a value `value_width` bytes wide
pub const fn row_id_capacity(value_width: usize) -> usize {
    let room = MAX_INDEX_CELL.saturating_sub(CELL_OVERHEAD + value_width) / 4;
    if room < MAX_ROW_IDS {
        room
    } else {
        MAX_ROW_IDS
    }
}

/// A distinct value and the sorted row ids that hold it
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub value: Value,
    pub row_ids: Vec<RowId>,
}

impl IndexEntry {
    pub fn new(value: Value, mut row_ids: Vec<RowId>) -> Self {
        row_ids.sort_unstable();
        row_ids.dedup();
        Self { value, row_ids }
    }

    /// Bytes after the payload-size field
    pub fn payload_size(&self) -> usize {
        2 + self.value.payload_len() + 4 * self.row_ids.len()
    }

    /// Encoded size on a leaf page
    pub fn leaf_size(&self) -> usize {
        2 + self.payload_size()
    }

    /// Encoded size on an interior page
    pub fn interior_size(&self) -> usize {
        4 + self.leaf_size()
    }

    /// Fail with `CellOverflow` if the entry could not be stored on an
    /// interior page
    pub fn check_capacity(&self) -> Result<()> {
        if self.row_ids.len() > MAX_ROW_IDS {
            return Err(ArgonError::CellOverflow {
                size: self.interior_size(),
                max: MAX_INDEX_CELL,
            });
        }
        if self.interior_size() > MAX_INDEX_CELL {
            return Err(ArgonError::CellOverflow {
                size: self.interior_size(),
                max: MAX_INDEX_CELL,
            });
        }
        Ok(())
    }

    /// Insert keeping the list sorted; false if already present
    pub fn insert_row_id(&mut self, row_id: RowId) -> bool {
        match self.row_ids.binary_search(&row_id) {
            Ok(_) => false,
            Err(at) => {
                self.row_ids.insert(at, row_id);
                true
            }
        }
    }

    /// Remove a row id; false if it was not present
    pub fn remove_row_id(&mut self, row_id: RowId) -> bool {
        match self.row_ids.binary_search(&row_id) {
            Ok(at) => {
                self.row_ids.remove(at);
                true
            }
            Err(_) => false,
        }
    }
}

/// One decoded index cell
#[derive(Debug, Clone, PartialEq)]
pub struct IndexCell {
    /// Left child; present exactly on interior pages
    pub child: Option<PageId>,
    pub entry: IndexEntry,
}

impl IndexCell {
    pub fn leaf(entry: IndexEntry) -> Self {
        Self { child: None, entry }
    }

    pub fn interior(child: PageId, entry: IndexEntry) -> Self {
        Self {
            child: Some(child),
            entry,
        }
    }

    pub fn size(&self) -> usize {
        match self.child {
            Some(_) => self.entry.interior_size(),
            None => self.entry.leaf_size(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.entry.row_ids.len() > MAX_ROW_IDS {
            return Err(ArgonError::CellOverflow {
                size: self.size(),
                max: MAX_INDEX_CELL,
            });
        }

        let mut buf = Vec::with_capacity(self.size());
        if let Some(child) = self.child {
            buf.put_u32(child);
        }
        buf.put_u16(self.entry.payload_size() as u16);
        buf.put_u8(self.entry.row_ids.len() as u8);
        buf.put_u8(self.entry.value.tag());
        encode_value(&self.entry.value, &mut buf)?;
        for row_id in &self.entry.row_ids {
            buf.put_u32(*row_id);
        }
        Ok(buf)
    }

    /// Decode cell `index` of an index page
    pub fn read(page: &Page, index: usize) -> Result<Self> {
        let interior = match page.page_type()? {
            PageType::IndexInterior => true,
            PageType::IndexLeaf => false,
            other => {
                return Err(ArgonError::Corruption(format!(
                    "Page {} is not an index page ({:?})",
                    page.id(),
                    other
                )))
            }
        };

        let truncated = || {
            ArgonError::Corruption(format!("Index cell {} on page {} is truncated", index, page.id()))
        };

        let mut buf = page.cell(index);
        let header = if interior { 8 } else { 4 };
        if buf.remaining() < header {
            return Err(truncated());
        }

        let child = interior.then(|| buf.get_u32());
        let payload_size = buf.get_u16() as usize;
        let count = buf.get_u8() as usize;
        let tag = buf.get_u8();
        let value = decode_value(tag, &mut buf)?;
        if buf.remaining() < 4 * count {
            return Err(truncated());
        }
        let row_ids = (0..count).map(|_| buf.get_u32()).collect();

        let entry = IndexEntry { value, row_ids };
        if entry.payload_size() != payload_size {
            return Err(ArgonError::Corruption(format!(
                "Index cell {} on page {}: payload size {} does not match contents ({})",
                index,
                page.id(),
                payload_size,
                entry.payload_size()
            )));
        }
        Ok(Self { child, entry })
    }
}
