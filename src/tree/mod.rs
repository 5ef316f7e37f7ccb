//! Tree Module
//!
//! The two tree structures built on the page store.
//!
//! ## Responsibilities
//! - `TableTree`: B+-tree clustering records by row id, leaves chained for
//!   ordered scans
//! - `IndexTree`: B-tree from column value to the sorted row ids holding it
//!
//! ## Interior Pages
//! Interior cells of both trees begin with a 4-byte child pointer. An
//! interior page with N cells has N+1 children: child `i < N` is the pointer
//! stored in cell `i`, child `N` is the rightmost child in the header link.
//! Page 0 is the leftmost leaf of every tree and is never freed.

mod index;
mod table;

pub use index::{
    row_id_capacity, IndexCell, IndexEntry, IndexLocation, IndexTree, MAX_INDEXED_TEXT, MAX_INDEX_CELL,
    MAX_ROW_IDS,
};
pub use table::{
    cell_row_id, RecordLocation, TableScan, TableTree, INTERIOR_CELL_SIZE, MAX_RECORD_CELL,
};

use crate::error::Result;
use crate::storage::{Page, PageFile, PageId, PageLink};
use crate::ArgonError;

/// Bytes of the child pointer at the start of every interior cell
pub(crate) const CHILD_POINTER_SIZE: usize = 4;

// =============================================================================
// Interior Page Helpers
// =============================================================================

/// Child pointer at `slot` (0..=cell count) of an interior page
pub(crate) fn child_at(page: &Page, slot: usize) -> Result<PageId> {
    let count = page.cell_count();
    if slot < count {
        let cell = page.cell(slot);
        if cell.len() < CHILD_POINTER_SIZE {
            return Err(ArgonError::Corruption(format!(
                "Interior cell {} on page {} is truncated",
                slot,
                page.id()
            )));
        }
        Ok(u32::from_be_bytes([cell[0], cell[1], cell[2], cell[3]]))
    } else if slot == count {
        page.rightmost_child()
    } else {
        Err(ArgonError::Storage(format!(
            "Child slot {} out of range on page {} ({} cells)",
            slot,
            page.id(),
            count
        )))
    }
}

/// Overwrite the child pointer at `slot`
pub(crate) fn set_child_at(page: &mut Page, slot: usize, child: PageId) -> Result<()> {
    let count = page.cell_count();
    if slot < count {
        page.cell_mut(slot)[..CHILD_POINTER_SIZE].copy_from_slice(&child.to_be_bytes());
        Ok(())
    } else if slot == count {
        page.set_link(PageLink::Child(child));
        Ok(())
    } else {
        Err(ArgonError::Storage(format!(
            "Child slot {} out of range on page {} ({} cells)",
            slot,
            page.id(),
            count
        )))
    }
}

/// All children of an interior page, left to right
pub(crate) fn children(page: &Page) -> Result<Vec<PageId>> {
    (0..=page.cell_count()).map(|slot| child_at(page, slot)).collect()
}

/// Slot at which `child` hangs off `page`
pub(crate) fn child_slot(page: &Page, child: PageId) -> Result<usize> {
    for slot in 0..=page.cell_count() {
        if child_at(page, slot)? == child {
            return Ok(slot);
        }
    }
    Err(ArgonError::Corruption(format!(
        "Page {} is not a child of page {}",
        child,
        page.id()
    )))
}

/// Remove separator cell `index` together with one of the two children it
/// separates; `survivor` takes over both slots
pub(crate) fn remove_separator(page: &mut Page, index: usize, survivor: PageId) -> Result<Vec<u8>> {
    set_child_at(page, index + 1, survivor)?;
    page.remove_cell(index)
}

/// Point every page in `pages` at `parent`
pub(crate) fn reparent(file: &mut PageFile, pages: &[PageId], parent: PageId) -> Result<()> {
    for &id in pages {
        file.set_parent(id, Some(parent))?;
    }
    Ok(())
}

// =============================================================================
// Descent Helpers
// =============================================================================

/// Leftmost leaf of the subtree rooted at `from`
pub(crate) fn leftmost_leaf(file: &PageFile, from: PageId) -> Result<Page> {
    descend(file, from, |page| child_at(page, 0))
}

/// Rightmost leaf of the subtree rooted at `from`
pub(crate) fn rightmost_leaf(file: &PageFile, from: PageId) -> Result<Page> {
    descend(file, from, |page| page.rightmost_child())
}

fn descend(file: &PageFile, from: PageId, next: impl Fn(&Page) -> Result<PageId>) -> Result<Page> {
    let mut page = file.read_page(from)?;
    for _ in 0..=file.page_count() {
        if page.page_type()?.is_leaf() {
            return Ok(page);
        }
        page = file.read_page(next(&page)?)?;
    }
    Err(ArgonError::Corruption(format!(
        "Descent from page {} does not reach a leaf",
        from
    )))
}
