//! Table Tree
//!
//! B+-tree over a page file, clustering records by row id.
//!
//! ## Cells
//! ```text
//! Leaf:      [RecordLength: u16][RowId: u32][NCols][Tags][Payloads]
//! Interior:  [LeftChild: u32][RowId: u32]
//! ```
//! The row id of interior cell `i` is the smallest row id reachable through
//! child `i + 1`, so child `i` holds the keys in `[key(i-1), key(i))`.
//!
//! ## Balancing
//! Leaves split in half when a record does not fit. Deletion only compacts
//! the leaf; a leaf that becomes empty is unlinked and freed (except page 0),
//! and an interior page left without separators is spliced out. Underfull
//! leaves are never merged.

use std::path::Path;

use crate::error::Result;
use crate::record::{matches, Predicate, Record, RowId, Value};
use crate::storage::{
    Page, PageFile, PageId, PageLink, PageType, CELL_POINTER_SIZE, PAGE_HEADER_SIZE, PAGE_SIZE,
};
use crate::ArgonError;

use super::{
    child_at, child_slot, children, remove_separator, reparent, rightmost_leaf, set_child_at,
    CHILD_POINTER_SIZE,
};

/// Size of an interior cell: child pointer + row id
pub const INTERIOR_CELL_SIZE: usize = 8;

/// Largest leaf cell; two of them always fit on one page
pub const MAX_RECORD_CELL: usize = (PAGE_SIZE - PAGE_HEADER_SIZE) / 2 - CELL_POINTER_SIZE;

/// Offset of the row id within a leaf cell (after the record length)
const LEAF_ROW_ID_OFFSET: usize = 2;

// =============================================================================
// Cell Helpers
// =============================================================================

/// Where a row id lives, or would be inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLocation {
    pub page: PageId,
    pub index: usize,
    pub found: bool,
}

/// Row id stored in cell `index` of a table page (leaf or interior)
pub fn cell_row_id(page: &Page, index: usize) -> Result<RowId> {
    let offset = match page.page_type()? {
        PageType::TableLeaf => LEAF_ROW_ID_OFFSET,
        PageType::TableInterior => CHILD_POINTER_SIZE,
        other => {
            return Err(ArgonError::Corruption(format!(
                "Page {} is not a table page ({:?})",
                page.id(),
                other
            )))
        }
    };
    let cell = page.cell(index);
    if cell.len() < offset + 4 {
        return Err(ArgonError::Corruption(format!(
            "Cell {} on page {} is truncated",
            index,
            page.id()
        )));
    }
    Ok(u32::from_be_bytes([
        cell[offset],
        cell[offset + 1],
        cell[offset + 2],
        cell[offset + 3],
    ]))
}

fn interior_cell(child: PageId, row_id: RowId) -> [u8; INTERIOR_CELL_SIZE] {
    let mut cell = [0u8; INTERIOR_CELL_SIZE];
    cell[..4].copy_from_slice(&child.to_be_bytes());
    cell[4..].copy_from_slice(&row_id.to_be_bytes());
    cell
}

fn set_interior_key(page: &mut Page, index: usize, row_id: RowId) {
    page.cell_mut(index)[CHILD_POINTER_SIZE..INTERIOR_CELL_SIZE].copy_from_slice(&row_id.to_be_bytes());
}

/// First cell whose row id is >= `row_id`
fn lower_bound(page: &Page, row_id: RowId) -> Result<usize> {
    let (mut lo, mut hi) = (0, page.cell_count());
    while lo < hi {
        let mid = (lo + hi) / 2;
        if cell_row_id(page, mid)? < row_id {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    Ok(lo)
}

/// Number of cells whose row id is <= `row_id` (the child slot to follow)
fn upper_bound(page: &Page, row_id: RowId) -> Result<usize> {
    let (mut lo, mut hi) = (0, page.cell_count());
    while lo < hi {
        let mid = (lo + hi) / 2;
        if cell_row_id(page, mid)? <= row_id {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    Ok(lo)
}

// =============================================================================
// Table Tree
// =============================================================================

/// Clustered record storage for one table file
pub struct TableTree {
    file: PageFile,
}

impl TableTree {
    /// Create a new table file whose root is an empty leaf at page 0
    pub fn create(path: &Path, sync_on_write: bool) -> Result<Self> {
        let mut file = PageFile::create(path, sync_on_write)?;
        file.create_page(PageType::TableLeaf, None)?;
        Ok(Self { file })
    }

    pub fn open(path: &Path, sync_on_write: bool) -> Result<Self> {
        let file = PageFile::open(path, sync_on_write)?;
        let first = file.read_page(0)?;
        if first.page_type()? != PageType::TableLeaf {
            return Err(ArgonError::Corruption(format!(
                "{}: page 0 is not a table leaf",
                path.display()
            )));
        }
        Ok(Self { file })
    }

    pub fn page_file(&self) -> &PageFile {
        &self.file
    }

    pub fn root_page(&self) -> Result<PageId> {
        self.file.root_page()
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    /// Binary-search each level from the root down to the leaf for `row_id`
    pub fn find_record(&self, row_id: RowId) -> Result<RecordLocation> {
        let mut page = self.file.read_page(self.root_page()?)?;
        for _ in 0..=self.file.page_count() {
            match page.page_type()? {
                PageType::TableInterior => {
                    let slot = upper_bound(&page, row_id)?;
                    page = self.file.read_page(child_at(&page, slot)?)?;
                }
                PageType::TableLeaf => {
                    let index = lower_bound(&page, row_id)?;
                    let found = index < page.cell_count() && cell_row_id(&page, index)? == row_id;
                    return Ok(RecordLocation {
                        page: page.id(),
                        index,
                        found,
                    });
                }
                other => {
                    return Err(ArgonError::Corruption(format!(
                        "Unexpected {:?} page {} in table tree",
                        other,
                        page.id()
                    )))
                }
            }
        }
        Err(ArgonError::Corruption("Table tree descent does not terminate".to_string()))
    }

    /// Fetch one record by row id
    pub fn get(&self, row_id: RowId) -> Result<Option<Record>> {
        let location = self.find_record(row_id)?;
        if !location.found {
            return Ok(None);
        }
        let page = self.file.read_page(location.page)?;
        Record::decode(page.cell(location.index)).map(Some)
    }

    /// Largest row id currently stored (boundary cell of the rightmost leaf)
    pub fn last_row_id(&self) -> Result<Option<RowId>> {
        let leaf = rightmost_leaf(&self.file, self.root_page()?)?;
        match leaf.cell_count() {
            0 => Ok(None),
            count => cell_row_id(&leaf, count - 1).map(Some),
        }
    }

    /// Smallest row id currently stored (first cell of the leftmost non-empty leaf)
    pub fn smallest_row_id(&self) -> Result<Option<RowId>> {
        let mut next = Some(0);
        while let Some(id) = next {
            let leaf = self.file.read_page(id)?;
            if leaf.cell_count() > 0 {
                return cell_row_id(&leaf, 0).map(Some);
            }
            next = leaf.right_sibling()?;
        }
        Ok(None)
    }

    /// Row id the next insert will receive; deleted ids are never reused
    pub fn next_row_id(&self) -> Result<RowId> {
        let last = self.last_row_id()?.unwrap_or(0).max(self.file.watermark());
        last.checked_add(1)
            .ok_or_else(|| ArgonError::Storage("Row id space exhausted".to_string()))
    }

    /// Leaf pages in sibling-chain order, starting at page 0
    pub fn leaf_pages(&self) -> Result<Vec<PageId>> {
        let mut leaves = Vec::new();
        let mut next = Some(0);
        while let Some(id) = next {
            if leaves.len() as u32 > self.file.page_count() {
                return Err(ArgonError::Corruption("Leaf chain contains a cycle".to_string()));
            }
            leaves.push(id);
            next = self.file.read_page(id)?.right_sibling()?;
        }
        Ok(leaves)
    }

    // -------------------------------------------------------------------------
    // Scans
    // -------------------------------------------------------------------------

    /// Iterate all records in row-id order along the leaf chain
    pub fn scan(&self) -> TableScan<'_> {
        TableScan {
            file: &self.file,
            current: None,
            next_page: Some(0),
            index: 0,
        }
    }

    /// Records matching `predicate` (all records for `None`)
    pub fn search(&self, predicate: Option<&Predicate>) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        for record in self.scan() {
            let record = record?;
            if matches(predicate, &record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    // -------------------------------------------------------------------------
    // Insert
    // -------------------------------------------------------------------------

    /// Store `values` under a fresh row id and return that id
    pub fn insert(&mut self, values: Vec<Value>) -> Result<RowId> {
        let row_id = self.next_row_id()?;
        self.insert_record(&Record::new(row_id, values))?;
        Ok(row_id)
    }

    /// Store a record under its own row id, splitting leaves as needed
    pub fn insert_record(&mut self, record: &Record) -> Result<()> {
        let bytes = record.encode()?;
        if bytes.len() > MAX_RECORD_CELL {
            return Err(ArgonError::CellOverflow {
                size: bytes.len(),
                max: MAX_RECORD_CELL,
            });
        }

        loop {
            let location = self.find_record(record.row_id)?;
            if location.found {
                return Err(ArgonError::Storage(format!(
                    "Row id {} already exists",
                    record.row_id
                )));
            }

            let mut leaf = self.file.read_page(location.page)?;
            if !leaf.needs_split(bytes.len()) {
                leaf.insert_cell(location.index, &bytes)?;
                self.file.write_page(&leaf)?;
                if record.row_id > self.file.watermark() {
                    self.file.set_watermark(record.row_id)?;
                }
                tracing::trace!(row_id = record.row_id, page = leaf.id(), "record inserted");
                return Ok(());
            }

            self.split_leaf(location.page)?;
        }
    }

    /// Move the upper half of a full leaf to a new right sibling
    fn split_leaf(&mut self, page_id: PageId) -> Result<()> {
        let mut left = self.file.read_page(page_id)?;
        let count = left.cell_count();
        if count < 2 {
            return Err(ArgonError::Storage(format!(
                "Leaf {} has {} cells and cannot be split",
                page_id, count
            )));
        }

        let mut right = self.file.create_page(PageType::TableLeaf, left.parent())?;
        left.transfer_cells(count / 2, &mut right)?;
        right.set_link(PageLink::Sibling(left.right_sibling()?));
        left.set_link(PageLink::Sibling(Some(right.id())));
        let pivot = cell_row_id(&right, 0)?;

        self.file.write_page(&left)?;
        self.file.write_page(&right)?;

        tracing::debug!(
            file = %self.file.path().display(),
            left = page_id,
            right = right.id(),
            pivot,
            "table leaf split"
        );
        self.insert_separator(page_id, right.id(), pivot)
    }

    /// Hang `right` next to `left` in left's parent, separated by `key`
    ///
    /// Creates a new root when `left` is the root, and splits the parent
    /// first when it has no room for another cell.
    fn insert_separator(&mut self, left: PageId, right: PageId, key: RowId) -> Result<()> {
        loop {
            let parent_id = match self.file.read_page(left)?.parent() {
                Some(parent) => parent,
                None => {
                    let mut root = self.file.create_page(PageType::TableInterior, None)?;
                    root.set_link(PageLink::Child(left));
                    self.file.write_page(&root)?;
                    self.file.set_parent(left, Some(root.id()))?;
                    tracing::debug!(root = root.id(), "table tree grew a level");
                    root.id()
                }
            };

            let mut parent = self.file.read_page(parent_id)?;
            if parent.needs_split(INTERIOR_CELL_SIZE) {
                self.split_interior(parent_id)?;
                continue;
            }

            let slot = child_slot(&parent, left)?;
            set_child_at(&mut parent, slot, right)?;
            parent.insert_cell(slot, &interior_cell(left, key))?;
            self.file.write_page(&parent)?;
            self.file.set_parent(right, Some(parent_id))?;
            return Ok(());
        }
    }

    /// Split a full interior page, promoting its middle key
    fn split_interior(&mut self, page_id: PageId) -> Result<()> {
        let mut left = self.file.read_page(page_id)?;
        let count = left.cell_count();
        if count < 2 {
            return Err(ArgonError::Storage(format!(
                "Interior page {} has {} cells and cannot be split",
                page_id, count
            )));
        }

        let middle = count / 2;
        let old_rightmost = left.rightmost_child()?;
        let mut right = self.file.create_page(PageType::TableInterior, left.parent())?;
        left.transfer_cells(middle + 1, &mut right)?;
        let promoted_child = child_at(&left, middle)?;
        let promoted_key = cell_row_id(&left, middle)?;
        left.remove_cell(middle)?;
        left.set_link(PageLink::Child(promoted_child));
        right.set_link(PageLink::Child(old_rightmost));

        self.file.write_page(&left)?;
        self.file.write_page(&right)?;
        reparent(&mut self.file, &children(&right)?, right.id())?;

        tracing::debug!(
            file = %self.file.path().display(),
            left = page_id,
            right = right.id(),
            promoted_key,
            "table interior split"
        );
        self.insert_separator(page_id, right.id(), promoted_key)
    }

    // -------------------------------------------------------------------------
    // Update
    // -------------------------------------------------------------------------

    /// Replace one column of a record, returning the previous value
    pub fn update(&mut self, row_id: RowId, column: usize, value: Value) -> Result<Value> {
        let mut record = self.get(row_id)?.ok_or(ArgonError::RowNotFound(row_id))?;
        let slot = record.values.get_mut(column).ok_or_else(|| {
            ArgonError::Storage(format!("Record {} has no column {}", row_id, column))
        })?;
        let old = std::mem::replace(slot, value);
        self.update_record(&record)?;
        Ok(old)
    }

    /// Rewrite a whole record in place, splitting its leaf if it grew too much
    pub fn update_record(&mut self, record: &Record) -> Result<()> {
        let bytes = record.encode()?;
        if bytes.len() > MAX_RECORD_CELL {
            return Err(ArgonError::CellOverflow {
                size: bytes.len(),
                max: MAX_RECORD_CELL,
            });
        }

        loop {
            let location = self.find_record(record.row_id)?;
            if !location.found {
                return Err(ArgonError::RowNotFound(record.row_id));
            }

            let mut leaf = self.file.read_page(location.page)?;
            if leaf.can_resize(location.index, bytes.len()) {
                leaf.replace_cell(location.index, &bytes)?;
                self.file.write_page(&leaf)?;
                return Ok(());
            }

            self.split_leaf(location.page)?;
        }
    }

    // -------------------------------------------------------------------------
    // Delete
    // -------------------------------------------------------------------------

    /// Remove a record and return it
    ///
    /// Fails with `RowNotFound` without touching the file when the row id
    /// does not exist.
    pub fn delete(&mut self, row_id: RowId) -> Result<Record> {
        let location = self.find_record(row_id)?;
        if !location.found {
            return Err(ArgonError::RowNotFound(row_id));
        }

        let mut leaf = self.file.read_page(location.page)?;
        let removed = Record::decode(&leaf.remove_cell(location.index)?)?;
        self.file.write_page(&leaf)?;

        if leaf.cell_count() == 0 {
            if leaf.id() != 0 {
                self.remove_empty_leaf(leaf.id())?;
            }
        } else if location.index == 0 {
            let new_smallest = cell_row_id(&leaf, 0)?;
            self.update_lower_bound(leaf.id(), new_smallest)?;
        }

        tracing::trace!(row_id, page = location.page, "record deleted");
        Ok(removed)
    }

    /// Propagate a subtree's new smallest row id to the pivot that bounds it
    ///
    /// Climbs while the subtree is the leftmost child of its parent, since
    /// such subtrees have no pivot of their own at that level.
    fn update_lower_bound(&mut self, page_id: PageId, smallest: RowId) -> Result<()> {
        let mut child = page_id;
        while let Some(parent_id) = self.file.read_page(child)?.parent() {
            let mut parent = self.file.read_page(parent_id)?;
            let slot = child_slot(&parent, child)?;
            if slot > 0 {
                set_interior_key(&mut parent, slot - 1, smallest);
                return self.file.write_page(&parent);
            }
            child = parent_id;
        }
        Ok(())
    }

    /// Unlink an empty leaf from the sibling chain and its parent, then free it
    fn remove_empty_leaf(&mut self, leaf_id: PageId) -> Result<()> {
        let next = self.file.read_page(leaf_id)?.right_sibling()?;
        if let Some(previous) = self.previous_leaf(leaf_id)? {
            let mut page = self.file.read_page(previous)?;
            page.set_link(PageLink::Sibling(next));
            self.file.write_page(&page)?;
        }

        self.detach_child(leaf_id)?;
        self.file.delete_page(leaf_id)?;
        tracing::debug!(file = %self.file.path().display(), page = leaf_id, "empty table leaf freed");
        Ok(())
    }

    /// Leaf immediately left of `leaf_id`, found through the tree
    fn previous_leaf(&self, leaf_id: PageId) -> Result<Option<PageId>> {
        let mut child = leaf_id;
        while let Some(parent_id) = self.file.read_page(child)?.parent() {
            let parent = self.file.read_page(parent_id)?;
            let slot = child_slot(&parent, child)?;
            if slot > 0 {
                let subtree = child_at(&parent, slot - 1)?;
                return rightmost_leaf(&self.file, subtree).map(|leaf| Some(leaf.id()));
            }
            child = parent_id;
        }
        Ok(None)
    }

    /// Remove `child_id` and its pivot from its parent
    fn detach_child(&mut self, child_id: PageId) -> Result<()> {
        let parent_id = self.file.read_page(child_id)?.parent().ok_or_else(|| {
            ArgonError::Storage(format!("Root page {} cannot be detached", child_id))
        })?;
        let mut parent = self.file.read_page(parent_id)?;
        let count = parent.cell_count();
        let slot = child_slot(&parent, child_id)?;

        if count == 0 {
            // the lone child of this interior page; the page goes with it
            self.detach_child(parent_id)?;
            return self.file.delete_page(parent_id);
        }

        if slot == 0 {
            let survivor = child_at(&parent, 1)?;
            let removed = remove_separator(&mut parent, 0, survivor)?;
            self.file.write_page(&parent)?;
            let smallest = u32::from_be_bytes([removed[4], removed[5], removed[6], removed[7]]);
            self.update_lower_bound(parent_id, smallest)?;
        } else {
            let survivor = child_at(&parent, slot - 1)?;
            remove_separator(&mut parent, slot - 1, survivor)?;
            self.file.write_page(&parent)?;
        }

        if parent.cell_count() == 0 {
            self.collapse_interior(parent_id)?;
        }
        Ok(())
    }

    /// Splice out an interior page that is left with a single child
    fn collapse_interior(&mut self, page_id: PageId) -> Result<()> {
        let page = self.file.read_page(page_id)?;
        let only_child = page.rightmost_child()?;
        match page.parent() {
            None => self.file.set_parent(only_child, None)?,
            Some(grandparent_id) => {
                let mut grandparent = self.file.read_page(grandparent_id)?;
                let slot = child_slot(&grandparent, page_id)?;
                set_child_at(&mut grandparent, slot, only_child)?;
                self.file.write_page(&grandparent)?;
                self.file.set_parent(only_child, Some(grandparent_id))?;
            }
        }
        self.file.delete_page(page_id)?;
        tracing::debug!(page = page_id, child = only_child, "table interior collapsed");
        Ok(())
    }

    /// Number of stored records
    pub fn record_count(&self) -> Result<usize> {
        let mut count = 0;
        for id in self.leaf_pages()? {
            count += self.file.read_page(id)?.cell_count();
        }
        Ok(count)
    }
}

// =============================================================================
// Table Scan
// =============================================================================

/// Iterator over all records in row-id order
pub struct TableScan<'a> {
    file: &'a PageFile,
    current: Option<Page>,
    next_page: Option<PageId>,
    index: usize,
}

impl Iterator for TableScan<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(page) = &self.current {
                if self.index < page.cell_count() {
                    let record = Record::decode(page.cell(self.index));
                    self.index += 1;
                    return Some(record);
                }
                match page.right_sibling() {
                    Ok(next) => self.next_page = next,
                    Err(e) => {
                        self.current = None;
                        self.next_page = None;
                        return Some(Err(e));
                    }
                }
                self.current = None;
            }

            let id = self.next_page.take()?;
            match self.file.read_page(id) {
                Ok(page) => {
                    self.current = Some(page);
                    self.index = 0;
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
