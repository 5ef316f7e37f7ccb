//! Index Tree
//!
//! B-tree over a page file, keyed by one column's value. Every distinct
//! value occupies exactly one cell holding the sorted row ids that currently
//! have it; a cell is deleted as soon as its last row id is removed.
//!
//! ## Responsibilities
//! - Locate values (`find_value_index`, `find_page_and_index`)
//! - Add row ids, creating cells and splitting pages as needed
//! - Remove row ids, deleting cells and rebalancing (see `delete.rs`)
//! - Point and range search (see `search.rs`)
//! - Bulk population from a table scan
//!
//! Unlike the table tree, interior cells here carry real entries: an
//! interior cell's value sits between its left child and the next child.

mod cell;
mod delete;
mod search;

use std::cmp::Ordering;
use std::path::Path;

use crate::error::Result;
use crate::record::{compare_values, RowId, Value};
use crate::storage::{Page, PageFile, PageId, PageLink, PageType};
use crate::ArgonError;

use super::{child_at, child_slot, children, reparent, set_child_at};

pub use cell::{row_id_capacity, IndexCell, IndexEntry, MAX_INDEXED_TEXT, MAX_INDEX_CELL, MAX_ROW_IDS};

/// Where a value lives, or the leaf position it would be inserted after
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexLocation {
    pub page: PageId,
    /// Last cell whose value is <= the target (`None`: before every cell)
    pub index: Option<usize>,
    /// True when `index` holds exactly the target value
    pub found: bool,
}

/// Typed ordering used by the index; NULL and mixed types are rejected
pub(crate) fn order(left: &Value, right: &Value) -> Result<Ordering> {
    compare_values(left, right).ok_or_else(|| {
        ArgonError::Codec(format!(
            "Cannot order {} ({}) against {} ({})",
            left,
            left.data_type(),
            right,
            right.data_type()
        ))
    })
}

// =============================================================================
// Index Tree
// =============================================================================

/// Secondary index for one column of one table
pub struct IndexTree {
    file: PageFile,
}

impl IndexTree {
    /// Create a new index file whose root is an empty leaf at page 0
    pub fn create(path: &Path, sync_on_write: bool) -> Result<Self> {
        let mut file = PageFile::create(path, sync_on_write)?;
        file.create_page(PageType::IndexLeaf, None)?;
        Ok(Self { file })
    }

    pub fn open(path: &Path, sync_on_write: bool) -> Result<Self> {
        let file = PageFile::open(path, sync_on_write)?;
        let first = file.read_page(0)?;
        if first.page_type()? != PageType::IndexLeaf {
            return Err(ArgonError::Corruption(format!(
                "{}: page 0 is not an index leaf",
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

    /// Binary search for the last cell on `page` whose value is <= `value`
    pub fn find_value_index(page: &Page, value: &Value) -> Result<Option<usize>> {
        let (mut lo, mut hi) = (0, page.cell_count());
        while lo < hi {
            let mid = (lo + hi) / 2;
            let cell = IndexCell::read(page, mid)?;
            if order(&cell.entry.value, value)? != Ordering::Greater {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo.checked_sub(1))
    }

    /// Descend from the root until the value is found or a leaf is reached
    pub fn find_page_and_index(&self, value: &Value) -> Result<IndexLocation> {
        let mut page = self.file.read_page(self.root_page()?)?;
        for _ in 0..=self.file.page_count() {
            let index = Self::find_value_index(&page, value)?;
            if let Some(i) = index {
                let cell = IndexCell::read(&page, i)?;
                if order(&cell.entry.value, value)? == Ordering::Equal {
                    return Ok(IndexLocation {
                        page: page.id(),
                        index,
                        found: true,
                    });
                }
            }

            match page.page_type()? {
                PageType::IndexLeaf => {
                    return Ok(IndexLocation {
                        page: page.id(),
                        index,
                        found: false,
                    })
                }
                PageType::IndexInterior => {
                    let slot = index.map_or(0, |i| i + 1);
                    page = self.file.read_page(child_at(&page, slot)?)?;
                }
                other => {
                    return Err(ArgonError::Corruption(format!(
                        "Unexpected {:?} page {} in index tree",
                        other,
                        page.id()
                    )))
                }
            }
        }
        Err(ArgonError::Corruption("Index tree descent does not terminate".to_string()))
    }

    /// Entry for `value`, if indexed
    pub fn get(&self, value: &Value) -> Result<Option<IndexEntry>> {
        if value.is_null() {
            return Ok(None);
        }
        let location = self.find_page_and_index(value)?;
        match (location.found, location.index) {
            (true, Some(index)) => {
                let page = self.file.read_page(location.page)?;
                Ok(Some(IndexCell::read(&page, index)?.entry))
            }
            _ => Ok(None),
        }
    }

    /// All entries in ascending value order
    pub fn entries(&self) -> Result<Vec<IndexEntry>> {
        let mut entries = Vec::new();
        // (page, next child slot to visit)
        let mut stack: Vec<(PageId, usize)> = vec![(self.root_page()?, 0)];

        while let Some((page_id, slot)) = stack.pop() {
            let page = self.file.read_page(page_id)?;
            let count = page.cell_count();
            if page.page_type()?.is_leaf() {
                for i in 0..count {
                    entries.push(IndexCell::read(&page, i)?.entry);
                }
                continue;
            }

            if slot > 0 {
                entries.push(IndexCell::read(&page, slot - 1)?.entry);
            }
            if slot < count {
                stack.push((page_id, slot + 1));
            }
            stack.push((child_at(&page, slot)?, 0));
        }
        Ok(entries)
    }

    // -------------------------------------------------------------------------
    // Insert
    // -------------------------------------------------------------------------

    /// Verify that `row_id` could be added under `value` without overflowing
    /// its cell, without modifying the file
    pub fn check_capacity(&self, value: &Value, row_id: RowId) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        let entry = match self.get(value)? {
            Some(mut entry) => {
                entry.insert_row_id(row_id);
                entry
            }
            None => IndexEntry::new(value.clone(), vec![row_id]),
        };
        entry.check_capacity()
    }

    /// Record that `row_id` holds `value`
    pub fn add_row_id(&mut self, value: &Value, row_id: RowId) -> Result<()> {
        self.add_entry(IndexEntry::new(value.clone(), vec![row_id]))
    }

    /// Merge an entry into the tree: grow the existing cell for its value or
    /// write a new one, splitting pages until it fits
    pub fn add_entry(&mut self, entry: IndexEntry) -> Result<()> {
        if entry.value.is_null() {
            return Err(ArgonError::Storage("NULL values are not indexed".to_string()));
        }
        entry.check_capacity()?;

        loop {
            let location = self.find_page_and_index(&entry.value)?;
            let mut page = self.file.read_page(location.page)?;

            match (location.found, location.index) {
                (true, Some(index)) => {
                    let mut cell = IndexCell::read(&page, index)?;
                    let mut grown = false;
                    for row_id in &entry.row_ids {
                        grown |= cell.entry.insert_row_id(*row_id);
                    }
                    if !grown {
                        return Ok(());
                    }
                    cell.entry.check_capacity()?;

                    let bytes = cell.encode()?;
                    if page.can_resize(index, bytes.len()) {
                        page.replace_cell(index, &bytes)?;
                        self.file.write_page(&page)?;
                        return Ok(());
                    }
                }
                (_, index) => {
                    let bytes = IndexCell::leaf(entry.clone()).encode()?;
                    if !page.needs_split(bytes.len()) {
                        page.insert_cell(index.map_or(0, |i| i + 1), &bytes)?;
                        self.file.write_page(&page)?;
                        return Ok(());
                    }
                }
            }

            self.split_page(location.page)?;
        }
    }

    /// Bulk-build from `(value, row id)` pairs: NULLs are skipped, row ids are
    /// grouped per distinct value and cells are written in ascending order
    pub fn populate(&mut self, pairs: Vec<(Value, RowId)>) -> Result<usize> {
        let mut pairs: Vec<(Value, RowId)> =
            pairs.into_iter().filter(|(value, _)| !value.is_null()).collect();

        let mut failure = None;
        pairs.sort_by(|a, b| match order(&a.0, &b.0) {
            Ok(ordering) => ordering.then(a.1.cmp(&b.1)),
            Err(e) => {
                failure.get_or_insert(e);
                Ordering::Equal
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }

        let mut groups: Vec<IndexEntry> = Vec::new();
        for (value, row_id) in pairs {
            match groups.last_mut() {
                Some(last) if order(&last.value, &value)? == Ordering::Equal => {
                    last.row_ids.push(row_id);
                }
                _ => groups.push(IndexEntry::new(value, vec![row_id])),
            }
        }

        for group in &groups {
            group.check_capacity()?;
        }
        let count = groups.len();
        for group in groups {
            self.add_entry(group)?;
        }

        tracing::info!(file = %self.file.path().display(), entries = count, "index populated");
        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Split
    // -------------------------------------------------------------------------

    /// Split a full page: the upper half moves to a new right sibling and the
    /// middle entry is promoted into the parent (created if the page was root)
    fn split_page(&mut self, page_id: PageId) -> Result<()> {
        let (middle_index, promoted_size) = {
            let page = self.file.read_page(page_id)?;
            let count = page.cell_count();
            if count < 3 {
                return Err(ArgonError::Storage(format!(
                    "Index page {} has {} cells and cannot be split",
                    page_id, count
                )));
            }
            let middle = count / 2;
            (middle, IndexCell::read(&page, middle)?.entry.interior_size())
        };

        // the parent must have room for the promoted entry first
        while let Some(parent_id) = self.file.read_page(page_id)?.parent() {
            if !self.file.read_page(parent_id)?.needs_split(promoted_size) {
                break;
            }
            self.split_page(parent_id)?;
        }

        let mut left = self.file.read_page(page_id)?;
        let page_type = left.page_type()?;
        let parent_id = match left.parent() {
            Some(parent) => parent,
            None => {
                let mut root = self.file.create_page(PageType::IndexInterior, None)?;
                root.set_link(PageLink::Child(page_id));
                self.file.write_page(&root)?;
                left.set_parent(Some(root.id()));
                tracing::debug!(root = root.id(), "index tree grew a level");
                root.id()
            }
        };

        let middle = IndexCell::read(&left, middle_index)?;
        let mut right = self.file.create_page(page_type, Some(parent_id))?;
        left.transfer_cells(middle_index + 1, &mut right)?;
        left.remove_cell(middle_index)?;

        if page_type.is_interior() {
            let middle_child = middle.child.ok_or_else(|| {
                ArgonError::Corruption(format!("Interior cell on page {} has no child", page_id))
            })?;
            right.set_link(PageLink::Child(left.rightmost_child()?));
            left.set_link(PageLink::Child(middle_child));
        }

        self.file.write_page(&left)?;
        self.file.write_page(&right)?;
        if page_type.is_interior() {
            reparent(&mut self.file, &children(&right)?, right.id())?;
        }

        let mut parent = self.file.read_page(parent_id)?;
        let slot = child_slot(&parent, page_id)?;
        set_child_at(&mut parent, slot, right.id())?;
        parent.insert_cell(slot, &IndexCell::interior(page_id, middle.entry).encode()?)?;
        self.file.write_page(&parent)?;

        tracing::debug!(
            file = %self.file.path().display(),
            left = page_id,
            right = right.id(),
            parent = parent_id,
            "index page split"
        );
        Ok(())
    }
}
