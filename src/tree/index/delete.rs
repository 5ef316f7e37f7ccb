//! Row-id removal, cell deletion and rebalancing
//!
//! ## Deleting a cell
//! - Leaf cell: compact the page; an emptied non-root leaf is rebalanced.
//! - Interior cell: replaced by a donor entry. The donor is the in-order
//!   predecessor (last cell of the rightmost leaf in the left subtree) or
//!   successor (first cell of the leftmost leaf in the right subtree),
//!   preferring one whose leaf is more than half full. If neither is and both
//!   children are leaves that fit on one page, the right child is merged into
//!   the left and the cell disappears with it.
//!
//! ## Rebalancing an empty node
//! Rotate an entry through the parent from a sibling holding at least two
//! cells; otherwise merge with a sibling, pulling the separator down. Pages
//! always merge into their left neighbour, so page 0 is never freed.

use crate::error::Result;
use crate::record::{RowId, Value};
use crate::storage::{PageId, PageLink, PAGE_HEADER_SIZE, PAGE_SIZE};
use crate::ArgonError;

use super::super::{
    child_at, child_slot, children, leftmost_leaf, remove_separator, reparent, rightmost_leaf,
};
use super::{IndexCell, IndexEntry, IndexTree};

/// Usable bytes of a page (cells plus pointers)
const PAGE_CAPACITY: usize = PAGE_SIZE - PAGE_HEADER_SIZE;

/// Entry borrowed from a leaf to replace a deleted interior cell
#[derive(Debug, Clone, Copy)]
enum Donor {
    /// Last cell of this leaf (in-order predecessor)
    Last(PageId),
    /// First cell of this leaf (in-order successor)
    First(PageId),
}

impl IndexTree {
    /// Remove `row_id` from the cell for `value`, deleting the cell when its
    /// last row id goes
    ///
    /// Fails without modifying the file when the value is not indexed or
    /// the cell does not hold `row_id`.
    pub fn remove_row_id(&mut self, value: &Value, row_id: RowId) -> Result<()> {
        let location = self.find_page_and_index(value)?;
        let index = match (location.found, location.index) {
            (true, Some(index)) => index,
            _ => return Err(ArgonError::ValueNotFound(value.to_string())),
        };

        let mut page = self.file.read_page(location.page)?;
        let mut cell = IndexCell::read(&page, index)?;
        if !cell.entry.remove_row_id(row_id) {
            return Err(ArgonError::RowIdNotInCell {
                row_id,
                value: value.to_string(),
            });
        }

        page.replace_cell(index, &cell.encode()?)?;
        self.file.write_page(&page)?;

        if cell.entry.row_ids.is_empty() {
            self.delete_cell(location.page, index)?;
        }
        Ok(())
    }

    /// Delete a cell whose row-id list is already empty
    pub fn delete_cell(&mut self, page_id: PageId, index: usize) -> Result<()> {
        let mut page = self.file.read_page(page_id)?;
        let cell = IndexCell::read(&page, index)?;
        if !cell.entry.row_ids.is_empty() {
            return Err(ArgonError::CellNotEmpty(cell.entry.value.to_string()));
        }

        if page.page_type()?.is_leaf() {
            page.remove_cell(index)?;
            self.file.write_page(&page)?;
            if page.cell_count() == 0 && !page.is_root() {
                self.rebalance(page_id)?;
            }
            return Ok(());
        }

        self.replace_interior_cell(page_id, index, cell.entry.value)
    }

    // -------------------------------------------------------------------------
    // Interior Cell Replacement
    // -------------------------------------------------------------------------

    fn replace_interior_cell(&mut self, page_id: PageId, index: usize, doomed: Value) -> Result<()> {
        let page = self.file.read_page(page_id)?;
        let left_child = child_at(&page, index)?;
        let right_child = child_at(&page, index + 1)?;
        let predecessor = rightmost_leaf(&self.file, left_child)?;
        let successor = leftmost_leaf(&self.file, right_child)?;
        let half = PAGE_CAPACITY / 2;

        let donor = if predecessor.used_space() > half {
            Donor::Last(predecessor.id())
        } else if successor.used_space() > half {
            Donor::First(successor.id())
        } else if predecessor.id() == left_child
            && successor.id() == right_child
            && predecessor.used_space() + successor.used_space() <= PAGE_CAPACITY
        {
            return self.merge_leaf_children(page_id, index);
        } else if predecessor.cell_count() >= 2 || successor.cell_count() < 2 {
            Donor::Last(predecessor.id())
        } else {
            Donor::First(successor.id())
        };

        let (leaf_id, donor_entry) = match donor {
            Donor::Last(id) => {
                let count = predecessor.cell_count();
                (id, IndexCell::read(&predecessor, count - 1)?.entry)
            }
            Donor::First(id) => (id, IndexCell::read(&successor, 0)?.entry),
        };

        self.overwrite_entry(&doomed, donor_entry)?;

        let mut leaf = self.file.read_page(leaf_id)?;
        let donor_index = match donor {
            Donor::Last(_) => leaf.cell_count() - 1,
            Donor::First(_) => 0,
        };
        leaf.remove_cell(donor_index)?;
        self.file.write_page(&leaf)?;

        tracing::debug!(page = page_id, donor = ?donor, "index interior cell replaced");
        if leaf.cell_count() == 0 && !leaf.is_root() {
            self.rebalance(leaf_id)?;
        }
        Ok(())
    }

    /// Replace the entry stored for `target` with `entry`, keeping the cell's
    /// child pointer; splits the page first if the new entry does not fit
    fn overwrite_entry(&mut self, target: &Value, entry: IndexEntry) -> Result<()> {
        loop {
            let location = self.find_page_and_index(target)?;
            let index = match (location.found, location.index) {
                (true, Some(index)) => index,
                _ => return Err(ArgonError::ValueNotFound(target.to_string())),
            };

            let mut page = self.file.read_page(location.page)?;
            let child = IndexCell::read(&page, index)?.child;
            let bytes = IndexCell {
                child,
                entry: entry.clone(),
            }
            .encode()?;

            if page.can_resize(index, bytes.len()) {
                page.replace_cell(index, &bytes)?;
                return self.file.write_page(&page);
            }
            self.split_page(location.page)?;
        }
    }

    /// Drop interior cell `index` and merge its right child into its left
    /// child (both leaves)
    fn merge_leaf_children(&mut self, page_id: PageId, index: usize) -> Result<()> {
        let mut parent = self.file.read_page(page_id)?;
        let left_id = child_at(&parent, index)?;
        let right_id = child_at(&parent, index + 1)?;
        let mut left = self.file.read_page(left_id)?;
        let mut right = self.file.read_page(right_id)?;

        right.transfer_cells(0, &mut left)?;
        left.set_link(PageLink::Sibling(right.right_sibling()?));
        self.file.write_page(&left)?;

        remove_separator(&mut parent, index, left_id)?;
        self.file.write_page(&parent)?;
        self.file.delete_page(right_id)?;

        tracing::debug!(left = left_id, right = right_id, "index leaves merged");
        self.shrink_if_empty(page_id)
    }

    // -------------------------------------------------------------------------
    // Rebalancing
    // -------------------------------------------------------------------------

    /// Restore a non-root node left without cells
    fn rebalance(&mut self, node_id: PageId) -> Result<()> {
        let node = self.file.read_page(node_id)?;
        let parent_id = match node.parent() {
            Some(parent) => parent,
            None => return Ok(()),
        };
        let parent = self.file.read_page(parent_id)?;
        let count = parent.cell_count();
        let slot = child_slot(&parent, node_id)?;

        let left = if slot > 0 { Some(child_at(&parent, slot - 1)?) } else { None };
        let right = if slot < count { Some(child_at(&parent, slot + 1)?) } else { None };

        if let Some(left_id) = left {
            if self.file.read_page(left_id)?.cell_count() >= 2 {
                return self.rotate_from_left(parent_id, slot, left_id, node_id);
            }
        }
        if let Some(right_id) = right {
            if self.file.read_page(right_id)?.cell_count() >= 2 {
                return self.rotate_from_right(parent_id, slot, node_id, right_id);
            }
        }

        match (left, right) {
            (Some(left_id), _) => self.merge_siblings(parent_id, slot - 1, left_id, node_id),
            (None, Some(right_id)) => self.merge_siblings(parent_id, slot, node_id, right_id),
            (None, None) => Err(ArgonError::Corruption(format!(
                "Index page {} has no siblings under page {}",
                node_id, parent_id
            ))),
        }
    }

    /// Move the separator down into `node` and the left sibling's last entry
    /// up into the parent
    fn rotate_from_left(&mut self, parent_id: PageId, slot: usize, left_id: PageId, node_id: PageId) -> Result<()> {
        let mut parent = self.file.read_page(parent_id)?;
        let mut left = self.file.read_page(left_id)?;
        let last_index = left.cell_count() - 1;
        let last = IndexCell::read(&left, last_index)?;
        let separator = IndexCell::read(&parent, slot - 1)?;

        let new_separator = IndexCell {
            child: separator.child,
            entry: last.entry.clone(),
        }
        .encode()?;
        if !parent.can_resize(slot - 1, new_separator.len()) {
            self.split_page(parent_id)?;
            return self.rebalance(node_id);
        }

        let mut node = self.file.read_page(node_id)?;
        left.remove_cell(last_index)?;
        let moved_child = if node.page_type()?.is_interior() {
            let old_rightmost = left.rightmost_child()?;
            let last_child = last.child.ok_or_else(|| {
                ArgonError::Corruption(format!("Interior cell on page {} has no child", left_id))
            })?;
            left.set_link(PageLink::Child(last_child));
            Some(old_rightmost)
        } else {
            None
        };

        node.insert_cell(0, &IndexCell { child: moved_child, entry: separator.entry }.encode()?)?;
        parent.replace_cell(slot - 1, &new_separator)?;

        self.file.write_page(&left)?;
        self.file.write_page(&node)?;
        self.file.write_page(&parent)?;
        if let Some(child) = moved_child {
            self.file.set_parent(child, Some(node_id))?;
        }

        tracing::debug!(from = left_id, to = node_id, "index entry rotated right");
        Ok(())
    }

    /// Move the separator down into `node` and the right sibling's first
    /// entry up into the parent
    fn rotate_from_right(&mut self, parent_id: PageId, slot: usize, node_id: PageId, right_id: PageId) -> Result<()> {
        let mut parent = self.file.read_page(parent_id)?;
        let mut right = self.file.read_page(right_id)?;
        let first = IndexCell::read(&right, 0)?;
        let separator = IndexCell::read(&parent, slot)?;

        let new_separator = IndexCell {
            child: separator.child,
            entry: first.entry.clone(),
        }
        .encode()?;
        if !parent.can_resize(slot, new_separator.len()) {
            self.split_page(parent_id)?;
            return self.rebalance(node_id);
        }

        let mut node = self.file.read_page(node_id)?;
        right.remove_cell(0)?;
        let moved_child = if node.page_type()?.is_interior() {
            let first_child = first.child.ok_or_else(|| {
                ArgonError::Corruption(format!("Interior cell on page {} has no child", right_id))
            })?;
            let node_rightmost = node.rightmost_child()?;
            node.set_link(PageLink::Child(first_child));
            node.push_cell(&IndexCell::interior(node_rightmost, separator.entry).encode()?)?;
            Some(first_child)
        } else {
            node.push_cell(&IndexCell::leaf(separator.entry).encode()?)?;
            None
        };
        parent.replace_cell(slot, &new_separator)?;

        self.file.write_page(&right)?;
        self.file.write_page(&node)?;
        self.file.write_page(&parent)?;
        if let Some(child) = moved_child {
            self.file.set_parent(child, Some(node_id))?;
        }

        tracing::debug!(from = right_id, to = node_id, "index entry rotated left");
        Ok(())
    }

    /// Merge `right_id` into `left_id` with separator `sep_index` pulled down
    /// between them
    fn merge_siblings(&mut self, parent_id: PageId, sep_index: usize, left_id: PageId, right_id: PageId) -> Result<()> {
        let mut parent = self.file.read_page(parent_id)?;
        let separator = IndexCell::read(&parent, sep_index)?;
        let mut left = self.file.read_page(left_id)?;
        let mut right = self.file.read_page(right_id)?;
        let interior = left.page_type()?.is_interior();

        let moved = if interior {
            let separator_child = left.rightmost_child()?;
            left.push_cell(&IndexCell::interior(separator_child, separator.entry).encode()?)?;
            let moved = children(&right)?;
            right.transfer_cells(0, &mut left)?;
            left.set_link(PageLink::Child(right.rightmost_child()?));
            moved
        } else {
            left.push_cell(&IndexCell::leaf(separator.entry).encode()?)?;
            right.transfer_cells(0, &mut left)?;
            left.set_link(PageLink::Sibling(right.right_sibling()?));
            Vec::new()
        };
        self.file.write_page(&left)?;
        reparent(&mut self.file, &moved, left_id)?;

        remove_separator(&mut parent, sep_index, left_id)?;
        self.file.write_page(&parent)?;
        self.file.delete_page(right_id)?;

        tracing::debug!(left = left_id, right = right_id, "index pages merged");
        self.shrink_if_empty(parent_id)
    }

    /// An interior page without cells is either collapsed (root) or
    /// rebalanced like any other empty node
    fn shrink_if_empty(&mut self, page_id: PageId) -> Result<()> {
        let page = self.file.read_page(page_id)?;
        if page.cell_count() > 0 {
            return Ok(());
        }
        if !page.is_root() {
            return self.rebalance(page_id);
        }

        let only_child = page.rightmost_child()?;
        self.file.set_parent(only_child, None)?;
        self.file.delete_page(page_id)?;
        tracing::debug!(old_root = page_id, new_root = only_child, "index root collapsed");
        Ok(())
    }
}
