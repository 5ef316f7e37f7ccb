//! Point and range search over the index tree
//!
//! A range search starts at the position of the target value and walks
//! outward: first across the cells (and, on interior pages, the child
//! subtrees) on the target page, then up the parent chain, collecting every
//! subtree that lies entirely on the requested side. Subtrees are gathered
//! with an explicit stack rather than recursion.

use crate::error::Result;
use crate::record::{Operator, RowId, Value};
use crate::storage::PageId;

use super::super::{child_at, child_slot};
use super::{IndexCell, IndexLocation, IndexTree};

/// Which side of the target a traversal collects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Below,
    Above,
}

impl IndexTree {
    /// Row ids whose value satisfies `stored <op> value`, ascending
    ///
    /// NULL never matches, so a NULL target yields no rows.
    pub fn search(&self, op: Operator, value: &Value) -> Result<Vec<RowId>> {
        if value.is_null() {
            return Ok(Vec::new());
        }

        let location = self.find_page_and_index(value)?;
        let mut row_ids = Vec::new();
        match op {
            Operator::Equal => self.collect_equal(&location, &mut row_ids)?,
            Operator::Less => self.collect_side(&location, Side::Below, &mut row_ids)?,
            Operator::Greater => self.collect_side(&location, Side::Above, &mut row_ids)?,
            Operator::LessEqual => {
                self.collect_side(&location, Side::Below, &mut row_ids)?;
                self.collect_equal(&location, &mut row_ids)?;
            }
            Operator::GreaterEqual => {
                self.collect_equal(&location, &mut row_ids)?;
                self.collect_side(&location, Side::Above, &mut row_ids)?;
            }
            Operator::NotEqual => {
                self.collect_side(&location, Side::Below, &mut row_ids)?;
                self.collect_side(&location, Side::Above, &mut row_ids)?;
            }
        }

        row_ids.sort_unstable();
        Ok(row_ids)
    }

    fn collect_equal(&self, location: &IndexLocation, out: &mut Vec<RowId>) -> Result<()> {
        if let (true, Some(index)) = (location.found, location.index) {
            let page = self.file.read_page(location.page)?;
            out.extend(IndexCell::read(&page, index)?.entry.row_ids);
        }
        Ok(())
    }

    /// Everything strictly below or strictly above the target position
    fn collect_side(&self, location: &IndexLocation, side: Side, out: &mut Vec<RowId>) -> Result<()> {
        let page = self.file.read_page(location.page)?;
        let count = page.cell_count();
        let interior = page.page_type()?.is_interior();

        // cells on the target page strictly on the requested side, and the
        // child slots whose subtrees lie entirely on that side
        let (cells, slots) = match (side, location.index) {
            (Side::Below, None) => (0..0, 0..0),
            (Side::Below, Some(i)) => {
                let end = if location.found { i } else { i + 1 };
                (0..end, 0..end + 1)
            }
            (Side::Above, None) => (0..count, 0..count + 1),
            (Side::Above, Some(i)) => (i + 1..count, i + 1..count + 1),
        };

        for i in cells {
            out.extend(IndexCell::read(&page, i)?.entry.row_ids);
        }
        if interior {
            for slot in slots {
                self.collect_subtree(child_at(&page, slot)?, out)?;
            }
        }

        // climb: siblings of each ancestor on the requested side
        let mut child = page.id();
        let mut parent_id = page.parent();
        while let Some(id) = parent_id {
            let parent = self.file.read_page(id)?;
            let parent_count = parent.cell_count();
            let slot = child_slot(&parent, child)?;
            let (cells, slots) = match side {
                Side::Below => (0..slot, 0..slot),
                Side::Above => (slot..parent_count, slot + 1..parent_count + 1),
            };
            for i in cells {
                out.extend(IndexCell::read(&parent, i)?.entry.row_ids);
            }
            for s in slots {
                self.collect_subtree(child_at(&parent, s)?, out)?;
            }
            child = id;
            parent_id = parent.parent();
        }
        Ok(())
    }

    /// Every row id in the subtree rooted at `root`
    fn collect_subtree(&self, root: PageId, out: &mut Vec<RowId>) -> Result<()> {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let page = self.file.read_page(id)?;
            for i in 0..page.cell_count() {
                out.extend(IndexCell::read(&page, i)?.entry.row_ids);
            }
            if page.page_type()?.is_interior() {
                for slot in 0..=page.cell_count() {
                    stack.push(child_at(&page, slot)?);
                }
            }
        }
        Ok(())
    }
}
