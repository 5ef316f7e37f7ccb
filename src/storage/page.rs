//! Page
//!
//! In-memory image of one fixed-size page with slotted-cell semantics.
//!
//! ## Layout
//! ```text
//! 0x00 ┌──────────┬──────────┬─────────────┬───────────────┐
//!      │ Type (1) │ Rsvd (1) │ Cells (2)   │ ContentStart  │
//! 0x06 ├──────────┴──────────┼─────────────┴───────────────┤
//!      │ Link (4)            │ Parent (4)                  │
//! 0x0E ├──────────┬──────────┴─────────────────────────────┤
//!      │ Rsvd (2) │ Cell pointer array (2 bytes per cell) →│
//! 0x10 ├──────────┘                                        │
//!      │                  free space                       │
//!      │                                                   │
//!      │← cell N-1 │ ... │ cell 1 │ cell 0                 │
//! 0x200└───────────────────────────────────────────────────┘
//! ```
//!
//! Cell content is kept contiguous and in index order: cell 0 ends at the
//! page end and every following cell sits directly below its predecessor.
//! The size of a cell is therefore the distance between its offset and the
//! offset of the cell before it, and no page ever has fragmented free space.

use crate::error::Result;
use crate::ArgonError;

// =============================================================================
// Constants
// =============================================================================

/// Size of every page, in bytes
pub const PAGE_SIZE: usize = 512;

/// Size of the fixed page header preceding the cell pointer array
pub const PAGE_HEADER_SIZE: usize = 16;

/// Bytes used by one entry of the cell pointer array
pub const CELL_POINTER_SIZE: usize = 2;

/// Page number within a file
pub type PageId = u32;

/// On-disk sentinel for "no page" (no parent, no sibling, end of free list)
pub const NO_PAGE: PageId = u32::MAX;

const TYPE_OFFSET: usize = 0x00;
const CELL_COUNT_OFFSET: usize = 0x02;
const CONTENT_START_OFFSET: usize = 0x04;
const LINK_OFFSET: usize = 0x06;
const PARENT_OFFSET: usize = 0x0A;

// =============================================================================
// Page Type
// =============================================================================

/// Page type tag stored in the first header byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageType {
    Empty = 0x00,
    IndexInterior = 0x02,
    TableInterior = 0x05,
    TableLeaf = 0x0A,
    IndexLeaf = 0x0D,
    Invalid = 0xFF,
}

impl PageType {
    pub fn from_u8(tag: u8) -> Result<Self> {
        match tag {
            0x00 => Ok(PageType::Empty),
            0x02 => Ok(PageType::IndexInterior),
            0x05 => Ok(PageType::TableInterior),
            0x0A => Ok(PageType::TableLeaf),
            0x0D => Ok(PageType::IndexLeaf),
            0xFF => Ok(PageType::Invalid),
            other => Err(ArgonError::Corruption(format!(
                "Unknown page type tag: {:#04x}",
                other
            ))),
        }
    }

    pub fn is_leaf(self) -> bool {
        matches!(self, PageType::TableLeaf | PageType::IndexLeaf)
    }

    pub fn is_interior(self) -> bool {
        matches!(self, PageType::TableInterior | PageType::IndexInterior)
    }
}

// =============================================================================
// Page Link
// =============================================================================

/// Interpretation of the header link field, which depends on the page type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLink {
    /// Interior pages: the rightmost child
    Child(PageId),
    /// Leaf pages: the right sibling, if any
    Sibling(Option<PageId>),
    /// Free pages: the next page on the free list, if any
    NextFree(Option<PageId>),
}

fn optional(raw: u32) -> Option<PageId> {
    (raw != NO_PAGE).then_some(raw)
}

// =============================================================================
// Page
// =============================================================================

/// One page image plus the page number it was read from
#[derive(Clone)]
pub struct Page {
    id: PageId,
    data: Box<[u8; PAGE_SIZE]>,
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("id", &self.id)
            .field("type", &self.data[TYPE_OFFSET])
            .field("cells", &self.cell_count())
            .field("content_start", &self.content_start())
            .finish()
    }
}

impl Page {
    /// Create an empty page of the given type
    ///
    /// The link field starts as "none" (`0xFFFFFFFF`), content start at the
    /// page end.
    pub fn new(id: PageId, page_type: PageType, parent: Option<PageId>) -> Self {
        let mut page = Self {
            id,
            data: Box::new([0u8; PAGE_SIZE]),
        };
        page.data[TYPE_OFFSET] = page_type as u8;
        page.set_content_start(PAGE_SIZE);
        page.write_u32(LINK_OFFSET, NO_PAGE);
        page.set_parent(parent);
        page
    }

    /// Wrap raw bytes read from disk
    pub fn from_bytes(id: PageId, data: [u8; PAGE_SIZE]) -> Self {
        Self {
            id,
            data: Box::new(data),
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    // -------------------------------------------------------------------------
    // Header Accessors
    // -------------------------------------------------------------------------

    pub fn page_type(&self) -> Result<PageType> {
        PageType::from_u8(self.data[TYPE_OFFSET])
    }

    /// Change the page type tag (used when an index root turns interior)
    pub fn set_page_type(&mut self, page_type: PageType) {
        self.data[TYPE_OFFSET] = page_type as u8;
    }

    pub fn cell_count(&self) -> usize {
        self.read_u16(CELL_COUNT_OFFSET) as usize
    }

    fn set_cell_count(&mut self, count: usize) {
        self.write_u16(CELL_COUNT_OFFSET, count as u16);
    }

    /// Offset of the lowest byte of cell content (512 for an empty page)
    pub fn content_start(&self) -> usize {
        match self.read_u16(CONTENT_START_OFFSET) {
            // zero-filled free page
            0 => PAGE_SIZE,
            start => start as usize,
        }
    }

    fn set_content_start(&mut self, start: usize) {
        self.write_u16(CONTENT_START_OFFSET, start as u16);
    }

    /// Raw link field
    pub fn raw_link(&self) -> u32 {
        self.read_u32(LINK_OFFSET)
    }

    /// Link field interpreted according to the page type
    pub fn link(&self) -> Result<PageLink> {
        let raw = self.raw_link();
        match self.page_type()? {
            PageType::TableInterior | PageType::IndexInterior => {
                if raw == NO_PAGE {
                    return Err(ArgonError::Corruption(format!(
                        "Interior page {} has no rightmost child",
                        self.id
                    )));
                }
                Ok(PageLink::Child(raw))
            }
            PageType::TableLeaf | PageType::IndexLeaf => Ok(PageLink::Sibling(optional(raw))),
            PageType::Empty => Ok(PageLink::NextFree(optional(raw))),
            PageType::Invalid => Err(ArgonError::Corruption(format!(
                "Page {} is marked invalid",
                self.id
            ))),
        }
    }

    pub fn set_link(&mut self, link: PageLink) {
        let raw = match link {
            PageLink::Child(id) => id,
            PageLink::Sibling(id) | PageLink::NextFree(id) => id.unwrap_or(NO_PAGE),
        };
        self.write_u32(LINK_OFFSET, raw);
    }

    /// Rightmost child of an interior page
    pub fn rightmost_child(&self) -> Result<PageId> {
        match self.link()? {
            PageLink::Child(id) => Ok(id),
            other => Err(ArgonError::Corruption(format!(
                "Page {} is not an interior page (link {:?})",
                self.id, other
            ))),
        }
    }

    /// Right sibling of a leaf page
    pub fn right_sibling(&self) -> Result<Option<PageId>> {
        match self.link()? {
            PageLink::Sibling(id) => Ok(id),
            other => Err(ArgonError::Corruption(format!(
                "Page {} is not a leaf page (link {:?})",
                self.id, other
            ))),
        }
    }

    pub fn parent(&self) -> Option<PageId> {
        optional(self.read_u32(PARENT_OFFSET))
    }

    pub fn set_parent(&mut self, parent: Option<PageId>) {
        self.write_u32(PARENT_OFFSET, parent.unwrap_or(NO_PAGE));
    }

    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    // -------------------------------------------------------------------------
    // Space Accounting
    // -------------------------------------------------------------------------

    /// Free bytes between the pointer array and the content area
    pub fn free_space(&self) -> usize {
        self.content_start() - (PAGE_HEADER_SIZE + CELL_POINTER_SIZE * self.cell_count())
    }

    /// Bytes used by cell content plus pointers
    pub fn used_space(&self) -> usize {
        PAGE_SIZE - PAGE_HEADER_SIZE - self.free_space()
    }

    /// True if a new cell of `cell_size` bytes (plus its pointer) would not
    /// fit, i.e. the page must be split before the insert
    pub fn needs_split(&self, cell_size: usize) -> bool {
        cell_size + CELL_POINTER_SIZE > self.free_space()
    }

    /// True if cell `index` can be rewritten with `new_size` bytes in place
    pub fn can_resize(&self, index: usize, new_size: usize) -> bool {
        let old_size = self.cell_size(index);
        new_size <= old_size || new_size - old_size <= self.free_space()
    }

    // -------------------------------------------------------------------------
    // Cells
    // -------------------------------------------------------------------------

    /// Byte offset of cell `index` within the page
    pub fn cell_offset(&self, index: usize) -> usize {
        self.read_u16(PAGE_HEADER_SIZE + CELL_POINTER_SIZE * index) as usize
    }

    fn set_cell_offset(&mut self, index: usize, offset: usize) {
        self.write_u16(PAGE_HEADER_SIZE + CELL_POINTER_SIZE * index, offset as u16);
    }

    /// Upper bound (exclusive) of cell `index`'s content
    fn cell_end(&self, index: usize) -> usize {
        if index == 0 {
            PAGE_SIZE
        } else {
            self.cell_offset(index - 1)
        }
    }

    pub fn cell_size(&self, index: usize) -> usize {
        self.cell_end(index) - self.cell_offset(index)
    }

    pub fn cell(&self, index: usize) -> &[u8] {
        &self.data[self.cell_offset(index)..self.cell_end(index)]
    }

    pub fn cell_mut(&mut self, index: usize) -> &mut [u8] {
        let (start, end) = (self.cell_offset(index), self.cell_end(index));
        &mut self.data[start..end]
    }

    /// Move the content of every cell after `preceding` by `delta` bytes.
    ///
    /// A positive `delta` moves content toward the header, opening a gap of
    /// `delta` bytes directly below `preceding` (or at the page end when
    /// `preceding` is `None`). A negative `delta` moves content toward the
    /// page end, overwriting the `|delta|` bytes directly below `preceding`.
    ///
    /// `count_delta` adjusts the pointer array: `+1` inserts a pointer for the
    /// opened gap at `preceding + 1`, `-1` drops the pointer at
    /// `preceding + 1`, `0` resizes cell `preceding + 1` in place.
    pub fn cell_shift(&mut self, preceding: Option<usize>, delta: isize, count_delta: i8) -> Result<()> {
        let count = self.cell_count();
        let first = preceding.map_or(0, |i| i + 1);
        if first > count || (count_delta <= 0 && first >= count) {
            return Err(ArgonError::Storage(format!(
                "Cell shift after {:?} out of range on page {} ({} cells)",
                preceding, self.id, count
            )));
        }

        let pointer_growth = if count_delta > 0 { CELL_POINTER_SIZE } else { 0 };
        let needed = delta.max(0) as usize + pointer_growth;
        if needed > self.free_space() {
            return Err(ArgonError::PageOverflow {
                page: self.id,
                needed,
                available: self.free_space(),
            });
        }

        let boundary = match preceding {
            Some(i) => self.cell_offset(i),
            None => PAGE_SIZE,
        };
        let old_start = self.content_start();
        let magnitude = delta.unsigned_abs();

        if delta > 0 {
            self.data.copy_within(old_start..boundary, old_start - magnitude);
            self.data[boundary - magnitude..boundary].fill(0);
            self.set_content_start(old_start - magnitude);
        } else if delta < 0 {
            if magnitude > boundary - old_start {
                return Err(ArgonError::Storage(format!(
                    "Cell shift of {} bytes exceeds content on page {}",
                    delta, self.id
                )));
            }
            self.data.copy_within(old_start..boundary - magnitude, old_start + magnitude);
            self.data[old_start..old_start + magnitude].fill(0);
            self.set_content_start(old_start + magnitude);
        }

        let moved = |offset: usize| -> usize {
            if delta >= 0 {
                offset - magnitude
            } else {
                offset + magnitude
            }
        };

        match count_delta {
            1 => {
                for j in (first..count).rev() {
                    let offset = moved(self.cell_offset(j));
                    self.set_cell_offset(j + 1, offset);
                }
                self.set_cell_offset(first, boundary - magnitude);
                self.set_cell_count(count + 1);
            }
            -1 => {
                for j in first + 1..count {
                    let offset = moved(self.cell_offset(j));
                    self.set_cell_offset(j - 1, offset);
                }
                self.set_cell_offset(count - 1, 0);
                self.set_cell_count(count - 1);
            }
            _ => {
                for j in first..count {
                    let offset = moved(self.cell_offset(j));
                    self.set_cell_offset(j, offset);
                }
            }
        }

        Ok(())
    }

    /// Insert a cell at `index`, shifting later cells down
    pub fn insert_cell(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        self.cell_shift(index.checked_sub(1), bytes.len() as isize, 1)?;
        let offset = self.cell_offset(index);
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        tracing::trace!(page = self.id, index, size = bytes.len(), "cell inserted");
        Ok(())
    }

    /// Append a cell after the last one
    pub fn push_cell(&mut self, bytes: &[u8]) -> Result<()> {
        self.insert_cell(self.cell_count(), bytes)
    }

    /// Remove cell `index`, compacting the content area
    pub fn remove_cell(&mut self, index: usize) -> Result<Vec<u8>> {
        let removed = self.cell(index).to_vec();
        self.cell_shift(index.checked_sub(1), -(removed.len() as isize), -1)?;
        tracing::trace!(page = self.id, index, size = removed.len(), "cell removed");
        Ok(removed)
    }

    /// Rewrite cell `index` with new content of possibly different size
    pub fn replace_cell(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        let delta = bytes.len() as isize - self.cell_size(index) as isize;
        if delta != 0 {
            self.cell_shift(index.checked_sub(1), delta, 0)?;
        }
        self.cell_mut(index).copy_from_slice(bytes);
        Ok(())
    }

    /// Remove cells `from..` and return their bytes in order
    pub fn split_off_cells(&mut self, from: usize) -> Vec<Vec<u8>> {
        let count = self.cell_count();
        if from >= count {
            return Vec::new();
        }
        let cells: Vec<Vec<u8>> = (from..count).map(|i| self.cell(i).to_vec()).collect();
        let new_start = self.cell_end(from);
        let old_start = self.content_start();
        self.data[old_start..new_start].fill(0);
        for i in from..count {
            self.set_cell_offset(i, 0);
        }
        self.set_content_start(new_start);
        self.set_cell_count(from);
        cells
    }

    /// Move cells `from..` of this page to the end of `dest`
    pub fn transfer_cells(&mut self, from: usize, dest: &mut Page) -> Result<()> {
        for cell in self.split_off_cells(from) {
            dest.push_cell(&cell)?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Private Helpers
    // -------------------------------------------------------------------------

    fn read_u16(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.data[offset], self.data[offset + 1]])
    }

    fn write_u16(&mut self, offset: usize, value: u16) {
        self.data[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }

    fn read_u32(&self, offset: usize) -> u32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.data[offset..offset + 4]);
        u32::from_be_bytes(raw)
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }
}
