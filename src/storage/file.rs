//! Page File
//!
//! A file of fixed-size pages preceded by one header block.
//!
//! ## Responsibilities
//! - Create/open page files and validate the file header
//! - Read and write whole pages
//! - Allocate pages from the free list (O(1)) or by appending
//! - Free pages by zero-filling them and pushing them on the free list
//! - Locate the current root by walking parent pointers from page 0
//! - Persist the row-id watermark of table files

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::ArgonError;

use super::page::{Page, PageId, PageLink, PageType, PAGE_SIZE};
use super::{FILE_HEADER_SIZE, FORMAT_VERSION, MAGIC};

/// Bytes of the header block covered by the checksum
const HEADER_PAYLOAD: usize = 16;

// =============================================================================
// File Header
// =============================================================================

/// Mutable state stored in the header block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileHeader {
    /// First page of the free list
    free_head: Option<PageId>,
    /// Highest row id ever assigned (table files)
    watermark: u32,
}

impl FileHeader {
    fn to_bytes(self) -> [u8; FILE_HEADER_SIZE] {
        let mut block = [0u8; FILE_HEADER_SIZE];
        block[0..4].copy_from_slice(MAGIC);
        block[4..6].copy_from_slice(&FORMAT_VERSION.to_be_bytes());
        block[6..8].copy_from_slice(&(PAGE_SIZE as u16).to_be_bytes());
        block[8..12].copy_from_slice(&self.free_head.unwrap_or(super::NO_PAGE).to_be_bytes());
        block[12..16].copy_from_slice(&self.watermark.to_be_bytes());
        let crc = crc32fast::hash(&block[..HEADER_PAYLOAD]);
        block[16..20].copy_from_slice(&crc.to_be_bytes());
        block
    }

    fn from_bytes(block: &[u8; FILE_HEADER_SIZE]) -> Result<Self> {
        if &block[0..4] != MAGIC {
            return Err(ArgonError::Corruption(format!(
                "Invalid page file magic: expected ARGN, got {:?}",
                &block[0..4]
            )));
        }

        let stored_crc = be_u32(&block[16..20]);
        let crc = crc32fast::hash(&block[..HEADER_PAYLOAD]);
        if stored_crc != crc {
            return Err(ArgonError::Corruption(format!(
                "File header checksum mismatch: stored {:#010x}, computed {:#010x}",
                stored_crc, crc
            )));
        }

        let version = u16::from_be_bytes([block[4], block[5]]);
        if version != FORMAT_VERSION {
            return Err(ArgonError::Corruption(format!(
                "Unsupported page file version: {}",
                version
            )));
        }

        let page_size = u16::from_be_bytes([block[6], block[7]]) as usize;
        if page_size != PAGE_SIZE {
            return Err(ArgonError::Corruption(format!(
                "Unsupported page size: {} (expected {})",
                page_size, PAGE_SIZE
            )));
        }

        let free_head = be_u32(&block[8..12]);
        Ok(Self {
            free_head: (free_head != super::NO_PAGE).then_some(free_head),
            watermark: be_u32(&block[12..16]),
        })
    }
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

// =============================================================================
// Page File
// =============================================================================

/// Exclusive handle on one `.tbl` or `.ndx` file
#[derive(Debug)]
pub struct PageFile {
    path: PathBuf,
    file: File,
    header: FileHeader,
    page_count: u32,
    sync_on_write: bool,
}

impl PageFile {
    /// Create a new, empty page file (truncating any existing file)
    pub fn create(path: &Path, sync_on_write: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let mut page_file = Self {
            path: path.to_path_buf(),
            file,
            header: FileHeader {
                free_head: None,
                watermark: 0,
            },
            page_count: 0,
            sync_on_write,
        };
        page_file.write_header()?;

        tracing::debug!(path = %path.display(), "page file created");
        Ok(page_file)
    }

    /// Open an existing page file and validate its header
    pub fn open(path: &Path, sync_on_write: bool) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let len = file.metadata()?.len() as usize;
        if len < FILE_HEADER_SIZE || (len - FILE_HEADER_SIZE) % PAGE_SIZE != 0 {
            return Err(ArgonError::Corruption(format!(
                "{}: file length {} is not a whole number of pages",
                path.display(),
                len
            )));
        }

        let mut block = [0u8; FILE_HEADER_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut block)?;
        let header = FileHeader::from_bytes(&block)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            header,
            page_count: ((len - FILE_HEADER_SIZE) / PAGE_SIZE) as u32,
            sync_on_write,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of pages in the file, free pages included
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    // -------------------------------------------------------------------------
    // Page I/O
    // -------------------------------------------------------------------------

    pub fn read_page(&self, id: PageId) -> Result<Page> {
        if id >= self.page_count {
            return Err(ArgonError::InvalidPage(id));
        }
        let mut data = [0u8; PAGE_SIZE];
        let mut file = &self.file;
        file.seek(SeekFrom::Start(Self::page_offset(id)))?;
        file.read_exact(&mut data)?;
        Ok(Page::from_bytes(id, data))
    }

    pub fn write_page(&mut self, page: &Page) -> Result<()> {
        if page.id() >= self.page_count {
            return Err(ArgonError::InvalidPage(page.id()));
        }
        self.write_raw(page)
    }

    /// Rewrite the parent pointer of `id`
    pub fn set_parent(&mut self, id: PageId, parent: Option<PageId>) -> Result<()> {
        let mut page = self.read_page(id)?;
        page.set_parent(parent);
        self.write_page(&page)
    }

    // -------------------------------------------------------------------------
    // Allocation
    // -------------------------------------------------------------------------

    /// Allocate a page and initialise its header
    ///
    /// Reuses the head of the free list when there is one, otherwise
    /// appends a page at the end of the file.
    pub fn create_page(&mut self, page_type: PageType, parent: Option<PageId>) -> Result<Page> {
        let id = match self.header.free_head {
            Some(id) => {
                let free = self.read_page(id)?;
                let next = match free.link()? {
                    PageLink::NextFree(next) => next,
                    other => {
                        return Err(ArgonError::Corruption(format!(
                            "Free list entry {} is not a free page (link {:?})",
                            id, other
                        )))
                    }
                };
                self.header.free_head = next;
                self.write_header()?;
                id
            }
            None => {
                self.page_count += 1;
                self.page_count - 1
            }
        };

        let page = Page::new(id, page_type, parent);
        self.write_raw(&page)?;

        tracing::debug!(file = %self.path.display(), page = id, ?page_type, "page allocated");
        Ok(page)
    }

    /// Zero-fill a page and push it on the free list
    ///
    /// Page 0 anchors every tree and can never be freed.
    pub fn delete_page(&mut self, id: PageId) -> Result<()> {
        if id == 0 {
            return Err(ArgonError::Storage("Page 0 cannot be deleted".to_string()));
        }
        if id >= self.page_count {
            return Err(ArgonError::InvalidPage(id));
        }

        let mut page = Page::from_bytes(id, [0u8; PAGE_SIZE]);
        page.set_page_type(PageType::Empty);
        page.set_link(PageLink::NextFree(self.header.free_head));
        self.write_raw(&page)?;

        self.header.free_head = Some(id);
        self.write_header()?;

        tracing::debug!(file = %self.path.display(), page = id, "page freed");
        Ok(())
    }

    /// Pages currently on the free list, head first
    pub fn free_pages(&self) -> Result<Vec<PageId>> {
        let mut pages = Vec::new();
        let mut next = self.header.free_head;
        while let Some(id) = next {
            if pages.len() as u32 > self.page_count {
                return Err(ArgonError::Corruption("Free list contains a cycle".to_string()));
            }
            pages.push(id);
            next = match self.read_page(id)?.link()? {
                PageLink::NextFree(next) => next,
                other => {
                    return Err(ArgonError::Corruption(format!(
                        "Free list entry {} is not a free page (link {:?})",
                        id, other
                    )))
                }
            };
        }
        Ok(pages)
    }

    // -------------------------------------------------------------------------
    // Tree Helpers
    // -------------------------------------------------------------------------

    /// Current root: follow parent pointers up from page 0
    pub fn root_page(&self) -> Result<PageId> {
        let mut id = 0;
        for _ in 0..=self.page_count {
            match self.read_page(id)?.parent() {
                Some(parent) => id = parent,
                None => return Ok(id),
            }
        }
        Err(ArgonError::Corruption(format!(
            "{}: parent pointers form a cycle",
            self.path.display()
        )))
    }

    /// Highest row id ever assigned in this file
    pub fn watermark(&self) -> u32 {
        self.header.watermark
    }

    pub fn set_watermark(&mut self, watermark: u32) -> Result<()> {
        self.header.watermark = watermark;
        self.write_header()
    }

    /// Flush file contents to disk
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn page_offset(id: PageId) -> u64 {
        (FILE_HEADER_SIZE + id as usize * PAGE_SIZE) as u64
    }

    fn write_raw(&mut self, page: &Page) -> Result<()> {
        self.file.seek(SeekFrom::Start(Self::page_offset(page.id())))?;
        self.file.write_all(page.as_bytes())?;
        if self.sync_on_write {
            self.file.sync_data()?;
        }
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.header.to_bytes())?;
        if self.sync_on_write {
            self.file.sync_data()?;
        }
        Ok(())
    }
}
