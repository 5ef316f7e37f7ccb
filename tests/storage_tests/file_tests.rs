//! Tests for PageFile
//!
//! These tests verify:
//! - File header creation and validation (magic, checksum, length)
//! - Page read/write at the right offsets
//! - Allocation by appending and by reusing freed pages
//! - Page 0 can never be freed
//! - Root discovery through parent pointers
//! - Watermark persistence

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;

use argonbase::storage::{PageFile, PageLink, PageType, FILE_HEADER_SIZE, PAGE_SIZE};
use argonbase::ArgonError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_file() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.tbl");
    (temp_dir, path)
}

fn overwrite(path: &PathBuf, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
}

// =============================================================================
// Header Tests
// =============================================================================

#[test]
fn test_create_writes_header_block() {
    let (_temp, path) = setup_temp_file();
    let file = PageFile::create(&path, false).unwrap();

    assert_eq!(file.page_count(), 0);
    assert_eq!(file.watermark(), 0);

    let bytes = fs::read(&path).unwrap();
    assert_eq!(bytes.len(), FILE_HEADER_SIZE);
    assert_eq!(&bytes[0..4], b"ARGN");
    assert_eq!(&bytes[4..6], &1u16.to_be_bytes());
    assert_eq!(&bytes[6..8], &(PAGE_SIZE as u16).to_be_bytes());
    assert_eq!(&bytes[8..12], &[0xFF; 4]);
}

#[test]
fn test_open_rejects_bad_magic() {
    let (_temp, path) = setup_temp_file();
    PageFile::create(&path, false).unwrap();
    overwrite(&path, 0, b"NOPE");

    let err = PageFile::open(&path, false).unwrap_err();
    assert!(matches!(err, ArgonError::Corruption(_)));
}

#[test]
fn test_open_rejects_bad_checksum() {
    let (_temp, path) = setup_temp_file();
    PageFile::create(&path, false).unwrap();
    // flip the watermark without updating the CRC
    overwrite(&path, 12, &[0, 0, 0, 42]);

    let err = PageFile::open(&path, false).unwrap_err();
    assert!(matches!(err, ArgonError::Corruption(_)));
}

#[test]
fn test_open_rejects_partial_page() {
    let (_temp, path) = setup_temp_file();
    {
        let mut file = PageFile::create(&path, false).unwrap();
        file.create_page(PageType::TableLeaf, None).unwrap();
    }
    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len((FILE_HEADER_SIZE + PAGE_SIZE / 2) as u64).unwrap();

    assert!(PageFile::open(&path, false).is_err());
}

// =============================================================================
// Page I/O Tests
// =============================================================================

#[test]
fn test_pages_live_after_header() {
    let (_temp, path) = setup_temp_file();
    let mut file = PageFile::create(&path, false).unwrap();
    file.create_page(PageType::TableLeaf, None).unwrap();
    let mut page = file.create_page(PageType::TableLeaf, Some(0)).unwrap();
    page.push_cell(&[0xAB; 16]).unwrap();
    file.write_page(&page).unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(bytes.len(), FILE_HEADER_SIZE + 2 * PAGE_SIZE);
    let page_1 = &bytes[FILE_HEADER_SIZE + PAGE_SIZE..];
    assert_eq!(page_1[0], PageType::TableLeaf as u8);
    assert_eq!(&page_1[PAGE_SIZE - 16..], &[0xAB; 16]);
}

#[test]
fn test_read_past_end_fails() {
    let (_temp, path) = setup_temp_file();
    let mut file = PageFile::create(&path, false).unwrap();
    file.create_page(PageType::TableLeaf, None).unwrap();

    assert!(matches!(file.read_page(1).unwrap_err(), ArgonError::InvalidPage(1)));
}

#[test]
fn test_reopen_preserves_pages() {
    let (_temp, path) = setup_temp_file();
    {
        let mut file = PageFile::create(&path, false).unwrap();
        let mut page = file.create_page(PageType::IndexLeaf, None).unwrap();
        page.push_cell(b"hello").unwrap();
        file.write_page(&page).unwrap();
    }

    let file = PageFile::open(&path, false).unwrap();
    assert_eq!(file.page_count(), 1);
    let page = file.read_page(0).unwrap();
    assert_eq!(page.page_type().unwrap(), PageType::IndexLeaf);
    assert_eq!(page.cell(0), b"hello");
}

// =============================================================================
// Allocation Tests
// =============================================================================

#[test]
fn test_freed_pages_are_reused() {
    let (_temp, path) = setup_temp_file();
    let mut file = PageFile::create(&path, false).unwrap();
    for _ in 0..4 {
        file.create_page(PageType::TableLeaf, None).unwrap();
    }

    file.delete_page(1).unwrap();
    file.delete_page(3).unwrap();
    assert_eq!(file.free_pages().unwrap(), vec![3, 1]);

    let freed = file.read_page(3).unwrap();
    assert_eq!(freed.page_type().unwrap(), PageType::Empty);
    assert_eq!(freed.link().unwrap(), PageLink::NextFree(Some(1)));
    assert_eq!(freed.cell_count(), 0);

    assert_eq!(file.create_page(PageType::TableLeaf, None).unwrap().id(), 3);
    assert_eq!(file.create_page(PageType::IndexLeaf, None).unwrap().id(), 1);
    assert_eq!(file.create_page(PageType::TableLeaf, None).unwrap().id(), 4);
    assert_eq!(file.page_count(), 5);
    assert!(file.free_pages().unwrap().is_empty());
}

#[test]
fn test_free_list_survives_reopen() {
    let (_temp, path) = setup_temp_file();
    {
        let mut file = PageFile::create(&path, false).unwrap();
        for _ in 0..3 {
            file.create_page(PageType::TableLeaf, None).unwrap();
        }
        file.delete_page(2).unwrap();
    }

    let mut file = PageFile::open(&path, false).unwrap();
    assert_eq!(file.free_pages().unwrap(), vec![2]);
    assert_eq!(file.create_page(PageType::TableLeaf, None).unwrap().id(), 2);
}

#[test]
fn test_page_zero_cannot_be_deleted() {
    let (_temp, path) = setup_temp_file();
    let mut file = PageFile::create(&path, false).unwrap();
    file.create_page(PageType::TableLeaf, None).unwrap();

    assert!(file.delete_page(0).is_err());
    assert_eq!(file.read_page(0).unwrap().page_type().unwrap(), PageType::TableLeaf);
}

// =============================================================================
// Tree Helper Tests
// =============================================================================

#[test]
fn test_root_page_follows_parents() {
    let (_temp, path) = setup_temp_file();
    let mut file = PageFile::create(&path, false).unwrap();
    file.create_page(PageType::TableLeaf, None).unwrap();
    assert_eq!(file.root_page().unwrap(), 0);

    let interior = file.create_page(PageType::TableInterior, None).unwrap();
    file.set_parent(0, Some(interior.id())).unwrap();
    let top = file.create_page(PageType::TableInterior, None).unwrap();
    file.set_parent(interior.id(), Some(top.id())).unwrap();

    assert_eq!(file.root_page().unwrap(), top.id());
}

#[test]
fn test_watermark_persists() {
    let (_temp, path) = setup_temp_file();
    {
        let mut file = PageFile::create(&path, false).unwrap();
        file.set_watermark(17).unwrap();
    }
    let file = PageFile::open(&path, true).unwrap();
    assert_eq!(file.watermark(), 17);
}
