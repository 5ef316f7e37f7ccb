//! Tests for Page
//!
//! These tests verify:
//! - Header fields of new pages
//! - Tagged interpretation of the link field
//! - Cell insert/remove/replace through cell_shift
//! - Free space accounting and the split trigger
//! - Overflow errors instead of partial shifts

use argonbase::storage::{Page, PageLink, PageType, CELL_POINTER_SIZE, PAGE_HEADER_SIZE, PAGE_SIZE};
use argonbase::ArgonError;

// =============================================================================
// Helper Functions
// =============================================================================

fn leaf_with_cells(sizes: &[usize]) -> Page {
    let mut page = Page::new(1, PageType::TableLeaf, None);
    for (i, size) in sizes.iter().enumerate() {
        page.push_cell(&vec![i as u8 + 1; *size]).unwrap();
    }
    page
}

/// Cells must tile the content area from content_start to the page end
fn assert_contiguous(page: &Page) {
    let mut end = PAGE_SIZE;
    for i in 0..page.cell_count() {
        assert_eq!(page.cell_offset(i) + page.cell_size(i), end, "cell {} not contiguous", i);
        end = page.cell_offset(i);
    }
    assert_eq!(end, page.content_start());
    assert_eq!(
        page.free_space(),
        page.content_start() - PAGE_HEADER_SIZE - CELL_POINTER_SIZE * page.cell_count()
    );
}

// =============================================================================
// Header Tests
// =============================================================================

#[test]
fn test_page_type_tags() {
    assert_eq!(PageType::IndexInterior as u8, 0x02);
    assert_eq!(PageType::TableInterior as u8, 0x05);
    assert_eq!(PageType::TableLeaf as u8, 0x0A);
    assert_eq!(PageType::IndexLeaf as u8, 0x0D);
    assert_eq!(PageType::from_u8(0x0D).unwrap(), PageType::IndexLeaf);
    assert!(PageType::from_u8(0x07).is_err());
}

#[test]
fn test_header_layout_is_big_endian() {
    let mut page = Page::new(4, PageType::TableInterior, Some(0x0102_0304));
    page.set_link(PageLink::Child(9));
    page.push_cell(&[0xAA; 8]).unwrap();

    let bytes = page.as_bytes();
    assert_eq!(bytes[0x00], 0x05);
    assert_eq!(&bytes[0x02..0x04], &[0, 1]);
    assert_eq!(&bytes[0x04..0x06], &((PAGE_SIZE - 8) as u16).to_be_bytes());
    assert_eq!(&bytes[0x06..0x0A], &[0, 0, 0, 9]);
    assert_eq!(&bytes[0x0A..0x0E], &[1, 2, 3, 4]);
    assert_eq!(&bytes[0x10..0x12], &((PAGE_SIZE - 8) as u16).to_be_bytes());
}

#[test]
fn test_link_depends_on_page_type() {
    let mut leaf = Page::new(0, PageType::IndexLeaf, None);
    assert_eq!(leaf.link().unwrap(), PageLink::Sibling(None));
    leaf.set_link(PageLink::Sibling(Some(5)));
    assert_eq!(leaf.right_sibling().unwrap(), Some(5));
    assert!(leaf.rightmost_child().is_err());

    let mut interior = Page::new(2, PageType::IndexInterior, None);
    assert!(interior.link().is_err(), "interior page without a rightmost child");
    interior.set_link(PageLink::Child(7));
    assert_eq!(interior.rightmost_child().unwrap(), 7);
    assert!(interior.right_sibling().is_err());
}

#[test]
fn test_root_has_no_parent() {
    let root = Page::new(0, PageType::TableLeaf, None);
    assert!(root.is_root());

    let mut child = Page::new(3, PageType::TableLeaf, Some(1));
    assert!(!child.is_root());
    child.set_parent(None);
    assert!(child.is_root());
}

// =============================================================================
// Cell Tests
// =============================================================================

#[test]
fn test_insert_keeps_index_order() {
    let mut page = leaf_with_cells(&[10, 30]);
    page.insert_cell(1, &[9; 20]).unwrap();
    page.insert_cell(0, &[8; 5]).unwrap();

    assert_eq!(page.cell_count(), 4);
    assert_eq!(page.cell(0), &[8; 5][..]);
    assert_eq!(page.cell(1), &[1; 10][..]);
    assert_eq!(page.cell(2), &[9; 20][..]);
    assert_eq!(page.cell(3), &[2; 30][..]);
    assert_contiguous(&page);
}

#[test]
fn test_remove_compacts_content() {
    let mut page = leaf_with_cells(&[10, 20, 30]);
    let free_before = page.free_space();

    let removed = page.remove_cell(1).unwrap();

    assert_eq!(removed, vec![2; 20]);
    assert_eq!(page.cell_count(), 2);
    assert_eq!(page.cell(0), &[1; 10][..]);
    assert_eq!(page.cell(1), &[3; 30][..]);
    assert_eq!(page.free_space(), free_before + 20 + CELL_POINTER_SIZE);
    assert_contiguous(&page);
}

#[test]
fn test_remove_every_cell_restores_empty_page() {
    let mut page = leaf_with_cells(&[12, 7, 40]);
    while page.cell_count() > 0 {
        page.remove_cell(0).unwrap();
    }
    assert_eq!(page.content_start(), PAGE_SIZE);
    assert_eq!(page.free_space(), PAGE_SIZE - PAGE_HEADER_SIZE);
}

#[test]
fn test_replace_cell_grows_and_shrinks() {
    let mut page = leaf_with_cells(&[10, 20, 30]);

    page.replace_cell(1, &[7; 26]).unwrap();
    assert_eq!(page.cell(1), &[7; 26][..]);
    assert_eq!(page.cell(2), &[3; 30][..]);
    assert_contiguous(&page);

    page.replace_cell(1, &[6; 4]).unwrap();
    assert_eq!(page.cell(0), &[1; 10][..]);
    assert_eq!(page.cell(1), &[6; 4][..]);
    assert_eq!(page.cell(2), &[3; 30][..]);
    assert_contiguous(&page);
}

#[test]
fn test_cell_shift_opens_gap_for_new_cell() {
    let mut page = leaf_with_cells(&[10, 20]);
    page.cell_shift(Some(0), 6, 1).unwrap();

    assert_eq!(page.cell_count(), 3);
    assert_eq!(page.cell_size(1), 6);
    assert_eq!(page.cell(1), &[0; 6][..]);
    assert_eq!(page.cell(2), &[2; 20][..]);
    assert_contiguous(&page);
}

#[test]
fn test_split_off_and_transfer() {
    let mut left = leaf_with_cells(&[10, 20, 30, 40]);
    let mut right = Page::new(2, PageType::TableLeaf, None);

    left.transfer_cells(2, &mut right).unwrap();

    assert_eq!(left.cell_count(), 2);
    assert_eq!(right.cell_count(), 2);
    assert_eq!(right.cell(0), &[3; 30][..]);
    assert_eq!(right.cell(1), &[4; 40][..]);
    assert_contiguous(&left);
    assert_contiguous(&right);
}

// =============================================================================
// Capacity Tests
// =============================================================================

#[test]
fn test_needs_split_counts_pointer() {
    let page = leaf_with_cells(&[200, 200]);
    let free = page.free_space();
    assert_eq!(free, PAGE_SIZE - PAGE_HEADER_SIZE - 400 - 2 * CELL_POINTER_SIZE);

    assert!(!page.needs_split(free - CELL_POINTER_SIZE));
    assert!(page.needs_split(free - CELL_POINTER_SIZE + 1));
}

#[test]
fn test_cell_shift_beyond_free_space_fails() {
    let mut page = leaf_with_cells(&[200, 200]);
    let before = page.as_bytes().to_vec();
    let free = page.free_space();

    let err = page.insert_cell(2, &vec![9; free]).unwrap_err();
    assert!(matches!(err, ArgonError::PageOverflow { .. }));
    assert_eq!(page.as_bytes().to_vec(), before, "failed shift must not modify the page");
}

#[test]
fn test_cell_shift_out_of_range_fails() {
    let mut page = leaf_with_cells(&[10]);
    assert!(page.cell_shift(Some(0), -4, 0).is_err());
    assert!(page.cell_shift(Some(3), 4, 1).is_err());
    assert!(page.remove_cell(1).is_err());
}

#[test]
fn test_can_resize() {
    let page = leaf_with_cells(&[200, 200]);
    let free = page.free_space();
    assert!(page.can_resize(0, 10));
    assert!(page.can_resize(0, 200 + free));
    assert!(!page.can_resize(0, 200 + free + 1));
}
