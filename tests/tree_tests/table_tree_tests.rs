//! Tests for TableTree
//!
//! These tests verify:
//! - Row id assignment and monotonicity, including after deletes and reopen
//! - Leaf splits: sibling links and parent pivots
//! - Pivot maintenance when the smallest row of a subtree is deleted
//! - Empty leaf removal and root collapse
//! - Updates that grow a record past its page
//! - Agreement with an in-memory model under random inserts and deletes

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use argonbase::storage::PageType;
use argonbase::tree::{cell_row_id, TableTree, MAX_RECORD_CELL};
use argonbase::{ArgonError, Operator, Predicate, Record, RowId, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_tree() -> (TempDir, PathBuf, TableTree) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.tbl");
    let tree = TableTree::create(&path, false).unwrap();
    (temp_dir, path, tree)
}

/// A row whose encoded cell is 113 bytes, so four fit on one leaf
fn wide_row(i: i32) -> Vec<Value> {
    vec![Value::Int(i), Value::Text("x".repeat(100))]
}

fn small_row(i: i32) -> Vec<Value> {
    vec![Value::Int(i), Value::Text(format!("r{}", i))]
}

fn row_ids(tree: &TableTree) -> Vec<RowId> {
    tree.scan().map(|r| r.unwrap().row_id).collect()
}

/// Child pointer stored in interior cell `index`
fn child_pointer(cell: &[u8]) -> u32 {
    u32::from_be_bytes([cell[0], cell[1], cell[2], cell[3]])
}

/// Deterministic pseudo-random sequence
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }
}

/// Leaves are chained in ascending row-id order with sorted cells
fn assert_leaf_chain_sorted(tree: &TableTree) {
    let mut previous: Option<RowId> = None;
    for id in tree.leaf_pages().unwrap() {
        let leaf = tree.page_file().read_page(id).unwrap();
        assert_eq!(leaf.page_type().unwrap(), PageType::TableLeaf);
        for i in 0..leaf.cell_count() {
            let row_id = cell_row_id(&leaf, i).unwrap();
            if let Some(prev) = previous {
                assert!(prev < row_id, "row {} follows {} on page {}", row_id, prev, id);
            }
            previous = Some(row_id);
        }
    }
}

// =============================================================================
// Row Id Tests
// =============================================================================

#[test]
fn test_row_ids_start_at_one() {
    let (_temp, _path, mut tree) = setup_tree();
    assert_eq!(tree.next_row_id().unwrap(), 1);
    assert_eq!(tree.last_row_id().unwrap(), None);

    for i in 0..10 {
        assert_eq!(tree.insert(small_row(i)).unwrap(), i as u32 + 1);
    }

    assert_eq!(tree.record_count().unwrap(), 10);
    assert_eq!(tree.smallest_row_id().unwrap(), Some(1));
    assert_eq!(tree.last_row_id().unwrap(), Some(10));
    let record = tree.get(4).unwrap().unwrap();
    assert_eq!(record.values, small_row(3));
}

#[test]
fn test_deleted_max_row_id_not_reused() {
    let (_temp, path, mut tree) = setup_tree();
    for i in 0..3 {
        tree.insert(small_row(i)).unwrap();
    }
    tree.delete(3).unwrap();
    assert_eq!(tree.last_row_id().unwrap(), Some(2));
    assert_eq!(tree.insert(small_row(9)).unwrap(), 4);

    tree.delete(4).unwrap();
    drop(tree);

    let mut tree = TableTree::open(&path, false).unwrap();
    assert_eq!(tree.insert(small_row(10)).unwrap(), 5);
}

#[test]
fn test_duplicate_row_id_rejected() {
    let (_temp, _path, mut tree) = setup_tree();
    tree.insert(small_row(1)).unwrap();
    let err = tree.insert_record(&Record::new(1, small_row(2))).unwrap_err();
    assert!(matches!(err, ArgonError::Storage(_)));
    assert_eq!(tree.record_count().unwrap(), 1);
}

#[test]
fn test_oversized_record_rejected() {
    let (_temp, _path, mut tree) = setup_tree();
    let row = vec![Value::Text("a".repeat(200)), Value::Text("b".repeat(100))];

    match tree.insert(row).unwrap_err() {
        ArgonError::CellOverflow { max, .. } => assert_eq!(max, MAX_RECORD_CELL),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(tree.record_count().unwrap(), 0);
}

// =============================================================================
// Split Tests
// =============================================================================

#[test]
fn test_leaf_split_links_sibling_and_pivot() {
    let (_temp, _path, mut tree) = setup_tree();
    for i in 1..=5 {
        tree.insert(wide_row(i)).unwrap();
    }

    let root_id = tree.root_page().unwrap();
    assert_ne!(root_id, 0);
    let root = tree.page_file().read_page(root_id).unwrap();
    assert_eq!(root.page_type().unwrap(), PageType::TableInterior);
    assert_eq!(root.cell_count(), 1);

    let leaves = tree.leaf_pages().unwrap();
    assert_eq!(leaves.len(), 2);
    assert_eq!(leaves[0], 0);
    assert_eq!(child_pointer(root.cell(0)), 0);
    assert_eq!(root.rightmost_child().unwrap(), leaves[1]);

    // the pivot is the smallest row id of the right page
    let right = tree.page_file().read_page(leaves[1]).unwrap();
    assert_eq!(cell_row_id(&root, 0).unwrap(), cell_row_id(&right, 0).unwrap());
    assert_eq!(right.parent(), Some(root_id));
    assert_eq!(tree.page_file().read_page(0).unwrap().parent(), Some(root_id));

    assert_eq!(row_ids(&tree), vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_many_inserts_grow_interior_levels() {
    let (_temp, _path, mut tree) = setup_tree();
    for i in 1..=600 {
        tree.insert(wide_row(i)).unwrap();
    }

    // 600 wide rows need far more leaves than one interior page can hold
    let root = tree.page_file().read_page(tree.root_page().unwrap()).unwrap();
    let first_child = tree
        .page_file()
        .read_page(child_pointer(root.cell(0)))
        .unwrap();
    assert_eq!(first_child.page_type().unwrap(), PageType::TableInterior);

    assert_eq!(row_ids(&tree), (1..=600).collect::<Vec<_>>());
    for row_id in [1, 77, 300, 599, 600] {
        assert_eq!(tree.get(row_id).unwrap().unwrap().values, wide_row(row_id as i32));
    }
    assert_leaf_chain_sorted(&tree);
}

#[test]
fn test_out_of_order_row_ids_stay_sorted() {
    let (_temp, _path, mut tree) = setup_tree();
    let mut rng = Lcg(7);
    let mut ids: Vec<RowId> = (1..=200).collect();
    for i in (1..ids.len()).rev() {
        ids.swap(i, rng.below(i + 1));
    }

    for &id in &ids {
        tree.insert_record(&Record::new(id, wide_row(id as i32))).unwrap();
    }

    assert_eq!(row_ids(&tree), (1..=200).collect::<Vec<_>>());
    assert_leaf_chain_sorted(&tree);
    for &id in &ids {
        assert!(tree.find_record(id).unwrap().found);
    }
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_leftmost_updates_pivot() {
    let (_temp, _path, mut tree) = setup_tree();
    for i in 1..=5 {
        tree.insert(wide_row(i)).unwrap();
    }
    let root_id = tree.root_page().unwrap();
    assert_eq!(cell_row_id(&tree.page_file().read_page(root_id).unwrap(), 0).unwrap(), 3);

    let removed = tree.delete(3).unwrap();
    assert_eq!(removed.values, wide_row(3));

    let root = tree.page_file().read_page(root_id).unwrap();
    assert_eq!(cell_row_id(&root, 0).unwrap(), 4);
    assert!(tree.get(3).unwrap().is_none());
    assert!(tree.find_record(4).unwrap().found);
    assert_eq!(row_ids(&tree), vec![1, 2, 4, 5]);
}

#[test]
fn test_delete_missing_row_leaves_file_unchanged() {
    let (_temp, path, mut tree) = setup_tree();
    for i in 1..=5 {
        tree.insert(wide_row(i)).unwrap();
    }
    let before = fs::read(&path).unwrap();

    assert!(matches!(tree.delete(42).unwrap_err(), ArgonError::RowNotFound(42)));
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_emptied_leaf_is_freed_and_root_collapses() {
    let (_temp, _path, mut tree) = setup_tree();
    for i in 1..=5 {
        tree.insert(wide_row(i)).unwrap();
    }
    for row_id in [3, 4, 5] {
        tree.delete(row_id).unwrap();
    }

    assert_eq!(tree.root_page().unwrap(), 0);
    assert_eq!(tree.leaf_pages().unwrap(), vec![0]);
    assert_eq!(tree.page_file().free_pages().unwrap().len(), 2);
    assert_eq!(row_ids(&tree), vec![1, 2]);

    // freed pages are reused by the next split
    let pages_before = tree.page_file().page_count();
    for i in 6..=8 {
        tree.insert(wide_row(i)).unwrap();
    }
    assert_eq!(tree.page_file().page_count(), pages_before);
    assert!(tree.page_file().free_pages().unwrap().is_empty());
    assert_eq!(row_ids(&tree), vec![1, 2, 6, 7, 8]);
}

#[test]
fn test_page_zero_survives_when_emptied() {
    let (_temp, _path, mut tree) = setup_tree();
    for i in 1..=5 {
        tree.insert(wide_row(i)).unwrap();
    }
    tree.delete(1).unwrap();
    tree.delete(2).unwrap();

    let first = tree.page_file().read_page(0).unwrap();
    assert_eq!(first.cell_count(), 0);
    assert_eq!(tree.smallest_row_id().unwrap(), Some(3));
    assert_eq!(row_ids(&tree), vec![3, 4, 5]);

    tree.delete(3).unwrap();
    tree.delete(4).unwrap();
    tree.delete(5).unwrap();
    assert_eq!(tree.record_count().unwrap(), 0);
    assert_eq!(tree.smallest_row_id().unwrap(), None);
    assert_eq!(tree.root_page().unwrap(), 0);
}

// =============================================================================
// Update Tests
// =============================================================================

#[test]
fn test_update_column_returns_old_value() {
    let (_temp, _path, mut tree) = setup_tree();
    tree.insert(small_row(1)).unwrap();

    let old = tree.update(1, 1, Value::Text("renamed".into())).unwrap();
    assert_eq!(old, Value::Text("r1".into()));
    assert_eq!(tree.get(1).unwrap().unwrap().values[1], Value::Text("renamed".into()));

    assert!(matches!(tree.update(9, 0, Value::Int(0)), Err(ArgonError::RowNotFound(9))));
    assert!(tree.update(1, 7, Value::Int(0)).is_err());
}

#[test]
fn test_growing_update_splits_leaf() {
    let (_temp, _path, mut tree) = setup_tree();
    for i in 1..=20 {
        tree.insert(small_row(i)).unwrap();
    }
    assert_eq!(tree.leaf_pages().unwrap().len(), 1);

    for row_id in [2, 9, 15] {
        tree.update(row_id, 1, Value::Text("y".repeat(200))).unwrap();
    }

    assert!(tree.leaf_pages().unwrap().len() > 1);
    assert_eq!(row_ids(&tree), (1..=20).collect::<Vec<_>>());
    assert_eq!(tree.get(9).unwrap().unwrap().values[1], Value::Text("y".repeat(200)));
    assert_eq!(tree.get(10).unwrap().unwrap().values, small_row(10));
    assert_leaf_chain_sorted(&tree);
}

// =============================================================================
// Search and Persistence Tests
// =============================================================================

#[test]
fn test_search_with_predicate() {
    let (_temp, _path, mut tree) = setup_tree();
    for i in 1..=30 {
        tree.insert(wide_row(i)).unwrap();
    }

    let predicate = Predicate::new(0, Operator::Greater, Value::Int(25));
    let found: Vec<RowId> = tree
        .search(Some(&predicate))
        .unwrap()
        .iter()
        .map(|r| r.row_id)
        .collect();
    assert_eq!(found, vec![26, 27, 28, 29, 30]);
    assert_eq!(tree.search(None).unwrap().len(), 30);
}

#[test]
fn test_reopen_preserves_records() {
    let (_temp, path, mut tree) = setup_tree();
    for i in 1..=50 {
        tree.insert(wide_row(i)).unwrap();
    }
    tree.delete(10).unwrap();
    drop(tree);

    let tree = TableTree::open(&path, false).unwrap();
    assert_eq!(tree.record_count().unwrap(), 49);
    assert!(tree.get(10).unwrap().is_none());
    assert_eq!(tree.get(50).unwrap().unwrap().values, wide_row(50));
    assert_eq!(tree.next_row_id().unwrap(), 51);
}

#[test]
fn test_random_operations_match_model() {
    let (_temp, _path, mut tree) = setup_tree();
    let mut model: BTreeMap<RowId, Vec<Value>> = BTreeMap::new();
    let mut rng = Lcg(2024);

    for step in 0..1500 {
        if model.is_empty() || rng.below(3) > 0 {
            let values = vec![
                Value::Int(step),
                Value::Text("z".repeat(rng.below(180))),
            ];
            let row_id = tree.insert(values.clone()).unwrap();
            assert!(model.keys().all(|&k| k < row_id));
            model.insert(row_id, values);
        } else {
            let keys: Vec<RowId> = model.keys().copied().collect();
            let victim = keys[rng.below(keys.len())];
            let removed = tree.delete(victim).unwrap();
            assert_eq!(Some(removed.values), model.remove(&victim));
        }
    }

    let stored: Vec<(RowId, Vec<Value>)> = tree
        .scan()
        .map(|r| r.map(|record| (record.row_id, record.values)).unwrap())
        .collect();
    let expected: Vec<(RowId, Vec<Value>)> = model.into_iter().collect();
    assert_eq!(stored, expected);
    assert_leaf_chain_sorted(&tree);
}
