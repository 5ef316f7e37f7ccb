//! Tests for Table
//!
//! These tests verify:
//! - Point lookups through the primary key index
//! - Secondary indexes over duplicate values
//! - Full scans across split pages stay in row-id order
//! - Deleting the leftmost row keeps the tree's pivots valid
//! - Key, NULL, type and capacity constraints reject rows before any write
//! - Update and delete keep every index in step with the table
//! - Index-driven search agrees with a full scan

use argonbase::storage::PageType;
use argonbase::tree::cell_row_id;
use argonbase::{
    ArgonError, Catalog, ColumnDef, Config, DataType, Operator, Predicate, RowId, Table, Value,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_table() -> (TempDir, Catalog, Table) {
    let temp_dir = TempDir::new().unwrap();
    let catalog = Catalog::open(Config::builder().data_dir(temp_dir.path()).build()).unwrap();
    let table = catalog
        .create_table(
            "t",
            vec![
                ColumnDef::new("id", DataType::Int).primary_key(),
                ColumnDef::new("name", DataType::Text),
            ],
        )
        .unwrap();
    (temp_dir, catalog, table)
}

fn row(id: i32, name: &str) -> Vec<Value> {
    vec![Value::Int(id), Value::Text(name.to_string())]
}

fn ids(records: &[argonbase::Record]) -> Vec<RowId> {
    records.iter().map(|r| r.row_id).collect()
}

/// Every interior pivot names a row that still exists
fn assert_pivots_live(table: &Table) {
    let file = table.tree().page_file();
    for id in 0..file.page_count() {
        let page = file.read_page(id).unwrap();
        if page.page_type().unwrap() != PageType::TableInterior {
            continue;
        }
        for i in 0..page.cell_count() {
            let pivot = cell_row_id(&page, i).unwrap();
            assert!(
                table.tree().find_record(pivot).unwrap().found,
                "pivot {} on page {} names a missing row",
                pivot,
                id
            );
        }
    }
}

// =============================================================================
// Scenario Tests
// =============================================================================

#[test]
fn test_primary_key_point_lookup() {
    let (_temp, _catalog, mut table) = setup_table();
    for id in 1..=50 {
        table.insert(row(id, &format!("name-{}", id))).unwrap();
    }

    let predicate = table.predicate("id", Operator::Equal, "25").unwrap();
    let found = table.search(Some(&predicate)).unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].values, row(25, "name-25"));
}

#[test]
fn test_secondary_index_returns_duplicates() {
    let (_temp, _catalog, mut table) = setup_table();
    for id in 1..=10 {
        table.insert(row(id, &format!("n{}", id))).unwrap();
    }
    assert!(table.create_index("name").unwrap());
    table.insert(row(11, "X")).unwrap();
    table.insert(row(12, "X")).unwrap();

    let predicate = table.predicate("name", Operator::Equal, "'X'").unwrap();
    let found = table.search(Some(&predicate)).unwrap();

    assert_eq!(ids(&found), vec![11, 12]);
    assert_eq!(table.index("name").unwrap().unwrap().get(&Value::Text("X".into())).unwrap().unwrap().row_ids, vec![11, 12]);
}

#[test]
fn test_scan_after_splits_is_ordered() {
    let (_temp, _catalog, mut table) = setup_table();
    for id in 1..=100 {
        table.insert(row(id, &format!("{:020}", id))).unwrap();
    }

    assert!(table.tree().leaf_pages().unwrap().len() > 1);
    let all = table.search(None).unwrap();
    assert_eq!(ids(&all), (1..=100).collect::<Vec<_>>());
    assert_eq!(all[99].values, row(100, &format!("{:020}", 100)));
}

#[test]
fn test_delete_leftmost_row_of_multi_page_table() {
    let (_temp, _catalog, mut table) = setup_table();
    for id in 1..=100 {
        table.insert(row(id, &format!("{:020}", id))).unwrap();
    }
    assert_ne!(table.tree().root_page().unwrap(), 0);

    let predicate = table.predicate("id", Operator::Equal, "1").unwrap();
    assert_eq!(table.delete(Some(&predicate)).unwrap(), 1);

    let all = table.search(None).unwrap();
    assert_eq!(ids(&all), (2..=100).collect::<Vec<_>>());
    assert!(table.index("id").unwrap().unwrap().get(&Value::Int(1)).unwrap().is_none());
    assert_pivots_live(&table);

    // the first row of the second leaf bounds a pivot; deleting it moves the pivot
    let second_leaf = table.tree().leaf_pages().unwrap()[1];
    let first = cell_row_id(&table.tree().page_file().read_page(second_leaf).unwrap(), 0).unwrap();
    table.delete(Some(&Predicate::new(0, Operator::Equal, Value::Int(first as i32)))).unwrap();
    assert_pivots_live(&table);
    assert_eq!(table.record_count().unwrap(), 98);
}

// =============================================================================
// Constraint Tests
// =============================================================================

#[test]
fn test_duplicate_primary_key_rejected() {
    let (_temp, _catalog, mut table) = setup_table();
    table.insert(row(1, "a")).unwrap();

    let err = table.insert(row(1, "b")).unwrap_err();
    assert!(matches!(err, ArgonError::DuplicateKey { ref column, .. } if column == "id"));
    assert_eq!(table.record_count().unwrap(), 1);
    assert_eq!(table.tree().next_row_id().unwrap(), 2);
}

#[test]
fn test_unique_allows_multiple_nulls() {
    let temp = TempDir::new().unwrap();
    let catalog = Catalog::open(Config::builder().data_dir(temp.path()).build()).unwrap();
    let mut table = catalog
        .create_table(
            "users",
            vec![
                ColumnDef::new("id", DataType::Int).primary_key(),
                ColumnDef::new("email", DataType::Text).unique(),
            ],
        )
        .unwrap();

    table.insert(vec![Value::Int(1), Value::Null]).unwrap();
    table.insert(vec![Value::Int(2), Value::Null]).unwrap();
    table.insert(vec![Value::Int(3), Value::Text("c@x".into())]).unwrap();

    let err = table.insert(vec![Value::Int(4), Value::Text("c@x".into())]).unwrap_err();
    assert!(matches!(err, ArgonError::DuplicateKey { .. }));
    assert_eq!(table.record_count().unwrap(), 3);
}

#[test]
fn test_null_and_type_violations() {
    let (_temp, _catalog, mut table) = setup_table();

    assert!(matches!(
        table.insert(vec![Value::Null, Value::Text("x".into())]).unwrap_err(),
        ArgonError::NullViolation(_)
    ));
    assert!(matches!(
        table.insert(vec![Value::Int(1), Value::Int(2)]).unwrap_err(),
        ArgonError::TypeMismatch { .. }
    ));
    assert!(matches!(
        table.insert(vec![Value::Int(1)]).unwrap_err(),
        ArgonError::ValueParse(_)
    ));
    assert!(matches!(
        table.predicate("id", Operator::Equal, "abc").unwrap_err(),
        ArgonError::ValueParse(_)
    ));
    assert_eq!(table.record_count().unwrap(), 0);
}

#[test]
fn test_oversized_row_rejected() {
    let (_temp, _catalog, mut table) = setup_table();
    let err = table.insert(row(1, &"w".repeat(243))).unwrap_err();
    assert!(matches!(err, ArgonError::CellOverflow { .. }));
    assert!(table.index("id").unwrap().unwrap().get(&Value::Int(1)).unwrap().is_none());
}

#[test]
fn test_full_index_cell_rejects_row() {
    let (_temp, _catalog, mut table) = setup_table();
    table.create_index("name").unwrap();
    // 4 + 2 + 2 + 1 + 4 * 37 fills a 160-byte cell for a one-byte value
    for id in 1..=37 {
        table.insert(row(id, "X")).unwrap();
    }

    let err = table.insert(row(38, "X")).unwrap_err();
    assert!(matches!(err, ArgonError::CellOverflow { .. }));
    assert_eq!(table.record_count().unwrap(), 37);
    assert!(table.index("id").unwrap().unwrap().get(&Value::Int(38)).unwrap().is_none());
}

#[test]
fn test_insert_named_columns() {
    let (_temp, _catalog, mut table) = setup_table();
    let row_id = table.insert_columns(&["ID"], vec![Value::Int(7)]).unwrap();
    assert_eq!(table.tree().get(row_id).unwrap().unwrap().values, vec![Value::Int(7), Value::Null]);

    assert!(matches!(
        table.insert_columns(&["age"], vec![Value::Int(1)]).unwrap_err(),
        ArgonError::ColumnNotFound { .. }
    ));
    assert!(table.insert_columns(&["id", "id"], vec![Value::Int(1), Value::Int(2)]).is_err());
    assert!(matches!(
        table.insert_columns(&["name"], vec![Value::Text("no id".into())]).unwrap_err(),
        ArgonError::NullViolation(_)
    ));
}

// =============================================================================
// Update / Delete Tests
// =============================================================================

#[test]
fn test_update_keeps_indexes_in_step() {
    let (_temp, _catalog, mut table) = setup_table();
    table.create_index("name").unwrap();
    for id in 1..=20 {
        table.insert(row(id, if id % 2 == 0 { "even" } else { "odd" })).unwrap();
    }

    let predicate = table.predicate("id", Operator::LessEqual, "4").unwrap();
    let updated = table.update("name", Value::Text("small".into()), Some(&predicate)).unwrap();
    assert_eq!(updated, 4);

    let index = table.index("name").unwrap().unwrap();
    assert_eq!(index.get(&Value::Text("small".into())).unwrap().unwrap().row_ids, vec![1, 2, 3, 4]);
    assert_eq!(index.get(&Value::Text("odd".into())).unwrap().unwrap().row_ids.len(), 8);

    let small = table.predicate("name", Operator::Equal, "small").unwrap();
    assert_eq!(ids(&table.search(Some(&small)).unwrap()), vec![1, 2, 3, 4]);

    let none = table.predicate("id", Operator::Greater, "100").unwrap();
    assert_eq!(table.update("name", Value::Null, Some(&none)).unwrap(), 0);
}

#[test]
fn test_update_key_column() {
    let (_temp, _catalog, mut table) = setup_table();
    for id in 1..=5 {
        table.insert(row(id, "n")).unwrap();
    }

    let third = table.predicate("id", Operator::Equal, "3").unwrap();
    assert_eq!(table.update("id", Value::Int(30), Some(&third)).unwrap(), 1);
    let index = table.index("id").unwrap().unwrap();
    assert!(index.get(&Value::Int(3)).unwrap().is_none());
    assert_eq!(index.get(&Value::Int(30)).unwrap().unwrap().row_ids, vec![3]);

    // same value on the same row is not a conflict
    let thirty = table.predicate("id", Operator::Equal, "30").unwrap();
    assert_eq!(table.update("id", Value::Int(30), Some(&thirty)).unwrap(), 1);

    let first = table.predicate("id", Operator::Equal, "1").unwrap();
    assert!(matches!(
        table.update("id", Value::Int(2), Some(&first)).unwrap_err(),
        ArgonError::DuplicateKey { .. }
    ));
    assert!(matches!(
        table.update("id", Value::Int(99), None).unwrap_err(),
        ArgonError::DuplicateKey { .. }
    ));
    assert!(matches!(
        table.update("id", Value::Null, Some(&first)).unwrap_err(),
        ArgonError::NullViolation(_)
    ));
}

#[test]
fn test_delete_with_and_without_predicate() {
    let (_temp, _catalog, mut table) = setup_table();
    table.create_index("name").unwrap();
    for id in 1..=30 {
        table.insert(row(id, &format!("g{}", id % 3))).unwrap();
    }

    let group = table.predicate("name", Operator::Equal, "g0").unwrap();
    assert_eq!(table.delete(Some(&group)).unwrap(), 10);
    assert!(table.index("name").unwrap().unwrap().get(&Value::Text("g0".into())).unwrap().is_none());
    assert_eq!(table.record_count().unwrap(), 20);

    assert_eq!(table.delete(None).unwrap(), 20);
    assert_eq!(table.record_count().unwrap(), 0);
    assert!(table.index("id").unwrap().unwrap().entries().unwrap().is_empty());
    assert!(table.index("name").unwrap().unwrap().entries().unwrap().is_empty());

    // row ids keep climbing after the table is emptied
    assert_eq!(table.insert(row(1, "again")).unwrap(), 31);
}

// =============================================================================
// Index Tests
// =============================================================================

#[test]
fn test_create_index_is_idempotent() {
    let (_temp, catalog, mut table) = setup_table();
    for id in 1..=5 {
        table.insert(row(id, "v")).unwrap();
    }

    assert!(table.create_index("name").unwrap());
    assert!(!table.create_index("NAME").unwrap());
    assert!(!table.create_index("id").unwrap());
    assert!(catalog.index_file("t", "name").exists());
    assert!(matches!(
        table.create_index("nope").unwrap_err(),
        ArgonError::ColumnNotFound { .. }
    ));
    assert_eq!(table.indexed_columns(), vec!["id", "name"]);
}

#[test]
fn test_index_search_matches_scan() {
    let (_temp, _catalog, mut table) = setup_table();
    for id in 1..=300 {
        let name = format!("k{:03}", (id * 7919) % 97);
        table.insert(row(id, &name)).unwrap();
    }
    table.create_index("name").unwrap();

    let ops = [
        Operator::Equal,
        Operator::NotEqual,
        Operator::Less,
        Operator::LessEqual,
        Operator::Greater,
        Operator::GreaterEqual,
    ];
    for target in ["k000", "k013", "k050", "k096", "k500", "a"] {
        for op in ops {
            let predicate = table.predicate("name", op, target).unwrap();
            let indexed = table.search(Some(&predicate)).unwrap();
            let scanned = table.tree().search(Some(&predicate)).unwrap();
            assert_eq!(indexed, scanned, "name {} {}", op, target);
        }
    }

    for target in ["1", "150", "300", "301"] {
        for op in ops {
            let predicate = table.predicate("id", op, target).unwrap();
            assert_eq!(
                table.search(Some(&predicate)).unwrap(),
                table.tree().search(Some(&predicate)).unwrap()
            );
        }
    }
}
