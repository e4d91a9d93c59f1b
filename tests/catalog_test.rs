use std::path::Path;
use std::sync::Arc;

use rill::buffer::BufferPoolManager;
use rill::catalog::CatalogManager;
use rill::index::ComparisonOp;
use rill::record::{DataType, Field, Row, Schema};
use rill::storage::disk::DiskManager;
use rill::RillError;

fn open_db(path: &Path, init: bool) -> (CatalogManager, Arc<BufferPoolManager>) {
    let disk = Arc::new(DiskManager::new(path).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(128, 2, disk));
    let catalog = CatalogManager::new(Arc::clone(&bpm), init).unwrap();
    (catalog, bpm)
}

fn accounts_schema() -> Schema {
    Schema::builder()
        .unique_column("id", DataType::Int32)
        .column("name", DataType::Char(16))
        .build()
}

fn insert_account(catalog: &CatalogManager, id: i32, name: &str) -> Row {
    let table = catalog.get_table("t").unwrap();
    let mut row = Row::new(vec![Field::from(id), Field::from(name)]);
    table.heap().insert_tuple(&mut row).unwrap();
    row
}

#[test]
fn test_create_insert_scan() {
    let dir = tempfile::tempdir().unwrap();
    let (mut catalog, bpm) = open_db(&dir.path().join("scan.db"), true);

    catalog.create_table("t", accounts_schema()).unwrap();
    for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
        insert_account(&catalog, id, name);
    }

    let table = catalog.get_table("t").unwrap();
    let rows: Vec<Row> = table.heap().iter().unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    for (row, (id, name)) in rows.iter().zip([(1, "a"), (2, "b"), (3, "c")]) {
        assert_eq!(row.field(0), Some(&Field::from(id)));
        assert_eq!(row.field(1), Some(&Field::from(name)));
    }
    assert!(bpm.check_all_unpinned());
}

#[test]
fn test_duplicate_primary_key_via_index() {
    let dir = tempfile::tempdir().unwrap();
    let (mut catalog, _bpm) = open_db(&dir.path().join("dup.db"), true);

    catalog.create_table("t", accounts_schema()).unwrap();
    catalog.create_index("t", "t_pk", &["id"]).unwrap();

    for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
        let row = insert_account(&catalog, id, name);
        let index = catalog.get_index_mut("t", "t_pk").unwrap();
        index.index_mut().insert_entry(&row, row.row_id()).unwrap();
    }

    // A second row with id=2: the unique index rejects it and the executor
    // would roll the heap insert back.
    let row = insert_account(&catalog, 2, "x");
    let rid = row.row_id();
    let index = catalog.get_index_mut("t", "t_pk").unwrap();
    assert!(matches!(
        index.index_mut().insert_entry(&row, rid),
        Err(RillError::DuplicateKey)
    ));
    catalog.get_table("t").unwrap().heap().delete_tuple(rid).unwrap();

    let table = catalog.get_table("t").unwrap();
    let rows: Vec<Row> = table.heap().iter().unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
}

#[test]
fn test_update_then_index_scan() {
    let dir = tempfile::tempdir().unwrap();
    let (mut catalog, _bpm) = open_db(&dir.path().join("upd.db"), true);

    catalog.create_table("t", accounts_schema()).unwrap();
    catalog.create_index("t", "t_by_name", &["name"]).unwrap();

    let mut rows = Vec::new();
    for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
        let row = insert_account(&catalog, id, name);
        let index = catalog.get_index_mut("t", "t_by_name").unwrap();
        index.index_mut().insert_entry(&row, row.row_id()).unwrap();
        rows.push(row);
    }

    // Update id=2's name to "bb": heap update in place, index entry swapped.
    let old_row = rows[1].clone();
    let rid = old_row.row_id();
    let mut new_row = Row::new(vec![Field::from(2), Field::from("bb")]);
    new_row.set_row_id(rid);
    catalog.get_table("t").unwrap().heap().update_tuple(&new_row, rid).unwrap();
    {
        let index = catalog.get_index_mut("t", "t_by_name").unwrap();
        index.index_mut().remove_entry(&old_row).unwrap();
        index.index_mut().insert_entry(&new_row, rid).unwrap();
    }

    let index = catalog.get_index("t", "t_by_name").unwrap();
    let hits = index
        .index()
        .scan(&Row::new(vec![Field::from("bb")]), ComparisonOp::Equal)
        .unwrap();
    assert_eq!(hits.len(), 1);
    let row = catalog.get_table("t").unwrap().heap().get_tuple(hits[0]).unwrap();
    assert_eq!(row.field(0), Some(&Field::from(2)));
    assert_eq!(row.field(1), Some(&Field::from("bb")));

    let misses = index
        .index()
        .scan(&Row::new(vec![Field::from("b")]), ComparisonOp::Equal)
        .unwrap();
    assert!(misses.is_empty());
}

#[test]
fn test_catalog_errors() {
    let dir = tempfile::tempdir().unwrap();
    let (mut catalog, _bpm) = open_db(&dir.path().join("err.db"), true);

    assert!(matches!(
        catalog.get_table("missing"),
        Err(RillError::TableNotExist(_))
    ));

    catalog.create_table("t", accounts_schema()).unwrap();
    assert!(matches!(
        catalog.create_table("t", accounts_schema()),
        Err(RillError::TableAlreadyExist(_))
    ));

    assert!(matches!(
        catalog.create_index("missing", "i", &["id"]),
        Err(RillError::TableNotExist(_))
    ));
    assert!(matches!(
        catalog.create_index("t", "i", &["nope"]),
        Err(RillError::ColumnNotExist(_))
    ));

    catalog.create_index("t", "i", &["id"]).unwrap();
    assert!(matches!(
        catalog.create_index("t", "i", &["name"]),
        Err(RillError::IndexAlreadyExist(_))
    ));

    assert!(matches!(
        catalog.get_index("t", "missing"),
        Err(RillError::IndexNotFound(_))
    ));

    catalog.drop_index("t", "i").unwrap();
    assert!(matches!(
        catalog.get_index("t", "i"),
        Err(RillError::IndexNotFound(_))
    ));
    assert!(matches!(
        catalog.drop_index("t", "i"),
        Err(RillError::IndexNotFound(_))
    ));
}

#[test]
fn test_flush_close_reopen_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reopen.db");
    let row_count = 10_000;

    {
        let (mut catalog, bpm) = open_db(&path, true);
        let schema = Schema::builder()
            .unique_column("id", DataType::Int32)
            .column("name", DataType::Char(32))
            .nullable_column("balance", DataType::Float32)
            .build();
        catalog.create_table("t", schema).unwrap();
        catalog.create_index("t", "t_pk", &["id"]).unwrap();

        for i in 0..row_count {
            let table = catalog.get_table("t").unwrap();
            let mut row = Row::new(vec![
                Field::from(i),
                Field::from(format!("name-{i}")),
                if i % 7 == 0 {
                    Field::Null
                } else {
                    Field::from(i as f32 * 0.5)
                },
            ]);
            table.heap().insert_tuple(&mut row).unwrap();
            let index = catalog.get_index_mut("t", "t_pk").unwrap();
            index.index_mut().insert_entry(&row, row.row_id()).unwrap();
        }

        catalog.flush().unwrap();
        bpm.flush_all_pages().unwrap();
    }

    {
        let (catalog, bpm) = open_db(&path, false);
        let tables = catalog.get_tables();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name(), "t");

        let indexes = catalog.get_table_indexes("t").unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].name(), "t_pk");

        // Every row comes back with identical field values.
        let table = catalog.get_table("t").unwrap();
        let mut seen = 0;
        for row in table.heap().iter().unwrap() {
            let row = row.unwrap();
            let id = match row.field(0) {
                Some(Field::Int32(v)) => *v,
                other => panic!("unexpected id field {other:?}"),
            };
            assert_eq!(row.field(1), Some(&Field::from(format!("name-{id}"))));
            if id % 7 == 0 {
                assert!(row.field(2).unwrap().is_null());
            } else {
                assert_eq!(row.field(2), Some(&Field::from(id as f32 * 0.5)));
            }
            seen += 1;
        }
        assert_eq!(seen, row_count);

        // Index lookups resolve through the reopened tree.
        let index = catalog.get_index("t", "t_pk").unwrap();
        for i in (0..row_count).step_by(97) {
            let rid = index
                .index()
                .get_rid(&Row::new(vec![Field::from(i)]))
                .unwrap()
                .expect("indexed key");
            let row = table.heap().get_tuple(rid).unwrap();
            assert_eq!(row.field(0), Some(&Field::from(i)));
        }
        assert!(bpm.check_all_unpinned());
    }
}

#[test]
fn test_drop_table_releases_pages() {
    let dir = tempfile::tempdir().unwrap();
    let (mut catalog, bpm) = open_db(&dir.path().join("drop.db"), true);

    catalog.create_table("t", accounts_schema()).unwrap();
    catalog.create_index("t", "t_pk", &["id"]).unwrap();
    for i in 0..500 {
        let row = insert_account(&catalog, i, "filler");
        let index = catalog.get_index_mut("t", "t_pk").unwrap();
        index.index_mut().insert_entry(&row, row.row_id()).unwrap();
    }
    let pages_before_drop = bpm.disk_manager().num_pages();

    catalog.drop_table("t").unwrap();
    assert!(matches!(
        catalog.get_table("t"),
        Err(RillError::TableNotExist(_))
    ));
    assert!(matches!(
        catalog.get_table_indexes("t"),
        Err(RillError::TableNotExist(_))
    ));

    // The freed pages are handed out again instead of growing the file.
    catalog.create_table("t2", accounts_schema()).unwrap();
    for i in 0..500 {
        let table = catalog.get_table("t2").unwrap();
        let mut row = Row::new(vec![Field::from(i), Field::from("filler")]);
        table.heap().insert_tuple(&mut row).unwrap();
    }
    assert!(bpm.disk_manager().num_pages() <= pages_before_drop);
    assert!(bpm.check_all_unpinned());
}

#[test]
fn test_empty_index_after_reopen_stays_usable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty_idx.db");
    {
        let (mut catalog, bpm) = open_db(&path, true);
        catalog.create_table("t", accounts_schema()).unwrap();
        // Created but never populated: no root page exists yet.
        catalog.create_index("t", "t_pk", &["id"]).unwrap();
        catalog.flush().unwrap();
        bpm.flush_all_pages().unwrap();
    }
    {
        let (mut catalog, _bpm) = open_db(&path, false);
        let row = insert_account(&catalog, 1, "late");
        let index = catalog.get_index_mut("t", "t_pk").unwrap();
        index.index_mut().insert_entry(&row, row.row_id()).unwrap();
        assert_eq!(
            index
                .index()
                .get_rid(&Row::new(vec![Field::from(1)]))
                .unwrap(),
            Some(row.row_id())
        );
    }
}
