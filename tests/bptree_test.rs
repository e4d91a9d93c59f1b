use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::rngs::StdRng;
use rand::SeedableRng;

use rill::buffer::BufferPoolManager;
use rill::common::{PageId, RowId, INVALID_PAGE_ID};
use rill::index::bptree_page::{
    node_kind, InternalPageRef, LeafPageRef, NodeKind,
};
use rill::index::{BPlusTree, ComparisonOp, KeyManager};
use rill::record::{DataType, Field, Row, Schema};
use rill::storage::disk::DiskManager;
use rill::RillError;

fn make_bpm(dir: &tempfile::TempDir, name: &str, frames: usize) -> Arc<BufferPoolManager> {
    let disk = Arc::new(DiskManager::new(dir.path().join(name)).unwrap());
    Arc::new(BufferPoolManager::new(frames, 2, disk))
}

fn int_tree(bpm: &Arc<BufferPoolManager>, index_id: u32) -> BPlusTree {
    let km = KeyManager::new(Schema::builder().column("k", DataType::Int32).build_arc());
    BPlusTree::new(index_id, Arc::clone(bpm), km).unwrap()
}

/// A tree over wide CHAR keys: fanout of 8, so a few hundred keys exercise
/// multi-level splits and merges.
fn narrow_tree(bpm: &Arc<BufferPoolManager>, index_id: u32) -> BPlusTree {
    let km = KeyManager::new(Schema::builder().column("k", DataType::Char(400)).build_arc());
    BPlusTree::new(index_id, Arc::clone(bpm), km).unwrap()
}

fn int_key(tree: &BPlusTree, v: i32) -> Vec<u8> {
    tree.key_manager()
        .encode_key(&Row::new(vec![Field::from(v)]))
        .unwrap()
}

fn char_key(tree: &BPlusTree, v: i32) -> Vec<u8> {
    tree.key_manager()
        .encode_key(&Row::new(vec![Field::from(format!("{v:05}"))]))
        .unwrap()
}

fn rid(v: i32) -> RowId {
    RowId::new(PageId::new(1000 + v / 100), (v % 100) as u32)
}

/// Walks the tree and checks the structural invariants: equal leaf depth,
/// fill bounds on non-root nodes, parent pointers, and separator keys equal
/// to the minimum key of their subtree.
fn audit_tree(tree: &BPlusTree, bpm: &Arc<BufferPoolManager>) {
    if tree.is_empty() {
        return;
    }
    let mut leaf_depths = Vec::new();
    audit_node(bpm, tree.root_page_id(), INVALID_PAGE_ID, 0, &mut leaf_depths);
    assert!(
        leaf_depths.windows(2).all(|w| w[0] == w[1]),
        "leaves at unequal depths: {leaf_depths:?}"
    );
}

/// Returns the minimum key in the subtree rooted at `page_id`.
fn audit_node(
    bpm: &Arc<BufferPoolManager>,
    page_id: PageId,
    expected_parent: PageId,
    depth: usize,
    leaf_depths: &mut Vec<usize>,
) -> Vec<u8> {
    let guard = bpm.checked_read_page(page_id).unwrap();
    let data = guard.data();
    let is_root = !expected_parent.is_valid();
    match node_kind(data).unwrap() {
        NodeKind::Leaf => {
            let leaf = LeafPageRef::new(data);
            assert_eq!(leaf.parent_page_id(), expected_parent);
            if !is_root {
                assert!(
                    leaf.size() >= leaf.min_size() && leaf.size() < leaf.max_size(),
                    "leaf {page_id} has size {} outside [{}, {})",
                    leaf.size(),
                    leaf.min_size(),
                    leaf.max_size()
                );
            }
            leaf_depths.push(depth);
            leaf.key_at(0).to_vec()
        }
        NodeKind::Internal => {
            let node = InternalPageRef::new(data);
            assert_eq!(node.parent_page_id(), expected_parent);
            if !is_root {
                assert!(
                    node.size() >= node.min_size() && node.size() < node.max_size(),
                    "internal {page_id} has size {} outside [{}, {})",
                    node.size(),
                    node.min_size(),
                    node.max_size()
                );
            } else {
                assert!(node.size() >= 2, "internal root must have two children");
            }
            let children: Vec<PageId> = (0..node.size()).map(|i| node.child_at(i)).collect();
            let separators: Vec<Vec<u8>> =
                (0..node.size()).map(|i| node.key_at(i).to_vec()).collect();
            drop(guard);

            let mut subtree_min = Vec::new();
            for (i, child) in children.iter().enumerate() {
                let child_min = audit_node(bpm, *child, page_id, depth + 1, leaf_depths);
                if i == 0 {
                    subtree_min = child_min;
                } else {
                    assert_eq!(
                        separators[i], child_min,
                        "separator {i} of {page_id} is not the min of its subtree"
                    );
                }
            }
            subtree_min
        }
    }
}

#[test]
fn test_insert_and_lookup_small() {
    let dir = tempfile::tempdir().unwrap();
    let bpm = make_bpm(&dir, "small.db", 16);
    let mut tree = int_tree(&bpm, 0);

    for v in [10, 20, 30] {
        let key = int_key(&tree, v);
        tree.insert(&key, rid(v)).unwrap();
    }
    for v in [10, 20, 30] {
        let key = int_key(&tree, v);
        assert_eq!(tree.get_value(&key).unwrap(), Some(rid(v)));
    }
    let absent = int_key(&tree, 15);
    assert_eq!(tree.get_value(&absent).unwrap(), None);
    assert!(bpm.check_all_unpinned());
}

#[test]
fn test_duplicate_key_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let bpm = make_bpm(&dir, "dup.db", 16);
    let mut tree = int_tree(&bpm, 0);

    let key = int_key(&tree, 42);
    tree.insert(&key, rid(1)).unwrap();
    assert!(matches!(
        tree.insert(&key, rid(2)),
        Err(RillError::DuplicateKey)
    ));
    // The original mapping is untouched.
    assert_eq!(tree.get_value(&key).unwrap(), Some(rid(1)));
}

#[test]
fn test_random_insert_then_lookup_all() {
    let dir = tempfile::tempdir().unwrap();
    let bpm = make_bpm(&dir, "rand.db", 64);
    let mut tree = int_tree(&bpm, 0);

    let mut keys: Vec<i32> = (0..1000).collect();
    keys.shuffle(&mut StdRng::seed_from_u64(3));
    for &v in &keys {
        let key = int_key(&tree, v);
        tree.insert(&key, rid(v)).unwrap();
    }
    assert!(bpm.check_all_unpinned());

    for v in 0..1000 {
        let key = int_key(&tree, v);
        assert_eq!(tree.get_value(&key).unwrap(), Some(rid(v)), "key {v}");
    }
    for v in 1000..1100 {
        let key = int_key(&tree, v);
        assert_eq!(tree.get_value(&key).unwrap(), None);
    }
    audit_tree(&tree, &bpm);
}

#[test]
fn test_remove_half_leaves_sorted_chain() {
    let dir = tempfile::tempdir().unwrap();
    let bpm = make_bpm(&dir, "chain.db", 64);
    let mut tree = int_tree(&bpm, 0);

    let mut rng = StdRng::seed_from_u64(11);
    let mut keys: Vec<i32> = (0..1000).collect();
    keys.shuffle(&mut rng);
    for &v in &keys {
        let key = int_key(&tree, v);
        tree.insert(&key, rid(v)).unwrap();
    }

    let mut to_remove: Vec<i32> = (0..500).collect();
    to_remove.shuffle(&mut rng);
    for &v in &to_remove {
        let key = int_key(&tree, v);
        tree.remove(&key).unwrap();
    }
    assert!(bpm.check_all_unpinned());

    // Walking the leaf chain yields exactly 500..999, ascending.
    let survivors: Vec<i32> = tree
        .iter()
        .unwrap()
        .map(|item| {
            let (key, _) = item.unwrap();
            let row = tree.key_manager().decode_key(&key).unwrap();
            match row.field(0) {
                Some(Field::Int32(v)) => *v,
                other => panic!("unexpected key field {other:?}"),
            }
        })
        .collect();
    let expected: Vec<i32> = (500..1000).collect();
    assert_eq!(survivors, expected);
    audit_tree(&tree, &bpm);
}

#[test]
fn test_deep_tree_split_and_merge() {
    let dir = tempfile::tempdir().unwrap();
    let bpm = make_bpm(&dir, "deep.db", 64);
    let mut tree = narrow_tree(&bpm, 0);

    let mut rng = StdRng::seed_from_u64(5);
    let mut keys: Vec<i32> = (0..240).collect();
    keys.shuffle(&mut rng);
    for &v in &keys {
        let key = char_key(&tree, v);
        tree.insert(&key, rid(v)).unwrap();
    }
    audit_tree(&tree, &bpm);

    // The fanout is 8, so 240 keys force at least three levels.
    {
        let guard = bpm.checked_read_page(tree.root_page_id()).unwrap();
        assert_eq!(node_kind(guard.data()), Some(NodeKind::Internal));
    }

    let mut to_remove: Vec<i32> = (0..200).collect();
    to_remove.shuffle(&mut rng);
    for &v in &to_remove {
        let key = char_key(&tree, v);
        tree.remove(&key).unwrap();
        assert!(bpm.check_all_unpinned());
    }
    audit_tree(&tree, &bpm);

    let survivors: Vec<String> = tree
        .iter()
        .unwrap()
        .map(|item| {
            let (key, _) = item.unwrap();
            let row = tree.key_manager().decode_key(&key).unwrap();
            match row.field(0) {
                Some(Field::Char(s)) => s.clone(),
                other => panic!("unexpected key field {other:?}"),
            }
        })
        .collect();
    let expected: Vec<String> = (200..240).map(|v| format!("{v:05}")).collect();
    assert_eq!(survivors, expected);
}

#[test]
fn test_remove_everything_empties_tree() {
    let dir = tempfile::tempdir().unwrap();
    let bpm = make_bpm(&dir, "empty.db", 64);
    let mut tree = narrow_tree(&bpm, 0);

    for v in 0..50 {
        let key = char_key(&tree, v);
        tree.insert(&key, rid(v)).unwrap();
    }
    for v in 0..50 {
        let key = char_key(&tree, v);
        tree.remove(&key).unwrap();
    }
    assert!(tree.is_empty());
    assert_eq!(tree.iter().unwrap().count(), 0);
    assert!(bpm.check_all_unpinned());

    // An emptied tree accepts inserts again.
    let key = char_key(&tree, 7);
    tree.insert(&key, rid(7)).unwrap();
    assert_eq!(tree.get_value(&key).unwrap(), Some(rid(7)));
}

#[test]
fn test_remove_absent_key_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let bpm = make_bpm(&dir, "absent.db", 16);
    let mut tree = int_tree(&bpm, 0);

    for v in [1, 2, 3] {
        let key = int_key(&tree, v);
        tree.insert(&key, rid(v)).unwrap();
    }
    let key = int_key(&tree, 99);
    tree.remove(&key).unwrap();
    assert_eq!(tree.iter().unwrap().count(), 3);
}

#[test]
fn test_scan_key_operators() {
    let dir = tempfile::tempdir().unwrap();
    let bpm = make_bpm(&dir, "scan.db", 16);
    let mut tree = int_tree(&bpm, 0);

    for v in 1..=10 {
        let key = int_key(&tree, v);
        tree.insert(&key, rid(v)).unwrap();
    }
    let probe = int_key(&tree, 5);

    let collect = |op| {
        tree.scan_key(&probe, op)
            .unwrap()
            .into_iter()
            .collect::<Vec<RowId>>()
    };
    assert_eq!(collect(ComparisonOp::Equal), vec![rid(5)]);
    assert_eq!(
        collect(ComparisonOp::Less),
        (1..5).map(rid).collect::<Vec<_>>()
    );
    assert_eq!(
        collect(ComparisonOp::LessEqual),
        (1..=5).map(rid).collect::<Vec<_>>()
    );
    assert_eq!(
        collect(ComparisonOp::Greater),
        (6..=10).map(rid).collect::<Vec<_>>()
    );
    assert_eq!(
        collect(ComparisonOp::GreaterEqual),
        (5..=10).map(rid).collect::<Vec<_>>()
    );
    assert_eq!(
        collect(ComparisonOp::NotEqual),
        (1..=10).filter(|&v| v != 5).map(rid).collect::<Vec<_>>()
    );

    // A probe that hits nothing.
    let missing = int_key(&tree, 42);
    assert_eq!(tree.scan_key(&missing, ComparisonOp::Equal).unwrap(), vec![]);
    assert!(bpm.check_all_unpinned());
}

#[test]
fn test_iter_from_positions_at_first_ge_key() {
    let dir = tempfile::tempdir().unwrap();
    let bpm = make_bpm(&dir, "from.db", 16);
    let mut tree = int_tree(&bpm, 0);

    for v in (0..100).step_by(2) {
        let key = int_key(&tree, v);
        tree.insert(&key, rid(v)).unwrap();
    }

    // 51 is absent; the iterator starts at 52.
    let probe = int_key(&tree, 51);
    let first = tree.iter_from(&probe).unwrap().next().unwrap().unwrap();
    assert_eq!(first.1, rid(52));

    // Past the end of the keyspace the iterator is exhausted.
    let probe = int_key(&tree, 1000);
    assert_eq!(tree.iter_from(&probe).unwrap().count(), 0);
}

#[test]
fn test_root_and_lookups_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("persist.db");
    {
        let disk = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(64, 2, disk));
        let mut tree = int_tree(&bpm, 9);
        for v in 0..500 {
            let key = int_key(&tree, v);
            tree.insert(&key, rid(v)).unwrap();
        }
        bpm.flush_all_pages().unwrap();
    }
    {
        let disk = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(64, 2, disk));
        let tree = int_tree(&bpm, 9);
        assert!(!tree.is_empty());
        for v in 0..500 {
            let key = int_key(&tree, v);
            assert_eq!(tree.get_value(&key).unwrap(), Some(rid(v)), "key {v}");
        }
        audit_tree(&tree, &bpm);
    }
}

#[test]
fn test_key_too_large_for_fanout() {
    let dir = tempfile::tempdir().unwrap();
    let bpm = make_bpm(&dir, "wide.db", 16);
    let km = KeyManager::new(Schema::builder().column("k", DataType::Char(2000)).build_arc());
    assert!(matches!(
        BPlusTree::new(0, bpm, km),
        Err(RillError::KeyTooLarge(_))
    ));
}

#[test]
fn test_destroy_releases_pages() {
    let dir = tempfile::tempdir().unwrap();
    let bpm = make_bpm(&dir, "destroy.db", 64);
    let mut tree = narrow_tree(&bpm, 0);
    for v in 0..100 {
        let key = char_key(&tree, v);
        tree.insert(&key, rid(v)).unwrap();
    }
    tree.destroy().unwrap();
    assert!(tree.is_empty());
    assert!(bpm.check_all_unpinned());

    // A fresh tree under the same index id starts empty.
    let tree = narrow_tree(&bpm, 0);
    assert!(tree.is_empty());
}
