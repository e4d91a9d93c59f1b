use std::sync::Arc;

use tracing::debug;

use crate::buffer::BufferPoolManager;
use crate::common::{
    IndexId, PageId, Result, RillError, RowId, INDEX_ROOTS_PAGE_ID, INVALID_PAGE_ID, PAGE_SIZE,
};
use crate::storage::page::{IndexRootsPage, IndexRootsPageRef};

use super::bptree_page::{
    node_kind, node_max_size, node_min_size, node_parent_page_id, node_size,
    set_node_parent_page_id, InternalPageMut, InternalPageRef, LeafPageMut, LeafPageRef, NodeKind,
    INTERNAL_PAGE_HEADER_SIZE, LEAF_PAGE_HEADER_SIZE,
};
use super::KeyManager;

const CHILD_SIZE: usize = 4;

/// Comparison operators accepted by `scan_key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

enum RootAction {
    Insert,
    Update,
    Delete,
}

/// A disk-resident B+tree over fixed-width keys. Nodes are pages; children
/// and siblings are referenced by `PageId` and every typed view is scoped to
/// one pinned guard. Keys are unique; leaves form an ascending chain.
pub struct BPlusTree {
    index_id: IndexId,
    root_page_id: PageId,
    bpm: Arc<BufferPoolManager>,
    key_manager: KeyManager,
    leaf_max: usize,
    internal_max: usize,
    /// Pages emptied during a remove, deleted after the recursion unwinds
    /// and every pin is released.
    deleted_pages: Vec<PageId>,
}

impl BPlusTree {
    /// Adopts the root recorded for `index_id` in the index-roots page, or
    /// starts empty when none is recorded.
    pub fn new(index_id: IndexId, bpm: Arc<BufferPoolManager>, key_manager: KeyManager) -> Result<Self> {
        let key_size = key_manager.key_size();
        let leaf_cap = (PAGE_SIZE - LEAF_PAGE_HEADER_SIZE) / (key_size + RowId::ENCODED_SIZE);
        let internal_cap = (PAGE_SIZE - INTERNAL_PAGE_HEADER_SIZE) / (key_size + CHILD_SIZE);
        // One slot of headroom for the entry that triggers a split, rounded
        // to an even size so a split yields two halves at exactly max/2.
        let leaf_max = leaf_cap.saturating_sub(1) & !1;
        let internal_max = internal_cap.saturating_sub(1) & !1;
        if leaf_max < 3 || internal_max < 3 {
            return Err(RillError::KeyTooLarge(key_size));
        }

        let root_page_id = {
            let guard = bpm.checked_read_page(INDEX_ROOTS_PAGE_ID)?;
            let view = IndexRootsPageRef::new(guard.data());
            if view.is_valid() {
                view.get_root_id(index_id).unwrap_or(INVALID_PAGE_ID)
            } else {
                INVALID_PAGE_ID
            }
        };

        Ok(Self {
            index_id,
            root_page_id,
            bpm,
            key_manager,
            leaf_max,
            internal_max,
            deleted_pages: Vec::new(),
        })
    }

    pub fn index_id(&self) -> IndexId {
        self.index_id
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    pub fn key_manager(&self) -> &KeyManager {
        &self.key_manager
    }

    pub fn is_empty(&self) -> bool {
        !self.root_page_id.is_valid()
    }

    /// Records the current root (or its removal) in the index-roots page.
    fn write_root_mapping(&self, action: RootAction) -> Result<()> {
        let mut guard = self.bpm.checked_write_page(INDEX_ROOTS_PAGE_ID)?;
        let mut page = IndexRootsPage::new(guard.data_mut());
        page.init_if_needed();
        let ok = match action {
            RootAction::Insert => page.insert(self.index_id, self.root_page_id),
            RootAction::Update => page.update(self.index_id, self.root_page_id),
            RootAction::Delete => page.delete(self.index_id),
        };
        if !ok {
            return Err(RillError::InvalidDatabaseFile(format!(
                "index-roots entry out of sync for index {}",
                self.index_id
            )));
        }
        Ok(())
    }

    /// Descends to the leaf that owns `key` (or the leftmost leaf), pinning
    /// one level at a time.
    fn find_leaf(&self, key: &[u8], leftmost: bool) -> Result<PageId> {
        let mut page_id = self.root_page_id;
        loop {
            let guard = self.bpm.checked_read_page(page_id)?;
            let data = guard.data();
            match node_kind(data) {
                Some(NodeKind::Leaf) => return Ok(page_id),
                Some(NodeKind::Internal) => {
                    let node = InternalPageRef::new(data);
                    page_id = if leftmost {
                        node.child_at(0)
                    } else {
                        node.lookup(key, &self.key_manager)
                    };
                }
                None => {
                    return Err(RillError::InvalidDatabaseFile(format!(
                        "page {} is not a tree node",
                        page_id
                    )))
                }
            }
        }
    }

    /// Point lookup.
    pub fn get_value(&self, key: &[u8]) -> Result<Option<RowId>> {
        if self.is_empty() {
            return Ok(None);
        }
        let leaf_pid = self.find_leaf(key, false)?;
        let guard = self.bpm.checked_read_page(leaf_pid)?;
        Ok(LeafPageRef::new(guard.data()).lookup(key, &self.key_manager))
    }

    /// Inserts a unique key. `DuplicateKey` when the key is already present.
    pub fn insert(&mut self, key: &[u8], rid: RowId) -> Result<()> {
        if self.is_empty() {
            return self.start_new_tree(key, rid);
        }
        let leaf_pid = self.find_leaf(key, false)?;
        {
            let guard = self.bpm.checked_read_page(leaf_pid)?;
            if LeafPageRef::new(guard.data())
                .lookup(key, &self.key_manager)
                .is_some()
            {
                return Err(RillError::DuplicateKey);
            }
        }
        let new_size = {
            let mut guard = self.bpm.checked_write_page(leaf_pid)?;
            let mut leaf = LeafPageMut::new(guard.data_mut());
            leaf.insert(key, rid, &self.key_manager)
        };
        if new_size < self.leaf_max {
            return Ok(());
        }
        self.split_leaf(leaf_pid)
    }

    fn start_new_tree(&mut self, key: &[u8], rid: RowId) -> Result<()> {
        let root_pid = self.bpm.new_page()?;
        {
            let mut guard = self.bpm.checked_write_page(root_pid)?;
            let mut leaf = LeafPageMut::init(
                guard.data_mut(),
                root_pid,
                INVALID_PAGE_ID,
                self.key_manager.key_size(),
                self.leaf_max,
            );
            leaf.insert(key, rid, &self.key_manager);
        }
        self.root_page_id = root_pid;
        self.write_root_mapping(RootAction::Insert)?;
        debug!(index = self.index_id, root = root_pid.as_i32(), "started new tree");
        Ok(())
    }

    fn split_leaf(&mut self, leaf_pid: PageId) -> Result<()> {
        let new_pid = self.bpm.new_page()?;
        let (risen_key, parent_pid) = {
            let mut old_guard = self.bpm.checked_write_page(leaf_pid)?;
            let mut new_guard = self.bpm.checked_write_page(new_pid)?;
            let parent_pid = node_parent_page_id(old_guard.data());
            let mut old_leaf = LeafPageMut::new(old_guard.data_mut());
            let mut new_leaf = LeafPageMut::init(
                new_guard.data_mut(),
                new_pid,
                parent_pid,
                self.key_manager.key_size(),
                self.leaf_max,
            );
            old_leaf.move_half_to(&mut new_leaf);
            new_leaf.set_next_page_id(old_leaf.next_page_id());
            old_leaf.set_next_page_id(new_pid);
            (new_leaf.key_at(0).to_vec(), parent_pid)
        };
        self.insert_into_parent(leaf_pid, &risen_key, new_pid, parent_pid)
    }

    /// Hooks `right` into `left`'s parent after a split, growing a new root
    /// when `left` was the root and splitting the parent recursively when it
    /// overflows. The risen key out of an internal split is the new
    /// sibling's slot-0 key, which stays behind as its dummy.
    fn insert_into_parent(
        &mut self,
        left_pid: PageId,
        key: &[u8],
        right_pid: PageId,
        parent_pid: PageId,
    ) -> Result<()> {
        if !parent_pid.is_valid() {
            let new_root = self.bpm.new_page()?;
            {
                let mut guard = self.bpm.checked_write_page(new_root)?;
                let mut root = InternalPageMut::init(
                    guard.data_mut(),
                    new_root,
                    INVALID_PAGE_ID,
                    self.key_manager.key_size(),
                    self.internal_max,
                );
                root.populate_new_root(left_pid, key, right_pid);
            }
            for pid in [left_pid, right_pid] {
                let mut guard = self.bpm.checked_write_page(pid)?;
                set_node_parent_page_id(guard.data_mut(), new_root);
            }
            self.root_page_id = new_root;
            self.write_root_mapping(RootAction::Update)?;
            debug!(index = self.index_id, root = new_root.as_i32(), "grew new root");
            return Ok(());
        }

        let new_size = {
            let mut guard = self.bpm.checked_write_page(parent_pid)?;
            let mut parent = InternalPageMut::new(guard.data_mut());
            parent.insert_node_after(left_pid, key, right_pid)
        };
        if new_size < self.internal_max {
            return Ok(());
        }

        // The parent overflowed in turn.
        let new_pid = self.bpm.new_page()?;
        let (risen_key, moved_children, grandparent) = {
            let mut old_guard = self.bpm.checked_write_page(parent_pid)?;
            let mut new_guard = self.bpm.checked_write_page(new_pid)?;
            let grandparent = node_parent_page_id(old_guard.data());
            let mut old_node = InternalPageMut::new(old_guard.data_mut());
            let mut new_node = InternalPageMut::init(
                new_guard.data_mut(),
                new_pid,
                grandparent,
                self.key_manager.key_size(),
                self.internal_max,
            );
            let moved = old_node.move_half_to(&mut new_node);
            (new_node.key_at(0).to_vec(), moved, grandparent)
        };
        for child in moved_children {
            let mut guard = self.bpm.checked_write_page(child)?;
            set_node_parent_page_id(guard.data_mut(), new_pid);
        }
        self.insert_into_parent(parent_pid, &risen_key, new_pid, grandparent)
    }

    /// Removes `key` if present, rebalancing with redistribute-then-coalesce
    /// and shrinking the root when it empties.
    pub fn remove(&mut self, key: &[u8]) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let leaf_pid = self.find_leaf(key, false)?;
        let underflow = {
            let mut guard = self.bpm.checked_write_page(leaf_pid)?;
            if LeafPageRef::new(guard.data())
                .lookup(key, &self.key_manager)
                .is_none()
            {
                return Ok(());
            }
            let mut leaf = LeafPageMut::new(guard.data_mut());
            let new_size = leaf
                .remove_record(key, &self.key_manager)
                .expect("key present under lock");
            new_size < leaf.min_size()
        };
        if underflow {
            self.coalesce_or_redistribute(leaf_pid)?;
        }
        self.drain_deleted_pages()
    }

    fn drain_deleted_pages(&mut self) -> Result<()> {
        for pid in std::mem::take(&mut self.deleted_pages) {
            self.bpm.delete_page(pid)?;
        }
        Ok(())
    }

    /// Brings an underfull node back within bounds. Root nodes go through
    /// `adjust_root` instead.
    fn coalesce_or_redistribute(&mut self, node_pid: PageId) -> Result<()> {
        let (parent_pid, size, min) = {
            let guard = self.bpm.checked_read_page(node_pid)?;
            let data = guard.data();
            (node_parent_page_id(data), node_size(data), node_min_size(data))
        };
        if !parent_pid.is_valid() {
            return self.adjust_root(node_pid);
        }
        if size >= min {
            return Ok(());
        }

        let (index, sibling_pid) = {
            let guard = self.bpm.checked_read_page(parent_pid)?;
            let parent = InternalPageRef::new(guard.data());
            let index = parent.value_index(node_pid).ok_or_else(|| {
                RillError::InvalidDatabaseFile(format!(
                    "page {} missing from its parent {}",
                    node_pid, parent_pid
                ))
            })?;
            let sibling_index = if index == 0 { 1 } else { index - 1 };
            (index, parent.child_at(sibling_index))
        };
        let (sibling_size, max) = {
            let guard = self.bpm.checked_read_page(sibling_pid)?;
            (node_size(guard.data()), node_max_size(guard.data()))
        };

        if size + sibling_size >= max {
            self.redistribute(node_pid, sibling_pid, parent_pid, index)
        } else {
            self.coalesce(node_pid, sibling_pid, parent_pid, index)
        }
    }

    /// Merges the right node of the pair into the left and removes the
    /// separating entry from the parent, then rebalances the parent.
    fn coalesce(
        &mut self,
        node_pid: PageId,
        sibling_pid: PageId,
        parent_pid: PageId,
        index: usize,
    ) -> Result<()> {
        let (left_pid, right_pid) = if index == 0 {
            (node_pid, sibling_pid)
        } else {
            (sibling_pid, node_pid)
        };

        let kind = {
            let guard = self.bpm.checked_read_page(left_pid)?;
            node_kind(guard.data()).ok_or_else(|| {
                RillError::InvalidDatabaseFile(format!("page {} is not a tree node", left_pid))
            })?
        };

        match kind {
            NodeKind::Leaf => {
                let mut left_guard = self.bpm.checked_write_page(left_pid)?;
                let mut right_guard = self.bpm.checked_write_page(right_pid)?;
                let mut left = LeafPageMut::new(left_guard.data_mut());
                let mut right = LeafPageMut::new(right_guard.data_mut());
                right.move_all_to(&mut left);
            }
            NodeKind::Internal => {
                let middle_key = {
                    let guard = self.bpm.checked_read_page(parent_pid)?;
                    let parent = InternalPageRef::new(guard.data());
                    let right_index = parent.value_index(right_pid).ok_or_else(|| {
                        RillError::InvalidDatabaseFile(format!(
                            "page {} missing from its parent {}",
                            right_pid, parent_pid
                        ))
                    })?;
                    parent.key_at(right_index).to_vec()
                };
                let moved_children = {
                    let mut left_guard = self.bpm.checked_write_page(left_pid)?;
                    let mut right_guard = self.bpm.checked_write_page(right_pid)?;
                    let mut left = InternalPageMut::new(left_guard.data_mut());
                    let mut right = InternalPageMut::new(right_guard.data_mut());
                    right.move_all_to(&mut left, &middle_key)
                };
                for child in moved_children {
                    let mut guard = self.bpm.checked_write_page(child)?;
                    set_node_parent_page_id(guard.data_mut(), left_pid);
                }
            }
        }

        {
            let mut guard = self.bpm.checked_write_page(parent_pid)?;
            let mut parent = InternalPageMut::new(guard.data_mut());
            let right_index = parent.value_index(right_pid).ok_or_else(|| {
                RillError::InvalidDatabaseFile(format!(
                    "page {} missing from its parent {}",
                    right_pid, parent_pid
                ))
            })?;
            parent.remove(right_index);
        }
        self.deleted_pages.push(right_pid);

        self.coalesce_or_redistribute(parent_pid)
    }

    /// Borrows one entry from the sibling, rotating the separator through
    /// the parent.
    fn redistribute(
        &mut self,
        node_pid: PageId,
        sibling_pid: PageId,
        parent_pid: PageId,
        index: usize,
    ) -> Result<()> {
        let kind = {
            let guard = self.bpm.checked_read_page(node_pid)?;
            node_kind(guard.data()).ok_or_else(|| {
                RillError::InvalidDatabaseFile(format!("page {} is not a tree node", node_pid))
            })?
        };

        // The parent key slot that separates node from sibling.
        let separator_index = if index == 0 { 1 } else { index };

        match kind {
            NodeKind::Leaf => {
                let new_separator = {
                    let mut node_guard = self.bpm.checked_write_page(node_pid)?;
                    let mut sib_guard = self.bpm.checked_write_page(sibling_pid)?;
                    let mut node = LeafPageMut::new(node_guard.data_mut());
                    let mut sibling = LeafPageMut::new(sib_guard.data_mut());
                    if index == 0 {
                        // Sibling is on the right: take its first entry.
                        sibling.move_first_to_end_of(&mut node);
                        sibling.key_at(0).to_vec()
                    } else {
                        // Sibling is on the left: take its last entry.
                        sibling.move_last_to_front_of(&mut node);
                        node.key_at(0).to_vec()
                    }
                };
                let mut guard = self.bpm.checked_write_page(parent_pid)?;
                let mut parent = InternalPageMut::new(guard.data_mut());
                parent.set_key_at(separator_index, &new_separator);
            }
            NodeKind::Internal => {
                let middle_key = {
                    let guard = self.bpm.checked_read_page(parent_pid)?;
                    InternalPageRef::new(guard.data())
                        .key_at(separator_index)
                        .to_vec()
                };
                let (new_separator, moved_child) = {
                    let mut node_guard = self.bpm.checked_write_page(node_pid)?;
                    let mut sib_guard = self.bpm.checked_write_page(sibling_pid)?;
                    let mut node = InternalPageMut::new(node_guard.data_mut());
                    let mut sibling = InternalPageMut::new(sib_guard.data_mut());
                    if index == 0 {
                        let new_separator = sibling.key_at(1).to_vec();
                        let child = sibling.move_first_to_end_of(&mut node, &middle_key);
                        (new_separator, child)
                    } else {
                        let last = sibling.size() - 1;
                        let new_separator = sibling.key_at(last).to_vec();
                        let child = sibling.move_last_to_front_of(&mut node, &middle_key);
                        (new_separator, child)
                    }
                };
                {
                    let mut guard = self.bpm.checked_write_page(moved_child)?;
                    set_node_parent_page_id(guard.data_mut(), node_pid);
                }
                let mut guard = self.bpm.checked_write_page(parent_pid)?;
                let mut parent = InternalPageMut::new(guard.data_mut());
                parent.set_key_at(separator_index, &new_separator);
            }
        }
        Ok(())
    }

    /// Root shrinkage: an internal root with one child hands the root role
    /// to that child; an emptied leaf root ends the tree.
    fn adjust_root(&mut self, root_pid: PageId) -> Result<()> {
        let (kind, size) = {
            let guard = self.bpm.checked_read_page(root_pid)?;
            let data = guard.data();
            (
                node_kind(data).ok_or_else(|| {
                    RillError::InvalidDatabaseFile(format!("page {} is not a tree node", root_pid))
                })?,
                node_size(data),
            )
        };
        match (kind, size) {
            (NodeKind::Internal, 1) => {
                let only_child = {
                    let mut guard = self.bpm.checked_write_page(root_pid)?;
                    let mut root = InternalPageMut::new(guard.data_mut());
                    root.remove_and_return_only_child()
                };
                {
                    let mut guard = self.bpm.checked_write_page(only_child)?;
                    set_node_parent_page_id(guard.data_mut(), INVALID_PAGE_ID);
                }
                self.root_page_id = only_child;
                self.write_root_mapping(RootAction::Update)?;
                self.deleted_pages.push(root_pid);
                debug!(index = self.index_id, root = only_child.as_i32(), "root collapsed");
            }
            (NodeKind::Leaf, 0) => {
                self.root_page_id = INVALID_PAGE_ID;
                self.write_root_mapping(RootAction::Delete)?;
                self.deleted_pages.push(root_pid);
                debug!(index = self.index_id, "tree emptied");
            }
            _ => {}
        }
        Ok(())
    }

    /// Emits every RowId whose key satisfies `op` against `key`, in key
    /// order.
    pub fn scan_key(&self, key: &[u8], op: ComparisonOp) -> Result<Vec<RowId>> {
        let mut out = Vec::new();
        match op {
            ComparisonOp::Equal => {
                if let Some(rid) = self.get_value(key)? {
                    out.push(rid);
                }
            }
            ComparisonOp::Greater | ComparisonOp::GreaterEqual => {
                for item in self.iter_from(key)? {
                    let (entry_key, rid) = item?;
                    let ord = self.key_manager.compare(&entry_key, key);
                    if ord == std::cmp::Ordering::Equal && op == ComparisonOp::Greater {
                        continue;
                    }
                    out.push(rid);
                }
            }
            ComparisonOp::Less | ComparisonOp::LessEqual => {
                for item in self.iter()? {
                    let (entry_key, rid) = item?;
                    match self.key_manager.compare(&entry_key, key) {
                        std::cmp::Ordering::Less => out.push(rid),
                        std::cmp::Ordering::Equal if op == ComparisonOp::LessEqual => out.push(rid),
                        _ => break,
                    }
                }
            }
            ComparisonOp::NotEqual => {
                for item in self.iter()? {
                    let (entry_key, rid) = item?;
                    if self.key_manager.compare(&entry_key, key) != std::cmp::Ordering::Equal {
                        out.push(rid);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Iterator over the whole tree in key order.
    pub fn iter(&self) -> Result<super::TreeIterator<'_>> {
        if self.is_empty() {
            return Ok(super::TreeIterator::end(self));
        }
        let leftmost = self.find_leaf(&[], true)?;
        Ok(super::TreeIterator::at(self, leftmost, 0))
    }

    /// Iterator positioned at the first entry whose key is >= `key`.
    pub fn iter_from(&self, key: &[u8]) -> Result<super::TreeIterator<'_>> {
        if self.is_empty() {
            return Ok(super::TreeIterator::end(self));
        }
        let leaf_pid = self.find_leaf(key, false)?;
        let index = {
            let guard = self.bpm.checked_read_page(leaf_pid)?;
            LeafPageRef::new(guard.data()).key_index(key, &self.key_manager)
        };
        Ok(super::TreeIterator::at(self, leaf_pid, index))
    }

    pub(crate) fn bpm(&self) -> &Arc<BufferPoolManager> {
        &self.bpm
    }

    /// Frees every page of the tree and drops its index-roots entry.
    pub fn destroy(&mut self) -> Result<()> {
        if self.root_page_id.is_valid() {
            self.destroy_subtree(self.root_page_id)?;
            self.write_root_mapping(RootAction::Delete)?;
            self.root_page_id = INVALID_PAGE_ID;
            debug!(index = self.index_id, "destroyed tree");
        }
        Ok(())
    }

    fn destroy_subtree(&self, page_id: PageId) -> Result<()> {
        let children: Vec<PageId> = {
            let guard = self.bpm.checked_read_page(page_id)?;
            match node_kind(guard.data()) {
                Some(NodeKind::Internal) => {
                    let node = InternalPageRef::new(guard.data());
                    (0..node.size()).map(|i| node.child_at(i)).collect()
                }
                _ => Vec::new(),
            }
        };
        for child in children {
            self.destroy_subtree(child)?;
        }
        self.bpm.delete_page(page_id)?;
        Ok(())
    }
}
