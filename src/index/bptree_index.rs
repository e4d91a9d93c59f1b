use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{IndexId, Result, RillError, RowId};
use crate::record::{Row, Schema};

use super::{BPlusTree, ComparisonOp, KeyManager};

/// Row-facing wrapper over a B+tree: owns the key-column mapping and turns
/// table rows into fixed-width keys before they reach the tree.
pub struct BPlusTreeIndex {
    index_id: IndexId,
    key_ordinals: Vec<u32>,
    tree: BPlusTree,
}

impl BPlusTreeIndex {
    /// Builds the index over `table_schema`'s columns at `key_ordinals`.
    /// The tree adopts its persisted root if the index already exists.
    pub fn new(
        index_id: IndexId,
        table_schema: &Schema,
        key_ordinals: Vec<u32>,
        bpm: Arc<BufferPoolManager>,
    ) -> Result<Self> {
        let key_schema = table_schema
            .project(&key_ordinals)
            .ok_or_else(|| RillError::ColumnNotExist(format!("ordinals {:?}", key_ordinals)))?;
        let key_manager = KeyManager::new(Arc::new(key_schema));
        let tree = BPlusTree::new(index_id, bpm, key_manager)?;
        Ok(Self {
            index_id,
            key_ordinals,
            tree,
        })
    }

    pub fn index_id(&self) -> IndexId {
        self.index_id
    }

    pub fn key_ordinals(&self) -> &[u32] {
        &self.key_ordinals
    }

    pub fn tree(&self) -> &BPlusTree {
        &self.tree
    }

    fn key_of(&self, row: &Row) -> Result<Vec<u8>> {
        let key_row = row
            .project(&self.key_ordinals)
            .ok_or(RillError::SchemaMismatch)?;
        self.tree.key_manager().encode_key(&key_row)
    }

    /// Indexes a table row under its key columns.
    pub fn insert_entry(&mut self, row: &Row, rid: RowId) -> Result<()> {
        let key = self.key_of(row)?;
        self.tree.insert(&key, rid)
    }

    /// Drops the entry for a table row's key.
    pub fn remove_entry(&mut self, row: &Row) -> Result<()> {
        let key = self.key_of(row)?;
        self.tree.remove(&key)
    }

    /// Point lookup by key row (fields in key-column order).
    pub fn get_rid(&self, key_row: &Row) -> Result<Option<RowId>> {
        let key = self.tree.key_manager().encode_key(key_row)?;
        self.tree.get_value(&key)
    }

    /// Ranged lookup by key row.
    pub fn scan(&self, key_row: &Row, op: ComparisonOp) -> Result<Vec<RowId>> {
        let key = self.tree.key_manager().encode_key(key_row)?;
        self.tree.scan_key(&key, op)
    }

    /// Frees the whole tree.
    pub fn destroy(&mut self) -> Result<()> {
        self.tree.destroy()
    }
}
