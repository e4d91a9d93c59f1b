use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::buffer::BufferPoolManager;
use crate::common::{
    IndexId, PageId, Result, RillError, TableId, CATALOG_META_MAGIC, CATALOG_META_PAGE_ID,
    INDEX_ROOTS_PAGE_ID, PAGE_SIZE,
};
use crate::index::BPlusTreeIndex;
use crate::record::Schema;
use crate::storage::TableHeap;

use super::metadata::{IndexMetadata, TableMetadata};

/// The page-0 directory: which meta page describes each table and index.
///
/// magic | table_count | index_count | (table_id, meta_page_id)* |
/// (index_id, meta_page_id)*
#[derive(Debug, Default)]
struct CatalogMeta {
    table_meta_pages: BTreeMap<TableId, PageId>,
    index_meta_pages: BTreeMap<IndexId, PageId>,
}

impl CatalogMeta {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&CATALOG_META_MAGIC.to_le_bytes());
        buf.extend_from_slice(&(self.table_meta_pages.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(self.index_meta_pages.len() as u32).to_le_bytes());
        for (&table_id, &page_id) in &self.table_meta_pages {
            buf.extend_from_slice(&table_id.to_le_bytes());
            buf.extend_from_slice(&page_id.as_i32().to_le_bytes());
        }
        for (&index_id, &page_id) in &self.index_meta_pages {
            buf.extend_from_slice(&index_id.to_le_bytes());
            buf.extend_from_slice(&page_id.as_i32().to_le_bytes());
        }
        buf
    }

    fn deserialize(data: &[u8]) -> Option<Self> {
        let magic = u32::from_le_bytes(data.get(0..4)?.try_into().ok()?);
        if magic != CATALOG_META_MAGIC {
            return None;
        }
        let table_count = u32::from_le_bytes(data.get(4..8)?.try_into().ok()?) as usize;
        let index_count = u32::from_le_bytes(data.get(8..12)?.try_into().ok()?) as usize;
        let mut offset = 12;
        let mut meta = CatalogMeta::default();
        for _ in 0..table_count {
            let table_id = u32::from_le_bytes(data.get(offset..offset + 4)?.try_into().ok()?);
            let page_id = i32::from_le_bytes(data.get(offset + 4..offset + 8)?.try_into().ok()?);
            meta.table_meta_pages.insert(table_id, PageId::new(page_id));
            offset += 8;
        }
        for _ in 0..index_count {
            let index_id = u32::from_le_bytes(data.get(offset..offset + 4)?.try_into().ok()?);
            let page_id = i32::from_le_bytes(data.get(offset + 4..offset + 8)?.try_into().ok()?);
            meta.index_meta_pages.insert(index_id, PageId::new(page_id));
            offset += 8;
        }
        Some(meta)
    }
}

/// A table's metadata and its heap, owned by the catalog.
pub struct TableInfo {
    metadata: TableMetadata,
    heap: TableHeap,
}

impl TableInfo {
    pub fn table_id(&self) -> TableId {
        self.metadata.table_id()
    }

    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        self.metadata.schema()
    }

    pub fn heap(&self) -> &TableHeap {
        &self.heap
    }
}

/// An index's metadata and its tree, owned by the catalog.
pub struct IndexInfo {
    metadata: IndexMetadata,
    index: BPlusTreeIndex,
}

impl IndexInfo {
    pub fn index_id(&self) -> IndexId {
        self.metadata.index_id()
    }

    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    pub fn table_id(&self) -> TableId {
        self.metadata.table_id()
    }

    pub fn key_ordinals(&self) -> &[u32] {
        self.metadata.key_ordinals()
    }

    pub fn index(&self) -> &BPlusTreeIndex {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut BPlusTreeIndex {
        &mut self.index
    }
}

/// CatalogManager owns every table and index for the lifetime of a database
/// handle. Construction is the only place that distinguishes a fresh
/// database from a reopened one; every mutation re-serializes the catalog
/// meta page and flushes it together with the index-roots page.
pub struct CatalogManager {
    bpm: Arc<BufferPoolManager>,
    meta: CatalogMeta,
    tables: HashMap<TableId, TableInfo>,
    indexes: HashMap<IndexId, IndexInfo>,
    table_names: HashMap<String, TableId>,
    /// table name -> index name -> index id
    index_names: HashMap<String, HashMap<String, IndexId>>,
    next_table_id: TableId,
    next_index_id: IndexId,
}

impl CatalogManager {
    /// `init = true` formats a fresh catalog; otherwise the catalog is
    /// rebuilt from page 0 and each table/index meta page.
    pub fn new(bpm: Arc<BufferPoolManager>, init: bool) -> Result<Self> {
        let mut catalog = Self {
            bpm,
            meta: CatalogMeta::default(),
            tables: HashMap::new(),
            indexes: HashMap::new(),
            table_names: HashMap::new(),
            index_names: HashMap::new(),
            next_table_id: 0,
            next_index_id: 0,
        };

        if init {
            catalog.flush()?;
            debug!("initialized fresh catalog");
            return Ok(catalog);
        }

        catalog.meta = {
            let guard = catalog.bpm.checked_read_page(CATALOG_META_PAGE_ID)?;
            CatalogMeta::deserialize(guard.data()).ok_or_else(|| {
                RillError::InvalidDatabaseFile("catalog meta page is unreadable".into())
            })?
        };

        let table_pages: Vec<(TableId, PageId)> = catalog
            .meta
            .table_meta_pages
            .iter()
            .map(|(&t, &p)| (t, p))
            .collect();
        for (table_id, page_id) in table_pages {
            catalog.load_table(table_id, page_id)?;
        }

        let index_pages: Vec<(IndexId, PageId)> = catalog
            .meta
            .index_meta_pages
            .iter()
            .map(|(&i, &p)| (i, p))
            .collect();
        for (index_id, page_id) in index_pages {
            catalog.load_index(index_id, page_id)?;
        }

        catalog.next_table_id = catalog
            .meta
            .table_meta_pages
            .keys()
            .max()
            .map_or(0, |&id| id + 1);
        catalog.next_index_id = catalog
            .meta
            .index_meta_pages
            .keys()
            .max()
            .map_or(0, |&id| id + 1);

        debug!(
            tables = catalog.tables.len(),
            indexes = catalog.indexes.len(),
            "reopened catalog"
        );
        Ok(catalog)
    }

    fn load_table(&mut self, table_id: TableId, page_id: PageId) -> Result<()> {
        let metadata = {
            let guard = self.bpm.checked_read_page(page_id)?;
            TableMetadata::deserialize(guard.data()).ok_or_else(|| {
                RillError::InvalidDatabaseFile(format!("table meta page {} is unreadable", page_id))
            })?
        };
        if metadata.table_id() != table_id {
            return Err(RillError::InvalidDatabaseFile(format!(
                "table meta page {} names table {} but the catalog says {}",
                page_id,
                metadata.table_id(),
                table_id
            )));
        }
        let heap = TableHeap::open(
            Arc::clone(&self.bpm),
            metadata.schema().clone(),
            metadata.first_page_id(),
        );
        self.table_names.insert(metadata.name().to_string(), table_id);
        self.tables.insert(table_id, TableInfo { metadata, heap });
        Ok(())
    }

    fn load_index(&mut self, index_id: IndexId, page_id: PageId) -> Result<()> {
        let metadata = {
            let guard = self.bpm.checked_read_page(page_id)?;
            IndexMetadata::deserialize(guard.data()).ok_or_else(|| {
                RillError::InvalidDatabaseFile(format!("index meta page {} is unreadable", page_id))
            })?
        };
        let table = self.tables.get(&metadata.table_id()).ok_or_else(|| {
            RillError::InvalidDatabaseFile(format!(
                "index {} references missing table {}",
                metadata.name(),
                metadata.table_id()
            ))
        })?;
        let index = BPlusTreeIndex::new(
            index_id,
            table.schema(),
            metadata.key_ordinals().to_vec(),
            Arc::clone(&self.bpm),
        )?;
        self.index_names
            .entry(table.name().to_string())
            .or_default()
            .insert(metadata.name().to_string(), index_id);
        self.indexes.insert(index_id, IndexInfo { metadata, index });
        Ok(())
    }

    /// Creates a table and its (single-page) heap. The name must be unused.
    pub fn create_table(&mut self, name: &str, schema: Schema) -> Result<&TableInfo> {
        if self.table_names.contains_key(name) {
            return Err(RillError::TableAlreadyExist(name.to_string()));
        }

        let table_id = self.next_table_id;
        self.next_table_id += 1;

        let meta_page_id = self.bpm.new_page()?;
        let schema = Arc::new(schema);
        let heap = TableHeap::create(Arc::clone(&self.bpm), Arc::clone(&schema))?;
        let metadata = TableMetadata::new(table_id, name, heap.first_page_id(), schema);
        self.write_meta_page(meta_page_id, &metadata.serialize())?;

        self.meta.table_meta_pages.insert(table_id, meta_page_id);
        self.table_names.insert(name.to_string(), table_id);
        self.tables.insert(table_id, TableInfo { metadata, heap });
        self.flush()?;

        debug!(table = name, id = table_id, "created table");
        Ok(self.tables.get(&table_id).expect("just inserted"))
    }

    fn write_meta_page(&self, page_id: PageId, bytes: &[u8]) -> Result<()> {
        if bytes.len() > PAGE_SIZE {
            return Err(RillError::PageFull {
                needed: bytes.len(),
                available: PAGE_SIZE,
            });
        }
        let mut guard = self.bpm.checked_write_page(page_id)?;
        guard.data_mut()[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn get_table(&self, name: &str) -> Result<&TableInfo> {
        let table_id = self
            .table_names
            .get(name)
            .ok_or_else(|| RillError::TableNotExist(name.to_string()))?;
        Ok(&self.tables[table_id])
    }

    pub fn get_table_by_id(&self, table_id: TableId) -> Result<&TableInfo> {
        self.tables
            .get(&table_id)
            .ok_or_else(|| RillError::TableNotExist(format!("#{}", table_id)))
    }

    pub fn get_tables(&self) -> Vec<&TableInfo> {
        let mut tables: Vec<&TableInfo> = self.tables.values().collect();
        tables.sort_by_key(|t| t.table_id());
        tables
    }

    /// Creates an empty B+tree index over `key_columns` of `table_name`.
    /// Existing rows are not indexed here; the caller decides whether to
    /// backfill.
    pub fn create_index(
        &mut self,
        table_name: &str,
        index_name: &str,
        key_columns: &[&str],
    ) -> Result<&IndexInfo> {
        let table_id = *self
            .table_names
            .get(table_name)
            .ok_or_else(|| RillError::TableNotExist(table_name.to_string()))?;
        if self
            .index_names
            .get(table_name)
            .is_some_and(|by_name| by_name.contains_key(index_name))
        {
            return Err(RillError::IndexAlreadyExist(index_name.to_string()));
        }

        let schema = Arc::clone(self.tables[&table_id].schema());
        let key_ordinals: Vec<u32> = key_columns
            .iter()
            .map(|&col| {
                schema
                    .column_ordinal(col)
                    .ok_or_else(|| RillError::ColumnNotExist(col.to_string()))
            })
            .collect::<Result<_>>()?;

        let index_id = self.next_index_id;
        self.next_index_id += 1;

        let meta_page_id = self.bpm.new_page()?;
        let metadata = IndexMetadata::new(index_id, index_name, table_id, key_ordinals.clone());
        self.write_meta_page(meta_page_id, &metadata.serialize())?;

        let index = BPlusTreeIndex::new(index_id, &schema, key_ordinals, Arc::clone(&self.bpm))?;

        self.meta.index_meta_pages.insert(index_id, meta_page_id);
        self.index_names
            .entry(table_name.to_string())
            .or_default()
            .insert(index_name.to_string(), index_id);
        self.indexes.insert(index_id, IndexInfo { metadata, index });
        self.flush()?;

        debug!(table = table_name, index = index_name, id = index_id, "created index");
        Ok(self.indexes.get(&index_id).expect("just inserted"))
    }

    pub fn get_index(&self, table_name: &str, index_name: &str) -> Result<&IndexInfo> {
        let index_id = self.find_index_id(table_name, index_name)?;
        Ok(&self.indexes[&index_id])
    }

    pub fn get_index_mut(&mut self, table_name: &str, index_name: &str) -> Result<&mut IndexInfo> {
        let index_id = self.find_index_id(table_name, index_name)?;
        Ok(self.indexes.get_mut(&index_id).expect("maps in sync"))
    }

    fn find_index_id(&self, table_name: &str, index_name: &str) -> Result<IndexId> {
        if !self.table_names.contains_key(table_name) {
            return Err(RillError::TableNotExist(table_name.to_string()));
        }
        self.index_names
            .get(table_name)
            .and_then(|by_name| by_name.get(index_name))
            .copied()
            .ok_or_else(|| RillError::IndexNotFound(index_name.to_string()))
    }

    pub fn get_table_indexes(&self, table_name: &str) -> Result<Vec<&IndexInfo>> {
        if !self.table_names.contains_key(table_name) {
            return Err(RillError::TableNotExist(table_name.to_string()));
        }
        let mut indexes: Vec<&IndexInfo> = self
            .index_names
            .get(table_name)
            .into_iter()
            .flat_map(|by_name| by_name.values())
            .map(|id| &self.indexes[id])
            .collect();
        indexes.sort_by_key(|i| i.index_id());
        Ok(indexes)
    }

    /// Drops a table: every index on it, the whole heap chain, and its meta
    /// page.
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        let table_id = *self
            .table_names
            .get(name)
            .ok_or_else(|| RillError::TableNotExist(name.to_string()))?;

        let index_ids: Vec<IndexId> = self
            .index_names
            .remove(name)
            .map(|by_name| by_name.into_values().collect())
            .unwrap_or_default();
        for index_id in index_ids {
            self.destroy_index(index_id)?;
        }

        let table = self.tables.remove(&table_id).expect("maps in sync");
        table.heap.free_pages()?;

        let meta_page_id = self
            .meta
            .table_meta_pages
            .remove(&table_id)
            .expect("maps in sync");
        self.bpm.delete_page(meta_page_id)?;
        self.table_names.remove(name);
        self.flush()?;

        debug!(table = name, id = table_id, "dropped table");
        Ok(())
    }

    /// Drops one index: its tree pages, roots entry, and meta page.
    pub fn drop_index(&mut self, table_name: &str, index_name: &str) -> Result<()> {
        let index_id = self.find_index_id(table_name, index_name)?;
        self.destroy_index(index_id)?;
        if let Some(by_name) = self.index_names.get_mut(table_name) {
            by_name.remove(index_name);
        }
        self.flush()?;
        debug!(table = table_name, index = index_name, "dropped index");
        Ok(())
    }

    fn destroy_index(&mut self, index_id: IndexId) -> Result<()> {
        if let Some(mut info) = self.indexes.remove(&index_id) {
            info.index.destroy()?;
        } else {
            warn!(index = index_id, "index registered but not loaded");
        }
        if let Some(meta_page_id) = self.meta.index_meta_pages.remove(&index_id) {
            self.bpm.delete_page(meta_page_id)?;
        }
        Ok(())
    }

    /// Serializes the catalog meta page and flushes it together with the
    /// index-roots page.
    pub fn flush(&self) -> Result<()> {
        let bytes = self.meta.serialize();
        if bytes.len() > PAGE_SIZE {
            return Err(RillError::PageFull {
                needed: bytes.len(),
                available: PAGE_SIZE,
            });
        }
        {
            let mut guard = self.bpm.checked_write_page(CATALOG_META_PAGE_ID)?;
            let data = guard.data_mut();
            data.fill(0);
            data[..bytes.len()].copy_from_slice(&bytes);
        }
        self.bpm.flush_page(CATALOG_META_PAGE_ID)?;
        self.bpm.flush_page(INDEX_ROOTS_PAGE_ID)?;
        Ok(())
    }
}
