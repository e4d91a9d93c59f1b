use crate::common::{IndexId, PageId, INDEX_ROOTS_MAGIC, PAGE_SIZE};

/// The index-roots page (reserved page 1) is the only durable map from an
/// index id to its tree's root page. Layout:
///
/// magic | entry_count | (index_id u32, root_page_id i32)*
const MAGIC_OFFSET: usize = 0;
const COUNT_OFFSET: usize = 4;
const ENTRIES_OFFSET: usize = 8;
const ENTRY_SIZE: usize = 8;

pub const MAX_INDEX_ROOTS: usize = (PAGE_SIZE - ENTRIES_OFFSET) / ENTRY_SIZE;

pub struct IndexRootsPage<'a> {
    data: &'a mut [u8],
}

impl<'a> IndexRootsPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn init(&mut self) {
        self.data.fill(0);
        self.data[MAGIC_OFFSET..MAGIC_OFFSET + 4]
            .copy_from_slice(&INDEX_ROOTS_MAGIC.to_le_bytes());
        self.set_count(0);
    }

    pub fn is_valid(&self) -> bool {
        u32::from_le_bytes(self.data[MAGIC_OFFSET..MAGIC_OFFSET + 4].try_into().unwrap())
            == INDEX_ROOTS_MAGIC
    }

    /// A zeroed reserved page is formatted on first use.
    pub fn init_if_needed(&mut self) {
        if !self.is_valid() {
            self.init();
        }
    }

    pub fn count(&self) -> usize {
        u32::from_le_bytes(self.data[COUNT_OFFSET..COUNT_OFFSET + 4].try_into().unwrap()) as usize
    }

    fn set_count(&mut self, count: usize) {
        self.data[COUNT_OFFSET..COUNT_OFFSET + 4]
            .copy_from_slice(&(count as u32).to_le_bytes());
    }

    fn entry(&self, i: usize) -> (IndexId, PageId) {
        let base = ENTRIES_OFFSET + i * ENTRY_SIZE;
        let index_id = u32::from_le_bytes(self.data[base..base + 4].try_into().unwrap());
        let root = i32::from_le_bytes(self.data[base + 4..base + 8].try_into().unwrap());
        (index_id, PageId::new(root))
    }

    fn set_entry(&mut self, i: usize, index_id: IndexId, root: PageId) {
        let base = ENTRIES_OFFSET + i * ENTRY_SIZE;
        self.data[base..base + 4].copy_from_slice(&index_id.to_le_bytes());
        self.data[base + 4..base + 8].copy_from_slice(&root.as_i32().to_le_bytes());
    }

    fn position(&self, index_id: IndexId) -> Option<usize> {
        (0..self.count()).find(|&i| self.entry(i).0 == index_id)
    }

    pub fn get_root_id(&self, index_id: IndexId) -> Option<PageId> {
        self.position(index_id).map(|i| self.entry(i).1)
    }

    /// Registers a new index's root. Returns false when the id is already
    /// present or the page is full.
    pub fn insert(&mut self, index_id: IndexId, root: PageId) -> bool {
        if self.position(index_id).is_some() || self.count() >= MAX_INDEX_ROOTS {
            return false;
        }
        let count = self.count();
        self.set_entry(count, index_id, root);
        self.set_count(count + 1);
        true
    }

    /// Re-points an existing index at a new root. Returns false when absent.
    pub fn update(&mut self, index_id: IndexId, root: PageId) -> bool {
        match self.position(index_id) {
            Some(i) => {
                self.set_entry(i, index_id, root);
                true
            }
            None => false,
        }
    }

    /// Removes an index's entry (swap-remove; order is not meaningful).
    pub fn delete(&mut self, index_id: IndexId) -> bool {
        match self.position(index_id) {
            Some(i) => {
                let count = self.count();
                if i < count - 1 {
                    let (last_id, last_root) = self.entry(count - 1);
                    self.set_entry(i, last_id, last_root);
                }
                self.set_count(count - 1);
                true
            }
            None => false,
        }
    }
}

/// Read-only view of the index-roots page.
pub struct IndexRootsPageRef<'a> {
    data: &'a [u8],
}

impl<'a> IndexRootsPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn is_valid(&self) -> bool {
        u32::from_le_bytes(self.data[MAGIC_OFFSET..MAGIC_OFFSET + 4].try_into().unwrap())
            == INDEX_ROOTS_MAGIC
    }

    pub fn count(&self) -> usize {
        u32::from_le_bytes(self.data[COUNT_OFFSET..COUNT_OFFSET + 4].try_into().unwrap()) as usize
    }

    pub fn get_root_id(&self, index_id: IndexId) -> Option<PageId> {
        (0..self.count()).find_map(|i| {
            let base = ENTRIES_OFFSET + i * ENTRY_SIZE;
            let id = u32::from_le_bytes(self.data[base..base + 4].try_into().unwrap());
            if id == index_id {
                let root = i32::from_le_bytes(self.data[base + 4..base + 8].try_into().unwrap());
                Some(PageId::new(root))
            } else {
                None
            }
        })
    }
}
