use super::types::{PageId, RowId};

/// Size of a page in bytes (4 KB). Every page in the database file is
/// exactly this size.
pub const PAGE_SIZE: usize = 4096;

/// Invalid page id sentinel.
pub const INVALID_PAGE_ID: PageId = PageId(-1);

/// End-of-iteration sentinel for table scans.
pub const INVALID_ROW_ID: RowId = RowId::new(INVALID_PAGE_ID, 0);

/// Reserved page holding the serialized catalog metadata.
pub const CATALOG_META_PAGE_ID: PageId = PageId(0);

/// Reserved page holding the index-id -> root-page-id directory.
pub const INDEX_ROOTS_PAGE_ID: PageId = PageId(1);

/// Default K value for the LRU-K replacement policy.
pub const DEFAULT_LRUK_K: usize = 2;

/// Default buffer pool size (number of frames).
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 64;

/// Magic numbers guarding each serialized structure.
pub const CATALOG_META_MAGIC: u32 = 0x52CA_7A10;
pub const TABLE_META_MAGIC: u32 = 0x527A_B100;
pub const INDEX_META_MAGIC: u32 = 0x521D_E300;
pub const SCHEMA_MAGIC: u32 = 0x525C_4E00;
pub const COLUMN_MAGIC: u32 = 0x52C0_1000;
pub const INDEX_ROOTS_MAGIC: u32 = 0x5212_0075;
