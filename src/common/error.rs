use thiserror::Error;

use super::types::{PageId, RowId};

/// Database error kinds. Errors are returned as values; the core never
/// unwinds for a user-level failure.
#[derive(Error, Debug)]
pub enum RillError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer pool is full, no evictable frames available")]
    BufferPoolFull,

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Page {0} is still pinned")]
    PageStillPinned(PageId),

    #[error("Disk scheduler error: {0}")]
    DiskScheduler(String),

    #[error("Page is full: need {needed} bytes, {available} available")]
    PageFull { needed: usize, available: usize },

    #[error("Tuple of {0} bytes can never fit in a page")]
    TupleTooLarge(usize),

    #[error("Row does not match the table schema")]
    SchemaMismatch,

    #[error("Tuple {0} not found")]
    TupleNotFound(RowId),

    #[error("Invalid slot {0}")]
    InvalidSlot(u32),

    #[error("Duplicate key")]
    DuplicateKey,

    #[error("Key not found")]
    KeyNotFound,

    #[error("Index key of {0} bytes leaves no room for a fanout of 3")]
    KeyTooLarge(usize),

    #[error("Table `{0}` already exists")]
    TableAlreadyExist(String),

    #[error("Table `{0}` does not exist")]
    TableNotExist(String),

    #[error("Index `{0}` already exists")]
    IndexAlreadyExist(String),

    #[error("Index `{0}` not found")]
    IndexNotFound(String),

    #[error("Column `{0}` does not exist")]
    ColumnNotExist(String),

    #[error("Invalid database file: {0}")]
    InvalidDatabaseFile(String),
}

pub type Result<T> = std::result::Result<T, RillError>;
