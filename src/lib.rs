//! Rill - a disk-backed relational storage and indexing engine.
//!
//! Rill persists tabular data to a single file of fixed-size pages and keeps
//! secondary B+tree indexes in the same file. Callers (parsers, planners,
//! executors) work in terms of rows, keys, and row ids; pages are never
//! exposed.
//!
//! # Architecture
//!
//! Bottom up:
//!
//! - **Disk** (`storage::disk`): a single paged database file, a free-page
//!   map, and a background I/O scheduler.
//! - **Buffer pool** (`buffer`): a fixed set of frames with LRU-K eviction.
//!   Pages are only reachable through RAII guards, so every pin is released
//!   exactly once with the right dirty flag.
//! - **Records** (`record`): column types, fields, schemas, and row
//!   (de)serialization.
//! - **Heap** (`storage`): slotted heap pages chained into per-table linked
//!   lists, with two-phase deletes and forward pointers for oversized
//!   updates, so a row's id never changes.
//! - **Index** (`index`): disk-resident B+trees over fixed-width keys, with
//!   split/merge/redistribute rebalancing, a leaf sibling chain, ranged
//!   scans, and an in-order iterator.
//! - **Catalog** (`catalog`): the durable registry of tables and indexes,
//!   bootstrapped from two reserved pages on reopen.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rill::buffer::BufferPoolManager;
//! use rill::catalog::CatalogManager;
//! use rill::record::{DataType, Field, Row, Schema};
//! use rill::storage::disk::DiskManager;
//!
//! let disk = Arc::new(DiskManager::new("example.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(64, 2, disk));
//! let mut catalog = CatalogManager::new(bpm, true).unwrap();
//!
//! let schema = Schema::builder()
//!     .unique_column("id", DataType::Int32)
//!     .column("name", DataType::Char(16))
//!     .build();
//! catalog.create_table("users", schema).unwrap();
//!
//! let table = catalog.get_table("users").unwrap();
//! let mut row = Row::new(vec![Field::from(1), Field::from("ada")]);
//! table.heap().insert_tuple(&mut row).unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod index;
pub mod record;
pub mod storage;

pub use common::{PageId, Result, RillError, RowId};
