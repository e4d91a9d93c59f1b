use std::sync::Arc;

use tracing::debug;

use crate::buffer::BufferPoolManager;
use crate::common::{
    PageId, Result, RillError, RowId, INVALID_PAGE_ID, INVALID_ROW_ID,
};
use crate::record::{Row, Schema};
use crate::storage::page::{HeapPage, HeapPageRef, SlotContent, MAX_TUPLE_SIZE};

/// TableHeap stores a table's rows across a doubly-linked list of heap pages
/// anchored at `first_page_id`. Rows keep their `RowId` for life: an update
/// that no longer fits leaves a forward pointer at the original slot, and the
/// pointer is re-targeted (never chained) if the row moves again.
pub struct TableHeap {
    bpm: Arc<BufferPoolManager>,
    schema: Arc<Schema>,
    first_page_id: PageId,
}

impl TableHeap {
    /// Creates a fresh heap with one empty page.
    pub fn create(bpm: Arc<BufferPoolManager>, schema: Arc<Schema>) -> Result<Self> {
        let first_page_id = bpm.new_page()?;
        {
            let mut guard = bpm.checked_write_page(first_page_id)?;
            let mut page = HeapPage::new(guard.data_mut());
            page.init(first_page_id, INVALID_PAGE_ID, INVALID_PAGE_ID);
        }
        Ok(Self {
            bpm,
            schema,
            first_page_id,
        })
    }

    /// Re-attaches to a heap whose first page is already on disk.
    pub fn open(bpm: Arc<BufferPoolManager>, schema: Arc<Schema>, first_page_id: PageId) -> Self {
        Self {
            bpm,
            schema,
            first_page_id,
        }
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Inserts a row, assigning its `RowId`. The first page with room wins;
    /// when none fits a new page is linked at the tail.
    pub fn insert_tuple(&self, row: &mut Row) -> Result<RowId> {
        let bytes = row.serialize(&self.schema).ok_or(RillError::SchemaMismatch)?;
        if bytes.len() > MAX_TUPLE_SIZE {
            return Err(RillError::TupleTooLarge(bytes.len()));
        }
        let rid = self.insert_bytes(&bytes)?;
        row.set_row_id(rid);
        Ok(rid)
    }

    fn insert_bytes(&self, bytes: &[u8]) -> Result<RowId> {
        let mut page_id = self.first_page_id;
        loop {
            let mut guard = self.bpm.checked_write_page(page_id)?;
            let (fits, next) = {
                let view = HeapPageRef::new(guard.data());
                (view.can_insert(bytes.len()), view.next_page_id())
            };
            if fits {
                let mut page = HeapPage::new(guard.data_mut());
                let slot = page.insert_tuple(bytes)?;
                return Ok(RowId::new(page_id, slot));
            }
            if !next.is_valid() {
                break;
            }
            page_id = next;
        }

        // `page_id` is the tail; grow the chain by one page.
        let new_page_id = self.bpm.new_page()?;
        {
            let mut guard = self.bpm.checked_write_page(new_page_id)?;
            let mut page = HeapPage::new(guard.data_mut());
            page.init(new_page_id, page_id, INVALID_PAGE_ID);
        }
        {
            let mut guard = self.bpm.checked_write_page(page_id)?;
            let mut page = HeapPage::new(guard.data_mut());
            page.set_next_page_id(new_page_id);
        }
        debug!(page = new_page_id.as_i32(), "appended heap page");

        let mut guard = self.bpm.checked_write_page(new_page_id)?;
        let mut page = HeapPage::new(guard.data_mut());
        let slot = page.insert_tuple(bytes)?;
        Ok(RowId::new(new_page_id, slot))
    }

    /// Fetches the row at `rid`, following a forward pointer at most once.
    /// The returned row keeps the caller's `rid` as its id.
    pub fn get_tuple(&self, rid: RowId) -> Result<Row> {
        let (bytes, _) = self.read_bytes(rid)?;
        let mut row = Row::deserialize(&bytes, &self.schema).ok_or(RillError::SchemaMismatch)?;
        row.set_row_id(rid);
        Ok(row)
    }

    fn read_bytes(&self, rid: RowId) -> Result<(Vec<u8>, RowId)> {
        let forwarded = {
            let guard = self.bpm.checked_read_page(rid.page_id)?;
            let view = HeapPageRef::new(guard.data());
            match view.slot_content(rid.slot)? {
                SlotContent::Tuple(bytes) => return Ok((bytes.to_vec(), rid)),
                SlotContent::Forward(target) => target,
            }
        };
        let guard = self.bpm.checked_read_page(forwarded.page_id)?;
        let view = HeapPageRef::new(guard.data());
        match view.slot_content(forwarded.slot)? {
            SlotContent::Tuple(bytes) => Ok((bytes.to_vec(), forwarded)),
            SlotContent::Forward(_) => Err(RillError::InvalidDatabaseFile(format!(
                "chained forward pointer at {}",
                rid
            ))),
        }
    }

    /// Where the row's bytes actually live (identity when not forwarded).
    fn resolve(&self, rid: RowId) -> Result<RowId> {
        let guard = self.bpm.checked_read_page(rid.page_id)?;
        let view = HeapPageRef::new(guard.data());
        match view.slot_content(rid.slot)? {
            SlotContent::Tuple(_) => Ok(rid),
            SlotContent::Forward(target) => Ok(target),
        }
    }

    /// Replaces the row at `rid` with `row`. The visible `RowId` never
    /// changes: when the new bytes outgrow their page they are inserted
    /// elsewhere and the original slot becomes (or re-targets) a forward
    /// pointer, while any intermediate copy is freed.
    pub fn update_tuple(&self, row: &Row, rid: RowId) -> Result<()> {
        let bytes = row.serialize(&self.schema).ok_or(RillError::SchemaMismatch)?;
        if bytes.len() > MAX_TUPLE_SIZE {
            return Err(RillError::TupleTooLarge(bytes.len()));
        }

        let actual = self.resolve(rid)?;
        {
            let mut guard = self.bpm.checked_write_page(actual.page_id)?;
            let mut page = HeapPage::new(guard.data_mut());
            match page.update_tuple(actual.slot, &bytes) {
                Ok(()) => return Ok(()),
                Err(RillError::PageFull { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        // Doesn't fit where it lives; move it and keep `rid` resolvable.
        let new_rid = self.insert_bytes(&bytes)?;
        {
            let mut guard = self.bpm.checked_write_page(rid.page_id)?;
            let mut page = HeapPage::new(guard.data_mut());
            page.set_forward(rid.slot, new_rid)?;
        }
        if actual != rid {
            let mut guard = self.bpm.checked_write_page(actual.page_id)?;
            let mut page = HeapPage::new(guard.data_mut());
            page.apply_delete(actual.slot)?;
        }
        Ok(())
    }

    /// First phase of deletion: hides the row but keeps its bytes.
    pub fn mark_delete(&self, rid: RowId) -> Result<()> {
        let actual = self.resolve(rid)?;
        let mut guard = self.bpm.checked_write_page(actual.page_id)?;
        let mut page = HeapPage::new(guard.data_mut());
        page.mark_delete(actual.slot)
    }

    /// Undoes `mark_delete`.
    pub fn rollback_delete(&self, rid: RowId) -> Result<()> {
        let actual = {
            let guard = self.bpm.checked_read_page(rid.page_id)?;
            let view = HeapPageRef::new(guard.data());
            // A marked slot reads as not-found, so resolve by raw content:
            // forward slots keep their target readable.
            match view.slot_content(rid.slot) {
                Ok(SlotContent::Forward(target)) => target,
                _ => rid,
            }
        };
        let mut guard = self.bpm.checked_write_page(actual.page_id)?;
        let mut page = HeapPage::new(guard.data_mut());
        page.rollback_delete(actual.slot)
    }

    /// Second phase of deletion: reclaims the bytes (and the forward anchor,
    /// if the row had moved).
    pub fn apply_delete(&self, rid: RowId) -> Result<()> {
        let anchor_forward = {
            let guard = self.bpm.checked_read_page(rid.page_id)?;
            let view = HeapPageRef::new(guard.data());
            match view.slot_content(rid.slot) {
                Ok(SlotContent::Forward(target)) => Some(target),
                _ => None,
            }
        };
        let actual = anchor_forward.unwrap_or(rid);
        {
            let mut guard = self.bpm.checked_write_page(actual.page_id)?;
            let mut page = HeapPage::new(guard.data_mut());
            page.apply_delete(actual.slot)?;
        }
        if anchor_forward.is_some() {
            let mut guard = self.bpm.checked_write_page(rid.page_id)?;
            let mut page = HeapPage::new(guard.data_mut());
            page.apply_delete(rid.slot)?;
        }
        Ok(())
    }

    /// Convenience mark-then-apply.
    pub fn delete_tuple(&self, rid: RowId) -> Result<()> {
        self.mark_delete(rid)?;
        self.apply_delete(rid)
    }

    /// Deallocates every page in the chain. The heap is unusable afterwards.
    pub fn free_pages(&self) -> Result<()> {
        let mut page_id = self.first_page_id;
        while page_id.is_valid() {
            let next = {
                let guard = self.bpm.checked_read_page(page_id)?;
                HeapPageRef::new(guard.data()).next_page_id()
            };
            self.bpm.delete_page(page_id)?;
            page_id = next;
        }
        debug!(first_page = self.first_page_id.as_i32(), "freed heap chain");
        Ok(())
    }

    /// RowId of the first live row, or `INVALID_ROW_ID` when empty.
    pub fn first_rid(&self) -> Result<RowId> {
        let mut page_id = self.first_page_id;
        while page_id.is_valid() {
            let guard = self.bpm.checked_read_page(page_id)?;
            let view = HeapPageRef::new(guard.data());
            if let Some(rid) = view.first_tuple_rid() {
                return Ok(rid);
            }
            page_id = view.next_page_id();
        }
        Ok(INVALID_ROW_ID)
    }

    /// RowId of the first live row after `rid`, continuing onto later pages.
    pub fn rid_after(&self, rid: RowId) -> Result<RowId> {
        let mut page_id = {
            let guard = self.bpm.checked_read_page(rid.page_id)?;
            let view = HeapPageRef::new(guard.data());
            if let Some(next) = view.next_tuple_rid(rid.slot) {
                return Ok(next);
            }
            view.next_page_id()
        };
        while page_id.is_valid() {
            let guard = self.bpm.checked_read_page(page_id)?;
            let view = HeapPageRef::new(guard.data());
            if let Some(next) = view.first_tuple_rid() {
                return Ok(next);
            }
            page_id = view.next_page_id();
        }
        Ok(INVALID_ROW_ID)
    }

    pub fn iter(&self) -> Result<TableIterator<'_>> {
        Ok(TableIterator {
            heap: self,
            cursor: self.first_rid()?,
        })
    }
}

/// Sequential scan over a table heap. Holds no pins between steps; equality
/// with the end of the scan is `cursor == INVALID_ROW_ID`.
pub struct TableIterator<'a> {
    heap: &'a TableHeap,
    cursor: RowId,
}

impl Iterator for TableIterator<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.cursor.is_valid() {
            return None;
        }
        let current = self.cursor;
        let row = self.heap.get_tuple(current);
        match self.heap.rid_after(current) {
            Ok(next) => self.cursor = next,
            Err(e) => {
                self.cursor = INVALID_ROW_ID;
                return Some(Err(e));
            }
        }
        Some(row)
    }
}
