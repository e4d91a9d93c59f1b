use crate::common::{PageId, Result, RillError, RowId, SlotNumber, PAGE_SIZE};

/// Heap page layout:
///
/// +--------------------------------------------------------------+
/// | page_id | prev_page_id | next_page_id | free_space_ptr |     |
/// | slot_count                                                   |
/// +--------------------------------------------------------------+
/// | slot[0] slot[1] ...        -> grows forward                  |
/// +--------------------------------------------------------------+
/// |                        free space                            |
/// +--------------------------------------------------------------+
/// | ... tuple[1] tuple[0]      <- grows backward from the end    |
/// +--------------------------------------------------------------+
///
/// Each slot is `(offset u32, size u32)`. `free_space_ptr` always points at
/// the lowest used tuple byte. Slot numbers are stable names: a deleted slot
/// is reused by later inserts but never shifted.
///
/// The size word doubles as the slot state:
///   - `SLOT_DELETED`: the slot is free;
///   - `SLOT_FORWARD`: the payload is an 8-byte `RowId` naming the tuple's
///     new home (left behind by an oversized update);
///   - otherwise a live size, possibly tagged with `DELETE_MARK` while a
///     two-phase delete is pending.
const PAGE_ID_OFFSET: usize = 0;
const PREV_PAGE_ID_OFFSET: usize = 4;
const NEXT_PAGE_ID_OFFSET: usize = 8;
const FREE_SPACE_PTR_OFFSET: usize = 12;
const SLOT_COUNT_OFFSET: usize = 16;

pub const HEAP_PAGE_HEADER_SIZE: usize = 20;
pub const SLOT_SIZE: usize = 8;

/// Largest tuple that can ever be stored: an empty page must fit the tuple
/// plus one slot entry.
pub const MAX_TUPLE_SIZE: usize = PAGE_SIZE - HEAP_PAGE_HEADER_SIZE - SLOT_SIZE;

const SLOT_DELETED: u32 = u32::MAX;
const SLOT_FORWARD: u32 = u32::MAX - 1;
const DELETE_MARK: u32 = 0x8000_0000;

const FORWARD_PAYLOAD: usize = RowId::ENCODED_SIZE;

/// What a slot resolves to.
#[derive(Debug, PartialEq, Eq)]
pub enum SlotContent<'a> {
    /// A live tuple's bytes.
    Tuple(&'a [u8]),
    /// The tuple moved; follow the row id (tombstones never chain).
    Forward(RowId),
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

fn read_page_id(data: &[u8], offset: usize) -> PageId {
    PageId::new(i32::from_le_bytes(data[offset..offset + 4].try_into().unwrap()))
}

fn slot_offset(slot: SlotNumber) -> usize {
    HEAP_PAGE_HEADER_SIZE + slot as usize * SLOT_SIZE
}

/// Bytes a slot occupies in the tuple region.
fn occupied(raw_size: u32) -> usize {
    match raw_size {
        SLOT_DELETED => 0,
        SLOT_FORWARD => FORWARD_PAYLOAD,
        live => (live & !DELETE_MARK) as usize,
    }
}

/// Mutable view over a heap page buffer.
pub struct HeapPage<'a> {
    data: &'a mut [u8],
}

impl<'a> HeapPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    /// Formats a fresh heap page.
    pub fn init(&mut self, page_id: PageId, prev: PageId, next: PageId) {
        self.data.fill(0);
        self.write_i32(PAGE_ID_OFFSET, page_id.as_i32());
        self.write_i32(PREV_PAGE_ID_OFFSET, prev.as_i32());
        self.write_i32(NEXT_PAGE_ID_OFFSET, next.as_i32());
        self.write_u32(FREE_SPACE_PTR_OFFSET, PAGE_SIZE as u32);
        self.write_u32(SLOT_COUNT_OFFSET, 0);
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn write_i32(&mut self, offset: usize, value: i32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn page_id(&self) -> PageId {
        read_page_id(self.data, PAGE_ID_OFFSET)
    }

    pub fn prev_page_id(&self) -> PageId {
        read_page_id(self.data, PREV_PAGE_ID_OFFSET)
    }

    pub fn set_prev_page_id(&mut self, page_id: PageId) {
        self.write_i32(PREV_PAGE_ID_OFFSET, page_id.as_i32());
    }

    pub fn next_page_id(&self) -> PageId {
        read_page_id(self.data, NEXT_PAGE_ID_OFFSET)
    }

    pub fn set_next_page_id(&mut self, page_id: PageId) {
        self.write_i32(NEXT_PAGE_ID_OFFSET, page_id.as_i32());
    }

    pub fn free_space_ptr(&self) -> u32 {
        read_u32(self.data, FREE_SPACE_PTR_OFFSET)
    }

    fn set_free_space_ptr(&mut self, ptr: u32) {
        self.write_u32(FREE_SPACE_PTR_OFFSET, ptr);
    }

    pub fn slot_count(&self) -> u32 {
        read_u32(self.data, SLOT_COUNT_OFFSET)
    }

    fn set_slot_count(&mut self, count: u32) {
        self.write_u32(SLOT_COUNT_OFFSET, count);
    }

    fn slot(&self, slot: SlotNumber) -> (u32, u32) {
        let base = slot_offset(slot);
        (read_u32(self.data, base), read_u32(self.data, base + 4))
    }

    fn set_slot(&mut self, slot: SlotNumber, offset: u32, raw_size: u32) {
        let base = slot_offset(slot);
        self.write_u32(base, offset);
        self.write_u32(base + 4, raw_size);
    }

    /// Bytes available between the slot directory and the tuple region.
    pub fn free_space(&self) -> usize {
        let directory_end = HEAP_PAGE_HEADER_SIZE + self.slot_count() as usize * SLOT_SIZE;
        (self.free_space_ptr() as usize).saturating_sub(directory_end)
    }

    /// Number of live (unmarked, unforwarded) tuples.
    pub fn live_count(&self) -> usize {
        (0..self.slot_count())
            .filter(|&s| {
                let (_, raw) = self.slot(s);
                raw != SLOT_DELETED && raw != SLOT_FORWARD && raw & DELETE_MARK == 0
            })
            .count()
    }

    fn lowest_free_slot(&self) -> Option<SlotNumber> {
        (0..self.slot_count()).find(|&s| self.slot(s).1 == SLOT_DELETED)
    }

    /// Inserts a tuple, reusing the lowest deleted slot number before
    /// allocating a new one. Fails with `PageFull` when the tuple plus any
    /// new slot entry does not fit.
    pub fn insert_tuple(&mut self, tuple: &[u8]) -> Result<SlotNumber> {
        let reuse = self.lowest_free_slot();
        let needed = tuple.len() + if reuse.is_none() { SLOT_SIZE } else { 0 };
        if self.free_space() < needed {
            return Err(RillError::PageFull {
                needed,
                available: self.free_space(),
            });
        }

        let slot = match reuse {
            Some(slot) => slot,
            None => {
                let slot = self.slot_count();
                self.set_slot_count(slot + 1);
                slot
            }
        };

        let offset = self.free_space_ptr() - tuple.len() as u32;
        self.data[offset as usize..offset as usize + tuple.len()].copy_from_slice(tuple);
        self.set_slot(slot, offset, tuple.len() as u32);
        self.set_free_space_ptr(offset);
        Ok(slot)
    }

    /// Resolves a slot to its content. Deleted and delete-marked slots
    /// report `TupleNotFound`.
    pub fn slot_content(&self, slot: SlotNumber) -> Result<SlotContent<'_>> {
        if slot >= self.slot_count() {
            return Err(RillError::InvalidSlot(slot));
        }
        let (offset, raw) = self.slot(slot);
        let offset = offset as usize;
        match raw {
            SLOT_DELETED => Err(RillError::TupleNotFound(RowId::new(self.page_id(), slot))),
            SLOT_FORWARD => Ok(SlotContent::Forward(RowId::decode(
                &self.data[offset..offset + FORWARD_PAYLOAD],
            ))),
            live if live & DELETE_MARK != 0 => {
                Err(RillError::TupleNotFound(RowId::new(self.page_id(), slot)))
            }
            live => Ok(SlotContent::Tuple(&self.data[offset..offset + live as usize])),
        }
    }

    /// Updates a tuple in place when the new bytes fit in the old footprint,
    /// otherwise frees the old copy and re-inserts within this page. Fails
    /// with `PageFull` when even that cannot fit; the slot is untouched.
    pub fn update_tuple(&mut self, slot: SlotNumber, tuple: &[u8]) -> Result<()> {
        if slot >= self.slot_count() {
            return Err(RillError::InvalidSlot(slot));
        }
        let (offset, raw) = self.slot(slot);
        match raw {
            SLOT_DELETED => {
                return Err(RillError::TupleNotFound(RowId::new(self.page_id(), slot)))
            }
            SLOT_FORWARD => return Err(RillError::InvalidSlot(slot)),
            live if live & DELETE_MARK != 0 => {
                return Err(RillError::TupleNotFound(RowId::new(self.page_id(), slot)))
            }
            _ => {}
        }

        let old_size = raw as usize;
        if tuple.len() <= old_size {
            // Right-align in the old footprint, then give the leftover bytes
            // back to the free region so the accounting stays exact.
            let delta = old_size - tuple.len();
            let new_offset = offset as usize + delta;
            self.data[new_offset..new_offset + tuple.len()].copy_from_slice(tuple);
            self.set_slot(slot, new_offset as u32, tuple.len() as u32);
            self.close_gap(offset as usize, delta);
            return Ok(());
        }

        if self.free_space() + old_size < tuple.len() {
            return Err(RillError::PageFull {
                needed: tuple.len(),
                available: self.free_space() + old_size,
            });
        }

        self.reclaim_slot(slot);
        let offset = self.free_space_ptr() - tuple.len() as u32;
        self.data[offset as usize..offset as usize + tuple.len()].copy_from_slice(tuple);
        self.set_slot(slot, offset, tuple.len() as u32);
        self.set_free_space_ptr(offset);
        Ok(())
    }

    /// Flags a live tuple for deletion; the bytes stay until `apply_delete`.
    pub fn mark_delete(&mut self, slot: SlotNumber) -> Result<()> {
        if slot >= self.slot_count() {
            return Err(RillError::InvalidSlot(slot));
        }
        let (offset, raw) = self.slot(slot);
        match raw {
            SLOT_DELETED | SLOT_FORWARD => {
                Err(RillError::TupleNotFound(RowId::new(self.page_id(), slot)))
            }
            live => {
                self.set_slot(slot, offset, live | DELETE_MARK);
                Ok(())
            }
        }
    }

    /// Undoes `mark_delete`.
    pub fn rollback_delete(&mut self, slot: SlotNumber) -> Result<()> {
        if slot >= self.slot_count() {
            return Err(RillError::InvalidSlot(slot));
        }
        let (offset, raw) = self.slot(slot);
        match raw {
            SLOT_DELETED | SLOT_FORWARD => {
                Err(RillError::TupleNotFound(RowId::new(self.page_id(), slot)))
            }
            live => {
                self.set_slot(slot, offset, live & !DELETE_MARK);
                Ok(())
            }
        }
    }

    /// Clears the slot and compacts the tuple region so `free_space_ptr`
    /// accounting stays exact. Works on live, marked, or forward slots.
    pub fn apply_delete(&mut self, slot: SlotNumber) -> Result<()> {
        if slot >= self.slot_count() {
            return Err(RillError::InvalidSlot(slot));
        }
        let (_, raw) = self.slot(slot);
        if raw == SLOT_DELETED {
            return Err(RillError::TupleNotFound(RowId::new(self.page_id(), slot)));
        }
        self.reclaim_slot(slot);
        Ok(())
    }

    /// Turns a slot into a forward pointer at `target`. An existing forward
    /// pointer is re-targeted in place.
    pub fn set_forward(&mut self, slot: SlotNumber, target: RowId) -> Result<()> {
        if slot >= self.slot_count() {
            return Err(RillError::InvalidSlot(slot));
        }
        let (offset, raw) = self.slot(slot);
        match raw {
            SLOT_DELETED => Err(RillError::TupleNotFound(RowId::new(self.page_id(), slot))),
            SLOT_FORWARD => {
                let offset = offset as usize;
                self.data[offset..offset + FORWARD_PAYLOAD].copy_from_slice(&target.encode());
                Ok(())
            }
            _ => {
                self.reclaim_slot(slot);
                if self.free_space() < FORWARD_PAYLOAD {
                    return Err(RillError::PageFull {
                        needed: FORWARD_PAYLOAD,
                        available: self.free_space(),
                    });
                }
                let offset = self.free_space_ptr() - FORWARD_PAYLOAD as u32;
                self.data[offset as usize..offset as usize + FORWARD_PAYLOAD]
                    .copy_from_slice(&target.encode());
                self.set_slot(slot, offset, SLOT_FORWARD);
                self.set_free_space_ptr(offset);
                Ok(())
            }
        }
    }

    /// First live tuple on this page, scanning slot numbers upward.
    pub fn first_tuple_rid(&self) -> Option<RowId> {
        self.next_live_slot(0)
    }

    /// Next live tuple after `slot` on this page.
    pub fn next_tuple_rid(&self, slot: SlotNumber) -> Option<RowId> {
        self.next_live_slot(slot + 1)
    }

    fn next_live_slot(&self, from: SlotNumber) -> Option<RowId> {
        (from..self.slot_count())
            .find(|&s| {
                let (_, raw) = self.slot(s);
                raw != SLOT_DELETED && raw != SLOT_FORWARD && raw & DELETE_MARK == 0
            })
            .map(|s| RowId::new(self.page_id(), s))
    }

    /// Frees the bytes a slot occupies and marks the slot deleted.
    fn reclaim_slot(&mut self, slot: SlotNumber) {
        let (offset, raw) = self.slot(slot);
        let size = occupied(raw);
        if size > 0 {
            self.close_gap(offset as usize, size);
        }
        self.set_slot(slot, 0, SLOT_DELETED);
    }

    /// Compacts out a freed gap of `delta` bytes starting at `gap_start`:
    /// every tuple below it shifts up and its slot offset is rewritten, and
    /// `free_space_ptr` advances by `delta`.
    fn close_gap(&mut self, gap_start: usize, delta: usize) {
        if delta == 0 {
            return;
        }
        let fsp = self.free_space_ptr() as usize;
        self.data.copy_within(fsp..gap_start, fsp + delta);
        for s in 0..self.slot_count() {
            let (s_off, s_raw) = self.slot(s);
            if occupied(s_raw) > 0 && (s_off as usize) < gap_start {
                self.set_slot(s, s_off + delta as u32, s_raw);
            }
        }
        self.set_free_space_ptr((fsp + delta) as u32);
    }
}

/// Read-only view over a heap page buffer.
pub struct HeapPageRef<'a> {
    data: &'a [u8],
}

impl<'a> HeapPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn page_id(&self) -> PageId {
        read_page_id(self.data, PAGE_ID_OFFSET)
    }

    pub fn prev_page_id(&self) -> PageId {
        read_page_id(self.data, PREV_PAGE_ID_OFFSET)
    }

    pub fn next_page_id(&self) -> PageId {
        read_page_id(self.data, NEXT_PAGE_ID_OFFSET)
    }

    pub fn slot_count(&self) -> u32 {
        read_u32(self.data, SLOT_COUNT_OFFSET)
    }

    pub fn free_space(&self) -> usize {
        let directory_end = HEAP_PAGE_HEADER_SIZE + self.slot_count() as usize * SLOT_SIZE;
        (read_u32(self.data, FREE_SPACE_PTR_OFFSET) as usize).saturating_sub(directory_end)
    }

    /// Whether a tuple of `len` bytes would fit, accounting for slot reuse.
    pub fn can_insert(&self, len: usize) -> bool {
        let has_free_slot = (0..self.slot_count()).any(|s| self.slot(s).1 == SLOT_DELETED);
        if has_free_slot {
            self.free_space() >= len
        } else {
            self.free_space() >= len + SLOT_SIZE
        }
    }

    fn slot(&self, slot: SlotNumber) -> (u32, u32) {
        let base = slot_offset(slot);
        (read_u32(self.data, base), read_u32(self.data, base + 4))
    }

    pub fn slot_content(&self, slot: SlotNumber) -> Result<SlotContent<'_>> {
        if slot >= self.slot_count() {
            return Err(RillError::InvalidSlot(slot));
        }
        let (offset, raw) = self.slot(slot);
        let offset = offset as usize;
        match raw {
            SLOT_DELETED => Err(RillError::TupleNotFound(RowId::new(self.page_id(), slot))),
            SLOT_FORWARD => Ok(SlotContent::Forward(RowId::decode(
                &self.data[offset..offset + FORWARD_PAYLOAD],
            ))),
            live if live & DELETE_MARK != 0 => {
                Err(RillError::TupleNotFound(RowId::new(self.page_id(), slot)))
            }
            live => Ok(SlotContent::Tuple(&self.data[offset..offset + live as usize])),
        }
    }

    pub fn first_tuple_rid(&self) -> Option<RowId> {
        self.next_live_slot(0)
    }

    pub fn next_tuple_rid(&self, slot: SlotNumber) -> Option<RowId> {
        self.next_live_slot(slot + 1)
    }

    fn next_live_slot(&self, from: SlotNumber) -> Option<RowId> {
        (from..self.slot_count())
            .find(|&s| {
                let (_, raw) = self.slot(s);
                raw != SLOT_DELETED && raw != SLOT_FORWARD && raw & DELETE_MARK == 0
            })
            .map(|s| RowId::new(self.page_id(), s))
    }

    pub fn live_count(&self) -> usize {
        (0..self.slot_count())
            .filter(|&s| {
                let (_, raw) = self.slot(s);
                raw != SLOT_DELETED && raw != SLOT_FORWARD && raw & DELETE_MARK == 0
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::INVALID_PAGE_ID;

    fn fresh_page(data: &mut [u8]) -> HeapPage<'_> {
        let mut page = HeapPage::new(data);
        page.init(PageId::new(2), INVALID_PAGE_ID, INVALID_PAGE_ID);
        page
    }

    #[test]
    fn test_init() {
        let mut data = [0u8; PAGE_SIZE];
        let page = fresh_page(&mut data);
        assert_eq!(page.page_id(), PageId::new(2));
        assert_eq!(page.prev_page_id(), INVALID_PAGE_ID);
        assert_eq!(page.next_page_id(), INVALID_PAGE_ID);
        assert_eq!(page.slot_count(), 0);
        assert_eq!(page.free_space(), PAGE_SIZE - HEAP_PAGE_HEADER_SIZE);
    }

    #[test]
    fn test_insert_and_read() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = fresh_page(&mut data);

        let slot = page.insert_tuple(b"hello world").unwrap();
        assert_eq!(slot, 0);
        assert_eq!(
            page.slot_content(slot).unwrap(),
            SlotContent::Tuple(b"hello world")
        );
        assert_eq!(page.live_count(), 1);
    }

    #[test]
    fn test_slot_reuse_keeps_numbers_stable() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = fresh_page(&mut data);

        let s0 = page.insert_tuple(b"first").unwrap();
        let s1 = page.insert_tuple(b"second").unwrap();
        let s2 = page.insert_tuple(b"third").unwrap();
        assert_eq!((s0, s1, s2), (0, 1, 2));

        page.apply_delete(s1).unwrap();
        let s3 = page.insert_tuple(b"fourth").unwrap();
        assert_eq!(s3, s1);
        assert_eq!(page.slot_count(), 3);

        // Neighbours are untouched.
        assert_eq!(page.slot_content(s0).unwrap(), SlotContent::Tuple(b"first"));
        assert_eq!(page.slot_content(s2).unwrap(), SlotContent::Tuple(b"third"));
    }

    #[test]
    fn test_apply_delete_compacts() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = fresh_page(&mut data);

        let s0 = page.insert_tuple(b"aaaa").unwrap();
        let s1 = page.insert_tuple(b"bbbbbbbb").unwrap();
        let s2 = page.insert_tuple(b"cccc").unwrap();
        let free_before = page.free_space();

        page.apply_delete(s1).unwrap();
        assert_eq!(page.free_space(), free_before + 8);
        assert_eq!(page.slot_content(s0).unwrap(), SlotContent::Tuple(b"aaaa"));
        assert_eq!(page.slot_content(s2).unwrap(), SlotContent::Tuple(b"cccc"));
        assert!(page.slot_content(s1).is_err());
    }

    #[test]
    fn test_two_phase_delete() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = fresh_page(&mut data);

        let slot = page.insert_tuple(b"doomed").unwrap();
        page.mark_delete(slot).unwrap();
        assert!(page.slot_content(slot).is_err());
        assert_eq!(page.live_count(), 0);

        page.rollback_delete(slot).unwrap();
        assert_eq!(page.slot_content(slot).unwrap(), SlotContent::Tuple(b"doomed"));

        page.mark_delete(slot).unwrap();
        page.apply_delete(slot).unwrap();
        assert!(page.slot_content(slot).is_err());
    }

    #[test]
    fn test_update_in_place_and_grow() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = fresh_page(&mut data);

        let slot = page.insert_tuple(b"something").unwrap();
        let free_before = page.free_space();
        page.update_tuple(slot, b"small").unwrap();
        assert_eq!(page.slot_content(slot).unwrap(), SlotContent::Tuple(b"small"));
        // The shrink hands the saved bytes back.
        assert_eq!(page.free_space(), free_before + 4);

        page.update_tuple(slot, b"a much longer replacement").unwrap();
        assert_eq!(
            page.slot_content(slot).unwrap(),
            SlotContent::Tuple(b"a much longer replacement".as_slice())
        );
    }

    #[test]
    fn test_update_grow_moves_with_neighbours_intact() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = fresh_page(&mut data);

        let s0 = page.insert_tuple(b"left").unwrap();
        let s1 = page.insert_tuple(b"mid").unwrap();
        let s2 = page.insert_tuple(b"right").unwrap();

        page.update_tuple(s1, b"a considerably larger middle tuple").unwrap();
        assert_eq!(page.slot_content(s0).unwrap(), SlotContent::Tuple(b"left"));
        assert_eq!(
            page.slot_content(s1).unwrap(),
            SlotContent::Tuple(b"a considerably larger middle tuple".as_slice())
        );
        assert_eq!(page.slot_content(s2).unwrap(), SlotContent::Tuple(b"right"));
    }

    #[test]
    fn test_page_full() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = fresh_page(&mut data);

        let big = vec![7u8; 1000];
        let mut inserted = 0;
        while page.insert_tuple(&big).is_ok() {
            inserted += 1;
        }
        assert!(inserted > 0);
        assert!(matches!(
            page.insert_tuple(&big),
            Err(RillError::PageFull { .. })
        ));
    }

    #[test]
    fn test_forward_pointer() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = fresh_page(&mut data);

        let slot = page.insert_tuple(b"moving out").unwrap();
        let target = RowId::new(PageId::new(9), 3);
        page.set_forward(slot, target).unwrap();

        assert_eq!(page.slot_content(slot).unwrap(), SlotContent::Forward(target));
        // Forward slots are invisible to scans.
        assert_eq!(page.first_tuple_rid(), None);

        // Re-target in place.
        let target2 = RowId::new(PageId::new(11), 0);
        page.set_forward(slot, target2).unwrap();
        assert_eq!(page.slot_content(slot).unwrap(), SlotContent::Forward(target2));
    }

    #[test]
    fn test_scan_skips_dead_slots() {
        let mut data = [0u8; PAGE_SIZE];
        let mut page = fresh_page(&mut data);

        let s0 = page.insert_tuple(b"a").unwrap();
        let s1 = page.insert_tuple(b"b").unwrap();
        let s2 = page.insert_tuple(b"c").unwrap();
        page.apply_delete(s1).unwrap();

        let first = page.first_tuple_rid().unwrap();
        assert_eq!(first.slot, s0);
        let second = page.next_tuple_rid(first.slot).unwrap();
        assert_eq!(second.slot, s2);
        assert_eq!(page.next_tuple_rid(second.slot), None);
    }

    #[test]
    fn test_read_view_matches() {
        let mut data = [0u8; PAGE_SIZE];
        {
            let mut page = fresh_page(&mut data);
            page.insert_tuple(b"persistent").unwrap();
            page.set_next_page_id(PageId::new(5));
        }
        let view = HeapPageRef::new(&data);
        assert_eq!(view.page_id(), PageId::new(2));
        assert_eq!(view.next_page_id(), PageId::new(5));
        assert_eq!(view.live_count(), 1);
        assert_eq!(view.slot_content(0).unwrap(), SlotContent::Tuple(b"persistent"));
    }
}
