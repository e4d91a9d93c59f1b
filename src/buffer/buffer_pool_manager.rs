use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{FrameId, PageId, Result, RillError, PAGE_SIZE};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{FrameHeader, LruKReplacer, ReadPageGuard, WritePageGuard};

struct PoolState {
    frames: Vec<Arc<FrameHeader>>,
    page_table: Mutex<HashMap<PageId, FrameId>>,
    free_list: Mutex<VecDeque<FrameId>>,
    replacer: LruKReplacer,
}

/// BufferPoolManager caches disk pages in a fixed set of frames, using LRU-K
/// for eviction. Access goes through RAII guards: `checked_read_page` /
/// `checked_write_page` pin the page and every drop unpins it with the right
/// dirty flag, so pins and unpins are balanced by construction.
pub struct BufferPoolManager {
    pool_size: usize,
    state: Arc<PoolState>,
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, k: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);
        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        Self {
            pool_size,
            state: Arc::new(PoolState {
                frames,
                page_table: Mutex::new(HashMap::new()),
                free_list: Mutex::new(free_list),
                replacer: LruKReplacer::new(k, pool_size),
            }),
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Allocates a page on disk and caches its (zeroed) image. The page is
    /// not pinned until a guard is taken.
    pub fn new_page(&self) -> Result<PageId> {
        let frame_id = self.acquire_frame()?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let page_id = self.disk_scheduler.disk_manager().allocate_page()?;

        frame.reset();
        frame.set_page_id(page_id);
        self.state.page_table.lock().insert(page_id, frame_id);
        self.state.replacer.record_access(frame_id);
        self.state.replacer.set_evictable(frame_id, true);

        Ok(page_id)
    }

    /// Drops a page from the pool and returns it to the disk free map.
    /// Fails when the page is pinned.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut page_table = self.state.page_table.lock();
        if let Some(frame_id) = page_table.remove(&page_id) {
            let frame = &self.state.frames[frame_id.as_usize()];
            if frame.pin_count() > 0 {
                page_table.insert(page_id, frame_id);
                return Err(RillError::PageStillPinned(page_id));
            }
            frame.reset();
            self.state.replacer.remove(frame_id);
            self.state.free_list.lock().push_back(frame_id);
            drop(page_table);

            self.disk_scheduler.disk_manager().deallocate_page(page_id)?;
            Ok(true)
        } else {
            // Not cached; still hand the page back to the allocator.
            drop(page_table);
            self.disk_scheduler.disk_manager().deallocate_page(page_id)?;
            Ok(false)
        }
    }

    /// Pins `page_id` for reading.
    pub fn checked_read_page(&self, page_id: PageId) -> Result<ReadPageGuard> {
        if !page_id.is_valid() {
            return Err(RillError::InvalidPageId(page_id));
        }
        let frame_id = self.pin_page(page_id)?;
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        let state = Arc::clone(&self.state);

        let guard = unsafe {
            ReadPageGuard::new(page_id, frame, Box::new(move |pid, dirtied| {
                Self::release(&state, pid, dirtied);
            }))
        };
        Ok(guard)
    }

    /// Pins `page_id` for writing.
    pub fn checked_write_page(&self, page_id: PageId) -> Result<WritePageGuard> {
        if !page_id.is_valid() {
            return Err(RillError::InvalidPageId(page_id));
        }
        let frame_id = self.pin_page(page_id)?;
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        let state = Arc::clone(&self.state);

        let guard = unsafe {
            WritePageGuard::new(page_id, frame, Box::new(move |pid, dirtied| {
                Self::release(&state, pid, dirtied);
            }))
        };
        Ok(guard)
    }

    fn release(state: &PoolState, page_id: PageId, dirtied: bool) {
        let page_table = state.page_table.lock();
        if let Some(&frame_id) = page_table.get(&page_id) {
            let frame = &state.frames[frame_id.as_usize()];
            if dirtied {
                frame.set_dirty(true);
            }
            if let Some(0) = frame.unpin() {
                state.replacer.set_evictable(frame_id, true);
            }
        }
    }

    /// Writes a cached page image back to disk and clears its dirty flag.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if !page_id.is_valid() {
            return Err(RillError::InvalidPageId(page_id));
        }
        let page_table = self.state.page_table.lock();
        if let Some(&frame_id) = page_table.get(&page_id) {
            let frame = &self.state.frames[frame_id.as_usize()];
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            self.disk_scheduler.schedule_write_sync(page_id, &data)?;
            frame.set_dirty(false);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Writes every dirty cached page back to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let page_table = self.state.page_table.lock();
        for (&page_id, &frame_id) in page_table.iter() {
            let frame = &self.state.frames[frame_id.as_usize()];
            if frame.is_dirty() {
                let mut data = [0u8; PAGE_SIZE];
                frame.copy_to(&mut data);
                self.disk_scheduler.schedule_write_sync(page_id, &data)?;
                frame.set_dirty(false);
            }
        }
        Ok(())
    }

    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let page_table = self.state.page_table.lock();
        page_table
            .get(&page_id)
            .map(|&frame_id| self.state.frames[frame_id.as_usize()].pin_count())
    }

    /// True when no frame holds a pin. Test support: public operations must
    /// leave the pool in this state unless an iterator is live.
    pub fn check_all_unpinned(&self) -> bool {
        self.state.frames.iter().all(|f| f.pin_count() == 0)
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.free_list.lock().len()
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.disk_scheduler.disk_manager()
    }

    /// Locates (or loads) the page and pins its frame.
    fn pin_page(&self, page_id: PageId) -> Result<FrameId> {
        {
            let page_table = self.state.page_table.lock();
            if let Some(&frame_id) = page_table.get(&page_id) {
                let frame = &self.state.frames[frame_id.as_usize()];
                frame.pin();
                self.state.replacer.record_access(frame_id);
                self.state.replacer.set_evictable(frame_id, false);
                return Ok(frame_id);
            }
        }

        let frame_id = self.acquire_frame()?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        self.disk_scheduler.schedule_read_sync(page_id, &mut data)?;

        frame.set_page_id(page_id);
        frame.copy_from(&data);
        frame.set_dirty(false);
        frame.pin();

        self.state.page_table.lock().insert(page_id, frame_id);
        self.state.replacer.record_access(frame_id);
        self.state.replacer.set_evictable(frame_id, false);

        Ok(frame_id)
    }

    /// Takes a frame from the free list, or evicts one (writing it back if
    /// dirty).
    fn acquire_frame(&self) -> Result<FrameId> {
        {
            let mut free_list = self.state.free_list.lock();
            if let Some(frame_id) = free_list.pop_front() {
                return Ok(frame_id);
            }
        }

        match self.state.replacer.evict() {
            Some(frame_id) => {
                let frame = &self.state.frames[frame_id.as_usize()];
                let old_page_id = frame.page_id();
                if frame.is_dirty() {
                    let mut data = [0u8; PAGE_SIZE];
                    frame.copy_to(&mut data);
                    self.disk_scheduler.schedule_write_sync(old_page_id, &data)?;
                }
                self.state.page_table.lock().remove(&old_page_id);
                frame.reset();
                Ok(frame_id)
            }
            None => Err(RillError::BufferPoolFull),
        }
    }
}
