use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::FrameHeader;

/// Invoked exactly once when a guard is dropped; receives the page id and
/// whether the holder dirtied the page.
type ReleaseCallback = Box<dyn FnOnce(PageId, bool) + Send + Sync>;

struct GuardCore {
    page_id: PageId,
    /// Keeps the frame alive for as long as the lock guard is held.
    _frame: Arc<FrameHeader>,
    release: Option<ReleaseCallback>,
    dirtied: bool,
}

impl GuardCore {
    fn new(page_id: PageId, frame: Arc<FrameHeader>, release: ReleaseCallback) -> Self {
        Self {
            page_id,
            _frame: frame,
            release: Some(release),
            dirtied: false,
        }
    }

    fn finish(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.page_id, self.dirtied);
        }
    }
}

/// Scoped read access to a pinned page. Dropping the guard unpins the page;
/// there is no path that leaks a pin.
pub struct ReadPageGuard {
    core: GuardCore,
    _data: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>,
}

impl ReadPageGuard {
    /// # Safety
    /// The frame must stay alive for the guard's lifetime; the `Arc` held in
    /// `core` guarantees it, which is what makes the lifetime erasure sound.
    pub(crate) unsafe fn new(
        page_id: PageId,
        frame: Arc<FrameHeader>,
        release: ReleaseCallback,
    ) -> Self {
        let data = frame.data.read();
        let data: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>> = std::mem::transmute(data);
        Self {
            core: GuardCore::new(page_id, frame, release),
            _data: data,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.core.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self._data[..]
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        self.core.finish();
    }
}

/// Scoped write access to a pinned page. Taking `data_mut` marks the page
/// dirty; dropping unpins and reports the dirty flag.
pub struct WritePageGuard {
    core: GuardCore,
    data: Option<RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl WritePageGuard {
    /// # Safety
    /// Same contract as [`ReadPageGuard::new`].
    pub(crate) unsafe fn new(
        page_id: PageId,
        frame: Arc<FrameHeader>,
        release: ReleaseCallback,
    ) -> Self {
        let data = frame.data.write();
        let data: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>> = std::mem::transmute(data);
        Self {
            core: GuardCore::new(page_id, frame, release),
            data: Some(data),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.core.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data.as_ref().unwrap()[..]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.core.dirtied = true;
        &mut self.data.as_mut().unwrap()[..]
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        // Release the data lock before reporting back to the pool.
        self.data.take();
        self.core.finish();
    }
}
