use parking_lot::Mutex;

use crate::common::PageId;

/// In-memory free-page bitmap. One bit per page; a set bit means the page is
/// allocated. Freed pages are handed out again (lowest id first) before the
/// file is extended.
pub struct FreePageMap {
    inner: Mutex<Bitmap>,
}

struct Bitmap {
    words: Vec<u64>,
    /// Pages with id < high_water have been allocated at least once.
    high_water: u32,
}

impl Bitmap {
    fn set(&mut self, page: u32) {
        let word = (page / 64) as usize;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (page % 64);
    }

    fn clear(&mut self, page: u32) {
        let word = (page / 64) as usize;
        if word < self.words.len() {
            self.words[word] &= !(1 << (page % 64));
        }
    }

    fn first_free_below_high_water(&self) -> Option<u32> {
        for (w, &bits) in self.words.iter().enumerate() {
            if bits != u64::MAX {
                let bit = bits.trailing_ones();
                let page = w as u32 * 64 + bit;
                if page < self.high_water {
                    return Some(page);
                }
            }
        }
        None
    }
}

impl FreePageMap {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Bitmap {
                words: Vec::new(),
                high_water: 0,
            }),
        }
    }

    /// Rebuilds the map for a file that already holds `num_pages` pages.
    /// Every existing page is considered allocated; freed pages are only
    /// tracked within a process lifetime.
    pub fn from_existing(num_pages: u32) -> Self {
        let map = Self::new();
        {
            let mut inner = map.inner.lock();
            for page in 0..num_pages {
                inner.set(page);
            }
            inner.high_water = num_pages;
        }
        map
    }

    /// Hands out the lowest free page id, extending the high-water mark when
    /// no freed page is available.
    pub fn allocate(&self) -> PageId {
        let mut inner = self.inner.lock();
        let page = match inner.first_free_below_high_water() {
            Some(page) => page,
            None => {
                let page = inner.high_water;
                inner.high_water += 1;
                page
            }
        };
        inner.set(page);
        PageId::new(page as i32)
    }

    pub fn free(&self, page_id: PageId) {
        if !page_id.is_valid() {
            return;
        }
        self.inner.lock().clear(page_id.as_i32() as u32);
    }

    pub fn is_allocated(&self, page_id: PageId) -> bool {
        if !page_id.is_valid() {
            return false;
        }
        let page = page_id.as_i32() as u32;
        let inner = self.inner.lock();
        let word = (page / 64) as usize;
        match inner.words.get(word) {
            Some(bits) => bits & (1 << (page % 64)) != 0,
            None => false,
        }
    }
}

impl Default for FreePageMap {
    fn default() -> Self {
        Self::new()
    }
}
