use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::common::{PageId, Result, RillError, PAGE_SIZE};

use super::free_map::FreePageMap;

/// Number of reserved pages at the front of the file: the catalog metadata
/// page and the index-roots page.
const RESERVED_PAGES: u32 = 2;

/// DiskManager reads and writes fixed-size pages in a single database file.
/// Page 0 and page 1 are reserved and always exist; the free-page map hands
/// out everything after them.
pub struct DiskManager {
    file: Mutex<File>,
    path: PathBuf,
    num_pages: AtomicU32,
    num_reads: AtomicU32,
    num_writes: AtomicU32,
    free_map: FreePageMap,
}

impl DiskManager {
    /// Opens the database file at `path`, creating and formatting it (two
    /// zeroed reserved pages) when it does not exist.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let file_size = file.metadata()?.len();
        if file_size % PAGE_SIZE as u64 != 0 {
            return Err(RillError::InvalidDatabaseFile(format!(
                "file size {} is not a multiple of the page size",
                file_size
            )));
        }
        let existing_pages = (file_size / PAGE_SIZE as u64) as u32;

        let dm = Self {
            file: Mutex::new(file),
            path,
            num_pages: AtomicU32::new(existing_pages.max(RESERVED_PAGES)),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
            free_map: FreePageMap::from_existing(existing_pages.max(RESERVED_PAGES)),
        };

        if existing_pages < RESERVED_PAGES {
            let zeros = [0u8; PAGE_SIZE];
            for page in existing_pages..RESERVED_PAGES {
                dm.write_page(PageId::new(page as i32), &zeros)?;
            }
            debug!(path = %dm.path.display(), "formatted new database file");
        } else {
            debug!(path = %dm.path.display(), pages = existing_pages, "opened database file");
        }

        Ok(dm)
    }

    /// Reads a page into `data`. Reads past the current end of file yield a
    /// zeroed page, matching a freshly allocated one.
    pub fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "buffer must be PAGE_SIZE bytes");
        if !page_id.is_valid() {
            return Err(RillError::InvalidPageId(page_id));
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page_id.as_offset() * PAGE_SIZE as u64))?;
        let mut read_total = 0;
        while read_total < PAGE_SIZE {
            let n = file.read(&mut data[read_total..])?;
            if n == 0 {
                break;
            }
            read_total += n;
        }
        data[read_total..].fill(0);

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes a full page from `data`.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "buffer must be PAGE_SIZE bytes");
        if !page_id.is_valid() {
            return Err(RillError::InvalidPageId(page_id));
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page_id.as_offset() * PAGE_SIZE as u64))?;
        file.write_all(data)?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Allocates a page, reusing a freed one when possible, and zeroes it on
    /// disk.
    pub fn allocate_page(&self) -> Result<PageId> {
        let page_id = self.free_map.allocate();
        let page = page_id.as_i32() as u32;
        let current = self.num_pages.load(Ordering::Relaxed);
        if page + 1 > current {
            self.num_pages.store(page + 1, Ordering::SeqCst);
        }
        let zeros = [0u8; PAGE_SIZE];
        self.write_page(page_id, &zeros)?;
        Ok(page_id)
    }

    /// Returns a page to the free map. Reserved pages are never freed.
    pub fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() {
            return Err(RillError::InvalidPageId(page_id));
        }
        if (page_id.as_i32() as u32) < RESERVED_PAGES {
            return Ok(());
        }
        self.free_map.free(page_id);
        Ok(())
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::Relaxed)
    }

    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sync(&self) -> Result<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        let _ = self.file.get_mut().sync_all();
    }
}
