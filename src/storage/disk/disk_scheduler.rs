use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::common::{PageId, Result, RillError, PAGE_SIZE};

use super::DiskManager;

type PageBuf = Box<[u8; PAGE_SIZE]>;

/// A disk I/O request. Buffers are owned by the request and handed back
/// through the reply channel, so no borrows cross the thread boundary.
enum DiskRequest {
    Read {
        page_id: PageId,
        reply: Sender<Result<PageBuf>>,
    },
    Write {
        page_id: PageId,
        data: PageBuf,
        reply: Sender<Result<()>>,
    },
    Shutdown,
}

/// DiskScheduler funnels page I/O through a single background worker thread
/// draining a bounded request queue.
pub struct DiskScheduler {
    disk_manager: Arc<DiskManager>,
    request_tx: Sender<DiskRequest>,
    worker: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (request_tx, request_rx) = bounded::<DiskRequest>(128);
        let worker_dm = Arc::clone(&disk_manager);
        let worker = thread::spawn(move || Self::run_worker(worker_dm, request_rx));

        Self {
            disk_manager,
            request_tx,
            worker: Some(worker),
        }
    }

    fn run_worker(dm: Arc<DiskManager>, requests: Receiver<DiskRequest>) {
        while let Ok(request) = requests.recv() {
            match request {
                DiskRequest::Read { page_id, reply } => {
                    let mut buf: PageBuf = Box::new([0u8; PAGE_SIZE]);
                    let result = dm.read_page(page_id, &mut buf[..]).map(|_| buf);
                    let _ = reply.send(result);
                }
                DiskRequest::Write {
                    page_id,
                    data,
                    reply,
                } => {
                    let _ = reply.send(dm.write_page(page_id, &data[..]));
                }
                DiskRequest::Shutdown => break,
            }
        }
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    /// Schedules a read and blocks until the page lands in `data`.
    pub fn schedule_read_sync(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);
        let (reply_tx, reply_rx) = bounded(1);
        self.request_tx
            .send(DiskRequest::Read {
                page_id,
                reply: reply_tx,
            })
            .map_err(|e| RillError::DiskScheduler(e.to_string()))?;
        let buf = reply_rx
            .recv()
            .map_err(|e| RillError::DiskScheduler(e.to_string()))??;
        data.copy_from_slice(&buf[..]);
        Ok(())
    }

    /// Schedules a write and blocks until it is on disk.
    pub fn schedule_write_sync(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);
        let mut buf: PageBuf = Box::new([0u8; PAGE_SIZE]);
        buf.copy_from_slice(data);
        let (reply_tx, reply_rx) = bounded(1);
        self.request_tx
            .send(DiskRequest::Write {
                page_id,
                data: buf,
                reply: reply_tx,
            })
            .map_err(|e| RillError::DiskScheduler(e.to_string()))?;
        reply_rx
            .recv()
            .map_err(|e| RillError::DiskScheduler(e.to_string()))?
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        let _ = self.request_tx.send(DiskRequest::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
