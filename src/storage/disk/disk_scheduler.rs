use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;

use log::error;
use parking_lot::{Condvar, Mutex};
use tokio::sync::oneshot;

use crate::common::config::PageId;
use crate::storage::disk::disk_manager::DiskIO;
use crate::storage::page::page::PageBuffer;

/// A single read or write request against the disk manager. The caller keeps
/// ownership of the frame buffer; the scheduler only borrows it for the
/// duration of the request.
pub struct DiskRequest {
    /// Whether the request is a write or a read.
    pub is_write: bool,
    /// The frame buffer being read into or written from.
    pub data: PageBuffer,
    /// The page id the request targets.
    pub page_id: PageId,
    /// Resolved with `true` once the request has been carried out.
    pub callback: oneshot::Sender<bool>,
}

struct RequestQueue {
    queue: Mutex<VecDeque<Option<DiskRequest>>>,
    has_work: Condvar,
}

/// Serializes page read/write requests onto a single background worker.
/// Requests complete strictly in the order they were scheduled. Dropping the
/// scheduler enqueues a sentinel that lets the worker drain every earlier
/// request before exiting.
pub struct DiskScheduler {
    request_queue: Arc<RequestQueue>,
    worker_thread: Option<thread::JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk_manager: Arc<dyn DiskIO>) -> Self {
        let request_queue = Arc::new(RequestQueue {
            queue: Mutex::new(VecDeque::new()),
            has_work: Condvar::new(),
        });

        let worker_queue = Arc::clone(&request_queue);
        let worker_thread = thread::spawn(move || Self::worker_loop(worker_queue, disk_manager));

        Self {
            request_queue,
            worker_thread: Some(worker_thread),
        }
    }

    /// Enqueues a request without blocking. The returned receiver resolves to
    /// `true` once the worker has completed the transfer, or `false` if the
    /// underlying I/O failed.
    pub fn schedule(&self, is_write: bool, data: PageBuffer, page_id: PageId) -> oneshot::Receiver<bool> {
        let (callback, receiver) = oneshot::channel();
        self.enqueue(Some(DiskRequest {
            is_write,
            data,
            page_id,
            callback,
        }));
        receiver
    }

    fn enqueue(&self, request: Option<DiskRequest>) {
        let mut queue = self.request_queue.queue.lock();
        queue.push_back(request);
        self.request_queue.has_work.notify_one();
    }

    fn worker_loop(request_queue: Arc<RequestQueue>, disk_manager: Arc<dyn DiskIO>) {
        loop {
            let request = {
                let mut queue = request_queue.queue.lock();
                while queue.is_empty() {
                    request_queue.has_work.wait(&mut queue);
                }
                queue.pop_front().unwrap()
            };

            // The sentinel enqueued at destruction; everything scheduled
            // before it has already been processed.
            let Some(request) = request else {
                break;
            };

            let result = if request.is_write {
                let data = request.data.read();
                disk_manager.write_page(request.page_id, &data)
            } else {
                let mut data = request.data.write();
                disk_manager.read_page(request.page_id, &mut data)
            };

            if let Err(e) = &result {
                error!(
                    "disk {} for page {} failed: {}",
                    if request.is_write { "write" } else { "read" },
                    request.page_id,
                    e
                );
            }
            let _ = request.callback.send(result.is_ok());
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        self.enqueue(None);
        if let Some(handle) = self.worker_thread.take() {
            let _ = handle.join();
        }
    }
}
