use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::config::{PageData, PageId, DB_PAGE_SIZE, INVALID_PAGE_ID};

/// Shared handle to a frame's byte buffer. The `RwLock` is the page's
/// readers-writer latch; the disk scheduler's worker and the page guards are
/// the only parties that take it.
pub type PageBuffer = Arc<RwLock<Box<PageData>>>;

/// Page is the basic unit of storage within the database system. Page provides
/// a wrapper for actual data pages being held in main memory, plus the
/// book-keeping information used by the buffer pool manager: pin count, dirty
/// flag and page id.
///
/// The metadata fields are atomics mutated only while the buffer pool's mutex
/// is held; keeping them outside the data latch means the pool never has to
/// latch a page to pin it.
pub struct Page {
    page_id: AtomicI32,
    pin_count: AtomicI32,
    is_dirty: AtomicBool,
    data: PageBuffer,
}

impl Page {
    /// Constructs an empty frame: no page id, zeroed data.
    pub fn new() -> Self {
        Self {
            page_id: AtomicI32::new(INVALID_PAGE_ID),
            pin_count: AtomicI32::new(0),
            is_dirty: AtomicBool::new(false),
            data: Arc::new(RwLock::new(Box::new([0; DB_PAGE_SIZE]))),
        }
    }

    /// Returns the id of the page this frame currently holds.
    pub fn get_page_id(&self) -> PageId {
        self.page_id.load(Ordering::SeqCst)
    }

    pub(crate) fn set_page_id(&self, page_id: PageId) {
        self.page_id.store(page_id, Ordering::SeqCst);
    }

    /// Returns the pin count of this page.
    pub fn get_pin_count(&self) -> i32 {
        self.pin_count.load(Ordering::SeqCst)
    }

    pub(crate) fn set_pin_count(&self, pin_count: i32) {
        self.pin_count.store(pin_count, Ordering::SeqCst);
    }

    pub(crate) fn incr_pin_count(&self) {
        self.pin_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrements the pin count, returning the new value.
    pub(crate) fn decr_pin_count(&self) -> i32 {
        self.pin_count.fetch_sub(1, Ordering::SeqCst) - 1
    }

    /// Returns true if the in-memory content differs from disk.
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::SeqCst)
    }

    pub fn set_dirty(&self, is_dirty: bool) {
        self.is_dirty.store(is_dirty, Ordering::SeqCst);
    }

    /// Returns a shared handle to the frame buffer, as handed to the disk
    /// scheduler and the page guards.
    pub fn buffer(&self) -> PageBuffer {
        Arc::clone(&self.data)
    }

    /// Takes the page latch in shared mode for the duration of the guard.
    pub fn read(&self) -> RwLockReadGuard<'_, Box<PageData>> {
        self.data.read()
    }

    /// Takes the page latch in exclusive mode for the duration of the guard.
    pub fn write(&self) -> RwLockWriteGuard<'_, Box<PageData>> {
        self.data.write()
    }

    /// Zeroes out the data that is held within the page.
    pub(crate) fn reset_memory(&self) {
        self.data.write().fill(0);
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}
