use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::RawRwLock;

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::buffer::lru_k_replacer::AccessType;
use crate::common::config::{PageData, PageId};
use crate::storage::page::page::Page;

/// Scoped handle to a pinned page. Holds no latch; useful as a staging step
/// before [`upgrade_read`](BasicPageGuard::upgrade_read) or
/// [`upgrade_write`](BasicPageGuard::upgrade_write).
///
/// Every guard flavor unpins exactly once, on drop or on an explicit
/// `drop_guard`, passing along the dirty flag currently observed on the page.
/// Guards transfer ownership by move only.
pub struct BasicPageGuard {
    bpm: Arc<BufferPoolManager>,
    page: Option<Arc<Page>>,
}

impl BasicPageGuard {
    /// Wraps a page that the producing pool call has already pinned.
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, page: Arc<Page>) -> Self {
        Self {
            bpm,
            page: Some(page),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page().get_page_id()
    }

    /// Takes the page latch in shared mode, transferring the pin to the
    /// returned guard.
    pub fn upgrade_read(mut self) -> ReadPageGuard {
        let page = self.page.take().expect("guard already released");
        let data = page.buffer().read_arc();
        ReadPageGuard {
            bpm: Arc::clone(&self.bpm),
            page: Some(page),
            data: Some(data),
        }
    }

    /// Takes the page latch in exclusive mode, transferring the pin to the
    /// returned guard.
    pub fn upgrade_write(mut self) -> WritePageGuard {
        let page = self.page.take().expect("guard already released");
        let data = page.buffer().write_arc();
        WritePageGuard {
            bpm: Arc::clone(&self.bpm),
            page: Some(page),
            data: Some(data),
        }
    }

    /// Unpins the page early. Safe to call more than once.
    pub fn drop_guard(&mut self) {
        if let Some(page) = self.page.take() {
            self.bpm
                .unpin_page(page.get_page_id(), page.is_dirty(), AccessType::Unknown);
        }
    }

    fn page(&self) -> &Arc<Page> {
        self.page.as_ref().expect("guard already released")
    }
}

impl Drop for BasicPageGuard {
    fn drop(&mut self) {
        self.drop_guard();
    }
}

/// Scoped handle to a pinned page held under its shared latch.
pub struct ReadPageGuard {
    bpm: Arc<BufferPoolManager>,
    page: Option<Arc<Page>>,
    data: Option<ArcRwLockReadGuard<RawRwLock, Box<PageData>>>,
}

impl ReadPageGuard {
    pub fn page_id(&self) -> PageId {
        self.page().get_page_id()
    }

    /// The page content, readable for the lifetime of the guard.
    pub fn data(&self) -> &PageData {
        self.data.as_deref().expect("guard already released")
    }

    /// Releases the latch and unpins the page early. Safe to call more than
    /// once.
    pub fn drop_guard(&mut self) {
        // Latch first, then pin: unpinning takes the pool mutex and must not
        // happen while this thread still holds a page latch.
        self.data.take();
        if let Some(page) = self.page.take() {
            self.bpm
                .unpin_page(page.get_page_id(), page.is_dirty(), AccessType::Unknown);
        }
    }

    fn page(&self) -> &Arc<Page> {
        self.page.as_ref().expect("guard already released")
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        self.drop_guard();
    }
}

/// Scoped handle to a pinned page held under its exclusive latch.
pub struct WritePageGuard {
    bpm: Arc<BufferPoolManager>,
    page: Option<Arc<Page>>,
    data: Option<ArcRwLockWriteGuard<RawRwLock, Box<PageData>>>,
}

impl WritePageGuard {
    pub fn page_id(&self) -> PageId {
        self.page().get_page_id()
    }

    /// The page content, readable for the lifetime of the guard.
    pub fn data(&self) -> &PageData {
        self.data.as_deref().expect("guard already released")
    }

    /// Mutable access to the page content. Marks the page dirty.
    pub fn data_mut(&mut self) -> &mut PageData {
        self.page.as_ref().expect("guard already released").set_dirty(true);
        self.data.as_deref_mut().expect("guard already released")
    }

    /// Releases the latch and unpins the page early. Safe to call more than
    /// once.
    pub fn drop_guard(&mut self) {
        self.data.take();
        if let Some(page) = self.page.take() {
            self.bpm
                .unpin_page(page.get_page_id(), page.is_dirty(), AccessType::Unknown);
        }
    }

    fn page(&self) -> &Arc<Page> {
        self.page.as_ref().expect("guard already released")
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        self.drop_guard();
    }
}
