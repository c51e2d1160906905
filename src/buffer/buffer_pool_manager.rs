use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::Mutex;

use crate::buffer::lru_k_replacer::{AccessType, LRUKReplacer};
use crate::common::config::{FrameId, PageId, INVALID_PAGE_ID};
use crate::recovery::log_manager::LogManager;
use crate::storage::disk::disk_manager::DiskIO;
use crate::storage::disk::disk_scheduler::DiskScheduler;
use crate::storage::page::page::Page;
use crate::storage::page::page_guard::{BasicPageGuard, ReadPageGuard, WritePageGuard};

/// Pool metadata guarded by a single mutex: which page lives in which frame,
/// and which frames hold nothing.
///
/// A frame is in exactly one of the free list or the page table at any moment.
struct PoolState {
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
}

/// BufferPoolManager owns a fixed array of frames and moves pages between
/// memory and disk through the disk scheduler, picking eviction victims with
/// an LRU-K replacer.
///
/// The raw `new_page`/`fetch_page` surface returns pin-counted frame handles
/// whose lifetime ends at the matching `unpin_page`; the guard constructors
/// (`fetch_page_read` and friends) are the safe way to consume it.
pub struct BufferPoolManager {
    pool_size: usize,
    next_page_id: AtomicI32,
    pages: Vec<Arc<Page>>,
    state: Mutex<PoolState>,
    replacer: Mutex<LRUKReplacer>,
    disk_scheduler: DiskScheduler,
    #[allow(dead_code)]
    log_manager: Option<Arc<LogManager>>,
}

impl BufferPoolManager {
    /// Creates a buffer pool with `pool_size` frames backed by `disk_manager`.
    /// The page id allocator resumes after the last persisted page so a
    /// reopened database never hands out colliding ids.
    pub fn new(
        pool_size: usize,
        disk_manager: Arc<dyn DiskIO>,
        replacer_k: usize,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        let pages = (0..pool_size).map(|_| Arc::new(Page::new())).collect();
        let free_list = (0..pool_size).collect();
        Self {
            pool_size,
            next_page_id: AtomicI32::new(disk_manager.num_pages()),
            pages,
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
            }),
            replacer: Mutex::new(LRUKReplacer::new(pool_size, replacer_k)),
            disk_scheduler: DiskScheduler::new(disk_manager),
            log_manager,
        }
    }

    pub fn get_pool_size(&self) -> usize {
        self.pool_size
    }

    /// Allocates a fresh page id and binds it to a frame, pinned once.
    /// Returns `None` when every frame is pinned.
    pub fn new_page(&self) -> Option<Arc<Page>> {
        let mut state = self.state.lock();
        let frame_id = self.acquire_frame(&mut state)?;

        let page_id = self.allocate_page();
        let page = &self.pages[frame_id];
        page.set_page_id(page_id);
        page.set_pin_count(1);
        state.page_table.insert(page_id, frame_id);

        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id, AccessType::Unknown);
        replacer.set_evictable(frame_id, false);

        debug!("created page {} in frame {}", page_id, frame_id);
        Some(Arc::clone(page))
    }

    /// Returns the requested page pinned one more time, reading it from disk
    /// if it is not resident. Returns `None` when the page would need a frame
    /// and every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId, access_type: AccessType) -> Option<Arc<Page>> {
        if page_id == INVALID_PAGE_ID {
            return None;
        }

        let mut state = self.state.lock();
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let page = &self.pages[frame_id];
            page.incr_pin_count();

            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id, access_type);
            replacer.set_evictable(frame_id, false);

            trace!("page {} already resident in frame {}", page_id, frame_id);
            return Some(Arc::clone(page));
        }

        let frame_id = self.acquire_frame(&mut state)?;
        let page = &self.pages[frame_id];
        page.set_page_id(page_id);
        state.page_table.insert(page_id, frame_id);

        // Only pages the allocator has handed out can exist on disk; anything
        // newer keeps the zeroed frame.
        if page_id < self.next_page_id.load(Ordering::SeqCst) {
            let receiver = self.disk_scheduler.schedule(false, page.buffer(), page_id);
            receiver
                .blocking_recv()
                .expect("disk scheduler dropped a read request");
        }

        page.set_pin_count(1);
        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id, access_type);
        replacer.set_evictable(frame_id, false);

        debug!("fetched page {} into frame {}", page_id, frame_id);
        Some(Arc::clone(page))
    }

    /// Drops one pin on the page. Returns `false` if the page is not resident
    /// or was not pinned. A `true` `is_dirty` sticks until the page is flushed
    /// or evicted; `false` never clears an earlier mark.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool, _access_type: AccessType) -> bool {
        let state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let page = &self.pages[frame_id];
        if page.get_pin_count() <= 0 {
            return false;
        }

        if is_dirty {
            page.set_dirty(true);
        }
        if page.decr_pin_count() == 0 {
            self.replacer.lock().set_evictable(frame_id, true);
        }
        true
    }

    /// Writes the page to disk (dirty or not) and clears its dirty flag.
    /// Returns `false` if the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> bool {
        let state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        self.flush_frame(frame_id);
        true
    }

    /// Flushes every resident page.
    pub fn flush_all_pages(&self) {
        let state = self.state.lock();
        for &frame_id in state.page_table.values() {
            self.flush_frame(frame_id);
        }
    }

    /// Evicts the page from the pool, returning its frame to the free list.
    /// Deleting a non-resident page is a no-op that succeeds; deleting a
    /// pinned page is refused.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return true;
        };
        let page = &self.pages[frame_id];
        if page.get_pin_count() > 0 {
            return false;
        }

        state.page_table.remove(&page_id);
        self.replacer.lock().remove(frame_id);
        page.reset_memory();
        page.set_dirty(false);
        page.set_pin_count(0);
        page.set_page_id(INVALID_PAGE_ID);
        state.free_list.push_back(frame_id);

        self.deallocate_page(page_id);
        debug!("deleted page {}, frame {} freed", page_id, frame_id);
        true
    }

    /// Hands out the next page id.
    pub fn allocate_page(&self) -> PageId {
        self.next_page_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Placeholder for returning a page id to the allocator; ids are currently
    /// never reused.
    pub fn deallocate_page(&self, _page_id: PageId) {}

    /// Creates a new page wrapped in a basic (pin-only) guard.
    pub fn new_page_guarded(self: &Arc<Self>) -> Option<BasicPageGuard> {
        let page = self.new_page()?;
        Some(BasicPageGuard::new(Arc::clone(self), page))
    }

    /// Fetches a page wrapped in a basic (pin-only) guard.
    pub fn fetch_page_basic(self: &Arc<Self>, page_id: PageId) -> Option<BasicPageGuard> {
        let page = self.fetch_page(page_id, AccessType::Unknown)?;
        Some(BasicPageGuard::new(Arc::clone(self), page))
    }

    /// Fetches a page and takes its latch in shared mode.
    pub fn fetch_page_read(self: &Arc<Self>, page_id: PageId) -> Option<ReadPageGuard> {
        Some(self.fetch_page_basic(page_id)?.upgrade_read())
    }

    /// Fetches a page and takes its latch in exclusive mode.
    pub fn fetch_page_write(self: &Arc<Self>, page_id: PageId) -> Option<WritePageGuard> {
        Some(self.fetch_page_basic(page_id)?.upgrade_write())
    }

    /// Produces a frame ready to hold a new page: from the free list when one
    /// exists, otherwise by evicting a victim (writing it back first when
    /// dirty). Returns `None` when the replacer has no victim to offer.
    fn acquire_frame(&self, state: &mut PoolState) -> Option<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Some(frame_id);
        }

        let frame_id = self.replacer.lock().evict()?;
        let page = &self.pages[frame_id];
        let old_page_id = page.get_page_id();

        if page.is_dirty() {
            let receiver = self.disk_scheduler.schedule(true, page.buffer(), old_page_id);
            receiver
                .blocking_recv()
                .expect("disk scheduler dropped a write request");
        }

        state.page_table.remove(&old_page_id);
        page.reset_memory();
        page.set_dirty(false);
        page.set_pin_count(0);
        page.set_page_id(INVALID_PAGE_ID);

        trace!("evicted page {} from frame {}", old_page_id, frame_id);
        Some(frame_id)
    }

    fn flush_frame(&self, frame_id: FrameId) {
        let page = &self.pages[frame_id];
        let receiver = self
            .disk_scheduler
            .schedule(true, page.buffer(), page.get_page_id());
        receiver
            .blocking_recv()
            .expect("disk scheduler dropped a write request");
        page.set_dirty(false);
    }
}
