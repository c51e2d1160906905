use std::mem::size_of;

use crate::common::config::{PageData, PageId, INVALID_PAGE_ID};

pub const HTABLE_HEADER_PAGE_METADATA_SIZE: usize = size_of::<u32>();
pub const HTABLE_HEADER_MAX_DEPTH: u32 = 9;

/// Root page of an extendible hash table. Routes the top `max_depth` bits of a
/// key's hash to one of `2^max_depth` directory pages.
///
/// In-page layout (host byte order):
/// `[max_depth: u32][directory_page_ids: i32 x 2^max_depth]`
pub struct ExtendableHTableHeaderPage {
    max_depth: u32,
    directory_page_ids: Vec<PageId>,
}

impl ExtendableHTableHeaderPage {
    /// Creates a header with every directory slot invalid.
    pub fn new(max_depth: u32) -> Self {
        assert!(
            max_depth <= HTABLE_HEADER_MAX_DEPTH,
            "header max_depth {} exceeds limit {}",
            max_depth,
            HTABLE_HEADER_MAX_DEPTH
        );
        Self {
            max_depth,
            directory_page_ids: vec![INVALID_PAGE_ID; 1 << max_depth],
        }
    }

    /// Reads a header back from a page buffer.
    pub fn load(data: &PageData) -> Self {
        let max_depth = u32::from_ne_bytes(data[0..4].try_into().unwrap());
        assert!(
            max_depth <= HTABLE_HEADER_MAX_DEPTH,
            "corrupt header page: max_depth {}",
            max_depth
        );
        let size = 1usize << max_depth;
        let mut directory_page_ids = Vec::with_capacity(size);
        let mut offset = HTABLE_HEADER_PAGE_METADATA_SIZE;
        for _ in 0..size {
            directory_page_ids.push(PageId::from_ne_bytes(
                data[offset..offset + 4].try_into().unwrap(),
            ));
            offset += 4;
        }
        Self {
            max_depth,
            directory_page_ids,
        }
    }

    /// Writes the header into a page buffer.
    pub fn save(&self, data: &mut PageData) {
        data[0..4].copy_from_slice(&self.max_depth.to_ne_bytes());
        let mut offset = HTABLE_HEADER_PAGE_METADATA_SIZE;
        for page_id in &self.directory_page_ids {
            data[offset..offset + 4].copy_from_slice(&page_id.to_ne_bytes());
            offset += 4;
        }
    }

    /// Returns the directory index the hash routes to: the top `max_depth`
    /// bits of the 32-bit hash, or 0 when the header keeps a single slot.
    pub fn hash_to_directory_index(&self, hash: u32) -> u32 {
        if self.max_depth == 0 {
            return 0;
        }
        hash >> (32 - self.max_depth)
    }

    /// Returns the directory page ID at an index.
    pub fn get_directory_page_id(&self, directory_idx: usize) -> PageId {
        assert!(
            directory_idx < self.directory_page_ids.len(),
            "directory index {} out of range",
            directory_idx
        );
        self.directory_page_ids[directory_idx]
    }

    /// Sets the directory page ID at an index.
    pub fn set_directory_page_id(&mut self, directory_idx: usize, directory_page_id: PageId) {
        assert!(
            directory_idx < self.directory_page_ids.len(),
            "directory index {} out of range",
            directory_idx
        );
        self.directory_page_ids[directory_idx] = directory_page_id;
    }

    /// Returns the number of directory page IDs the header can hold.
    pub fn max_size(&self) -> u32 {
        1 << self.max_depth
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }
}
