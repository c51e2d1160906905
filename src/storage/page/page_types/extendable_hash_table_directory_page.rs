use std::collections::HashMap;
use std::mem::size_of;

use crate::common::config::{PageData, PageId, INVALID_PAGE_ID};

pub const HTABLE_DIRECTORY_PAGE_METADATA_SIZE: usize = 2 * size_of::<u32>();
pub const HTABLE_DIRECTORY_MAX_DEPTH: u32 = 9;

/// Middle level of an extendible hash table. Routes the low `global_depth`
/// bits of a key's hash to a bucket page, and tracks each slot's local depth
/// so buckets can split and merge independently of the directory size.
///
/// In-page layout (host byte order):
/// `[max_depth: u32][global_depth: u32][bucket_page_ids: i32 x 2^max_depth]
///  [local_depths: u8 x 2^max_depth]`
///
/// The arrays are persisted at their full `2^max_depth` length; entries past
/// `2^global_depth` are undefined.
pub struct ExtendableHTableDirectoryPage {
    max_depth: u32,
    global_depth: u32,
    bucket_page_ids: Vec<PageId>,
    local_depths: Vec<u8>,
}

impl ExtendableHTableDirectoryPage {
    /// Creates a directory of depth 0 with every slot invalid.
    pub fn new(max_depth: u32) -> Self {
        assert!(
            max_depth <= HTABLE_DIRECTORY_MAX_DEPTH,
            "directory max_depth {} exceeds limit {}",
            max_depth,
            HTABLE_DIRECTORY_MAX_DEPTH
        );
        Self {
            max_depth,
            global_depth: 0,
            bucket_page_ids: vec![INVALID_PAGE_ID; 1 << max_depth],
            local_depths: vec![0; 1 << max_depth],
        }
    }

    /// Reads a directory back from a page buffer.
    pub fn load(data: &PageData) -> Self {
        let max_depth = u32::from_ne_bytes(data[0..4].try_into().unwrap());
        let global_depth = u32::from_ne_bytes(data[4..8].try_into().unwrap());
        assert!(
            max_depth <= HTABLE_DIRECTORY_MAX_DEPTH && global_depth <= max_depth,
            "corrupt directory page: max_depth {} global_depth {}",
            max_depth,
            global_depth
        );
        let size = 1usize << max_depth;
        let mut offset = HTABLE_DIRECTORY_PAGE_METADATA_SIZE;
        let mut bucket_page_ids = Vec::with_capacity(size);
        for _ in 0..size {
            bucket_page_ids.push(PageId::from_ne_bytes(
                data[offset..offset + 4].try_into().unwrap(),
            ));
            offset += 4;
        }
        let local_depths = data[offset..offset + size].to_vec();
        Self {
            max_depth,
            global_depth,
            bucket_page_ids,
            local_depths,
        }
    }

    /// Writes the directory into a page buffer.
    pub fn save(&self, data: &mut PageData) {
        data[0..4].copy_from_slice(&self.max_depth.to_ne_bytes());
        data[4..8].copy_from_slice(&self.global_depth.to_ne_bytes());
        let mut offset = HTABLE_DIRECTORY_PAGE_METADATA_SIZE;
        for page_id in &self.bucket_page_ids {
            data[offset..offset + 4].copy_from_slice(&page_id.to_ne_bytes());
            offset += 4;
        }
        data[offset..offset + self.local_depths.len()].copy_from_slice(&self.local_depths);
    }

    /// Returns the bucket slot the hash routes to: the low `global_depth`
    /// bits.
    pub fn hash_to_bucket_index(&self, hash: u32) -> u32 {
        hash & self.global_depth_mask()
    }

    /// Mask of the hash bits the directory currently uses.
    pub fn global_depth_mask(&self) -> u32 {
        (1u32 << self.global_depth) - 1
    }

    /// Mask of the hash bits that select the bucket at `bucket_idx`.
    pub fn local_depth_mask(&self, bucket_idx: usize) -> u32 {
        (1u32 << self.get_local_depth(bucket_idx)) - 1
    }

    pub fn get_bucket_page_id(&self, bucket_idx: usize) -> PageId {
        assert!(bucket_idx < self.size(), "bucket index {} out of range", bucket_idx);
        self.bucket_page_ids[bucket_idx]
    }

    pub fn set_bucket_page_id(&mut self, bucket_idx: usize, bucket_page_id: PageId) {
        assert!(bucket_idx < self.size(), "bucket index {} out of range", bucket_idx);
        self.bucket_page_ids[bucket_idx] = bucket_page_id;
    }

    pub fn get_local_depth(&self, bucket_idx: usize) -> u32 {
        assert!(bucket_idx < self.size(), "bucket index {} out of range", bucket_idx);
        self.local_depths[bucket_idx] as u32
    }

    pub fn set_local_depth(&mut self, bucket_idx: usize, local_depth: u8) {
        assert!(bucket_idx < self.size(), "bucket index {} out of range", bucket_idx);
        assert!(
            local_depth as u32 <= self.global_depth,
            "local depth {} exceeds global depth {}",
            local_depth,
            self.global_depth
        );
        self.local_depths[bucket_idx] = local_depth;
    }

    pub fn incr_local_depth(&mut self, bucket_idx: usize) {
        let depth = self.get_local_depth(bucket_idx);
        self.set_local_depth(bucket_idx, (depth + 1) as u8);
    }

    pub fn decr_local_depth(&mut self, bucket_idx: usize) {
        let depth = self.get_local_depth(bucket_idx);
        assert!(depth > 0, "cannot decrement local depth of bucket {}", bucket_idx);
        self.local_depths[bucket_idx] = (depth - 1) as u8;
    }

    /// Slot where the upper half of a splitting bucket lands:
    /// `bucket_idx | 1 << local_depth`.
    pub fn get_split_index(&self, bucket_idx: usize) -> usize {
        bucket_idx | (1usize << self.get_local_depth(bucket_idx))
    }

    /// Sibling slot of `bucket_idx` at its current local depth, the merge
    /// partner when the bucket empties. Slots at depth 0 have no sibling and
    /// map to themselves.
    pub fn get_split_image_index(&self, bucket_idx: usize) -> usize {
        let depth = self.get_local_depth(bucket_idx);
        if depth == 0 {
            return bucket_idx;
        }
        bucket_idx ^ (1usize << (depth - 1))
    }

    /// Doubles the directory: every new slot mirrors the pointer and local
    /// depth of its image in the lower half.
    pub fn incr_global_depth(&mut self) {
        assert!(
            self.global_depth < self.max_depth,
            "directory already at max depth {}",
            self.max_depth
        );
        let old_size = self.size();
        self.global_depth += 1;
        for i in old_size..self.size() {
            self.bucket_page_ids[i] = self.bucket_page_ids[i - old_size];
            self.local_depths[i] = self.local_depths[i - old_size];
        }
    }

    /// Halves the directory. Never decrements below zero.
    pub fn decr_global_depth(&mut self) {
        if self.global_depth == 0 {
            return;
        }
        self.global_depth -= 1;
    }

    /// The directory can halve only when no slot uses all `global_depth` bits.
    pub fn can_shrink(&self) -> bool {
        if self.global_depth == 0 {
            return false;
        }
        (0..self.size()).all(|i| (self.local_depths[i] as u32) < self.global_depth)
    }

    /// Number of active slots, `2^global_depth`.
    pub fn size(&self) -> usize {
        1 << self.global_depth
    }

    pub fn max_size(&self) -> usize {
        1 << self.max_depth
    }

    pub fn get_global_depth(&self) -> u32 {
        self.global_depth
    }

    pub fn get_max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Checks the structural invariants of the active slots:
    /// every local depth is at most the global depth, slots sharing a bucket
    /// page agree on local depth, and each bucket page is referenced by
    /// exactly `2^(global_depth - local_depth)` slots.
    ///
    /// # Panics
    ///
    /// Panics on the first violated invariant.
    pub fn verify_integrity(&self) {
        let mut page_id_refs: HashMap<PageId, (u32, u32)> = HashMap::new();

        for i in 0..self.size() {
            let page_id = self.bucket_page_ids[i];
            if page_id == INVALID_PAGE_ID {
                continue;
            }
            let local_depth = self.local_depths[i] as u32;
            assert!(
                local_depth <= self.global_depth,
                "slot {}: local depth {} exceeds global depth {}",
                i,
                local_depth,
                self.global_depth
            );
            let entry = page_id_refs.entry(page_id).or_insert((0, local_depth));
            assert_eq!(
                entry.1, local_depth,
                "bucket page {} referenced with differing local depths",
                page_id
            );
            entry.0 += 1;
        }

        for (page_id, (count, local_depth)) in page_id_refs {
            let expected = 1u32 << (self.global_depth - local_depth);
            assert_eq!(
                count, expected,
                "bucket page {} has {} references, expected {}",
                page_id, count, expected
            );
        }
    }
}
