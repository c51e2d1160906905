use std::cmp::Ordering;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use log::{debug, info};

use crate::buffer::buffer_pool_manager::BufferPoolManager;
use crate::common::config::{PageId, INVALID_PAGE_ID};
use crate::common::exception::BufferPoolError;
use crate::container::hash_function::{HashFunction, KeyHasher};
use crate::storage::index::codec::Codec;
use crate::storage::index::comparator::Comparator;
use crate::storage::page::page_types::extendable_hash_table_bucket_page::{
    htable_bucket_array_size, ExtendableHTableBucketPage,
};
use crate::storage::page::page_types::extendable_hash_table_directory_page::ExtendableHTableDirectoryPage;
use crate::storage::page::page_types::extendable_hash_table_header_page::ExtendableHTableHeaderPage;

/// Implementation of an extendible hash table backed by a buffer pool manager.
/// Three page levels: one header routing the top bits of the hash to a
/// directory, directories routing the low bits to buckets, and buckets holding
/// the key/value pairs. Buckets split as they fill and merge as they empty;
/// directories double and halve with them.
///
/// Keys are unique. Every page is accessed through a guard: reads take shared
/// latches, mutations take exclusive latches on the directory and bucket.
pub struct DiskExtendableHashTable<K, V, C, H = HashFunction<K>> {
    index_name: String,
    bpm: Arc<BufferPoolManager>,
    cmp: C,
    hash_fn: H,
    directory_max_depth: u32,
    bucket_max_size: u32,
    header_page_id: PageId,
    _marker: PhantomData<(K, V)>,
}

impl<K, V, C, H> DiskExtendableHashTable<K, V, C, H>
where
    K: Codec + Clone + Debug,
    V: Codec + Clone + Debug,
    C: Comparator<K>,
    H: KeyHasher<K>,
{
    /// Creates the table and its header page.
    pub fn new(
        name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        cmp: C,
        hash_fn: H,
        header_max_depth: u32,
        directory_max_depth: u32,
        bucket_max_size: u32,
    ) -> Result<Self, BufferPoolError> {
        assert!(
            bucket_max_size as usize <= htable_bucket_array_size(K::SIZE + V::SIZE),
            "bucket_max_size {} does not fit in a page",
            bucket_max_size
        );

        let index_name = name.into();
        let mut header_guard = bpm
            .new_page_guarded()
            .ok_or(BufferPoolError::OutOfFrames)?
            .upgrade_write();
        let header_page_id = header_guard.page_id();
        let header = ExtendableHTableHeaderPage::new(header_max_depth);
        header.save(header_guard.data_mut());

        info!(
            "created extendible hash table '{}' with header page {}",
            index_name, header_page_id
        );
        Ok(Self {
            index_name,
            bpm,
            cmp,
            hash_fn,
            directory_max_depth,
            bucket_max_size,
            header_page_id,
            _marker: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.index_name
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    /// Inserts a key-value pair, splitting buckets (and growing the directory)
    /// as needed. Returns `false` when the key is already present or the
    /// directory has reached its maximum depth and cannot split further.
    pub fn insert(&self, key: K, value: V) -> bool {
        let hash = self.hash(&key);

        let directory_page_id = match self.route_to_directory(hash) {
            Some(INVALID_PAGE_ID) => match self.create_directory(hash) {
                Some(page_id) => page_id,
                None => return false,
            },
            Some(page_id) => page_id,
            None => return false,
        };

        loop {
            let Some(mut dir_guard) = self.bpm.fetch_page_write(directory_page_id) else {
                return false;
            };
            let mut directory = ExtendableHTableDirectoryPage::load(dir_guard.data());
            let bucket_idx = directory.hash_to_bucket_index(hash) as usize;
            let bucket_page_id = directory.get_bucket_page_id(bucket_idx);

            if bucket_page_id == INVALID_PAGE_ID {
                let Some(basic) = self.bpm.new_page_guarded() else {
                    return false;
                };
                let mut bucket_guard = basic.upgrade_write();
                let mut bucket =
                    ExtendableHTableBucketPage::<K, V, C>::new(self.bucket_max_size);
                let inserted = bucket.insert(key, value, &self.cmp);
                bucket.save(bucket_guard.data_mut());
                directory.set_bucket_page_id(bucket_idx, bucket_guard.page_id());
                directory.save(dir_guard.data_mut());
                debug!(
                    "installed bucket page {} at slot {} of directory {}",
                    bucket_guard.page_id(),
                    bucket_idx,
                    directory_page_id
                );
                return inserted;
            }

            let Some(mut bucket_guard) = self.bpm.fetch_page_write(bucket_page_id) else {
                return false;
            };
            let mut bucket = ExtendableHTableBucketPage::<K, V, C>::load(bucket_guard.data());

            if !bucket.is_full() {
                let inserted = bucket.insert(key, value, &self.cmp);
                if inserted {
                    bucket.save(bucket_guard.data_mut());
                }
                return inserted;
            }
            if bucket.lookup(&key, &self.cmp).is_some() {
                return false;
            }

            // Full bucket: split it, then route the key again. Redistribution
            // may leave one side full, in which case the next pass splits it
            // once more.
            let local_depth = directory.get_local_depth(bucket_idx);
            if directory.get_split_index(bucket_idx) >= directory.size() {
                if directory.get_global_depth() == directory.get_max_depth() {
                    debug!(
                        "cannot split bucket {}: directory {} is at max depth {}",
                        bucket_page_id,
                        directory_page_id,
                        directory.get_max_depth()
                    );
                    return false;
                }
                directory.incr_global_depth();
            }

            let Some(new_basic) = self.bpm.new_page_guarded() else {
                return false;
            };
            let mut new_bucket_guard = new_basic.upgrade_write();
            let new_bucket_page_id = new_bucket_guard.page_id();
            let mut new_bucket =
                ExtendableHTableBucketPage::<K, V, C>::new(self.bucket_max_size);

            // The splitting bucket's slot class divides into the slots that
            // keep the old low bits and the slots gaining the new high bit.
            let new_local_depth = local_depth + 1;
            let low_mask = (1usize << new_local_depth) - 1;
            let old_low = bucket_idx & ((1usize << local_depth) - 1);
            let new_low = old_low | (1usize << local_depth);

            for i in 0..directory.size() {
                if i & low_mask == new_low {
                    directory.set_bucket_page_id(i, new_bucket_page_id);
                    directory.set_local_depth(i, new_local_depth as u8);
                } else if i & low_mask == old_low {
                    directory.set_local_depth(i, new_local_depth as u8);
                }
            }

            for (entry_key, entry_value) in bucket.take_entries() {
                if self.hash(&entry_key) as usize & low_mask == new_low {
                    new_bucket.append_unchecked(entry_key, entry_value);
                } else {
                    bucket.append_unchecked(entry_key, entry_value);
                }
            }

            bucket.save(bucket_guard.data_mut());
            new_bucket.save(new_bucket_guard.data_mut());
            directory.save(dir_guard.data_mut());
            debug!(
                "split bucket {} into {} at local depth {}",
                bucket_page_id, new_bucket_page_id, new_local_depth
            );
        }
    }

    /// Returns every value stored under `key`.
    pub fn get_value(&self, key: &K) -> Vec<V> {
        let hash = self.hash(key);

        let Some(header_guard) = self.bpm.fetch_page_read(self.header_page_id) else {
            return Vec::new();
        };
        let header = ExtendableHTableHeaderPage::load(header_guard.data());
        let directory_page_id =
            header.get_directory_page_id(header.hash_to_directory_index(hash) as usize);
        if directory_page_id == INVALID_PAGE_ID {
            return Vec::new();
        }

        let Some(dir_guard) = self.bpm.fetch_page_read(directory_page_id) else {
            return Vec::new();
        };
        drop(header_guard);
        let directory = ExtendableHTableDirectoryPage::load(dir_guard.data());
        let bucket_page_id =
            directory.get_bucket_page_id(directory.hash_to_bucket_index(hash) as usize);
        if bucket_page_id == INVALID_PAGE_ID {
            return Vec::new();
        }

        let Some(bucket_guard) = self.bpm.fetch_page_read(bucket_page_id) else {
            return Vec::new();
        };
        drop(dir_guard);
        let bucket = ExtendableHTableBucketPage::<K, V, C>::load(bucket_guard.data());

        let mut result = Vec::new();
        for i in 0..bucket.size() as usize {
            let (entry_key, entry_value) = bucket.entry_at(i);
            if self.cmp.compare(entry_key, key) == Ordering::Equal {
                result.push(entry_value.clone());
            }
        }
        result
    }

    /// Removes every entry stored under `key`. An emptied bucket merges with
    /// its split image when their depths match, and the directory halves while
    /// it can. Returns whether anything was removed.
    pub fn remove(&self, key: &K) -> bool {
        let hash = self.hash(key);

        let directory_page_id = match self.route_to_directory(hash) {
            Some(INVALID_PAGE_ID) | None => return false,
            Some(page_id) => page_id,
        };

        let Some(mut dir_guard) = self.bpm.fetch_page_write(directory_page_id) else {
            return false;
        };
        let mut directory = ExtendableHTableDirectoryPage::load(dir_guard.data());
        let bucket_idx = directory.hash_to_bucket_index(hash) as usize;
        let bucket_page_id = directory.get_bucket_page_id(bucket_idx);
        if bucket_page_id == INVALID_PAGE_ID {
            return false;
        }

        let Some(mut bucket_guard) = self.bpm.fetch_page_write(bucket_page_id) else {
            return false;
        };
        let mut bucket = ExtendableHTableBucketPage::<K, V, C>::load(bucket_guard.data());
        if !bucket.remove(key, &self.cmp) {
            return false;
        }
        bucket.save(bucket_guard.data_mut());

        if bucket.is_empty() && directory.get_local_depth(bucket_idx) > 0 {
            let local_depth = directory.get_local_depth(bucket_idx);
            let image_idx = directory.get_split_image_index(bucket_idx);
            let image_page_id = directory.get_bucket_page_id(image_idx);

            if directory.get_local_depth(image_idx) == local_depth
                && image_page_id != bucket_page_id
                && image_page_id != INVALID_PAGE_ID
            {
                // Point the emptied class at the surviving bucket and shorten
                // both classes by one bit.
                let merged_depth = (local_depth - 1) as u8;
                for i in 0..directory.size() {
                    let page_id = directory.get_bucket_page_id(i);
                    if page_id == bucket_page_id || page_id == image_page_id {
                        directory.set_bucket_page_id(i, image_page_id);
                        directory.set_local_depth(i, merged_depth);
                    }
                }

                bucket_guard.drop_guard();
                self.bpm.delete_page(bucket_page_id);
                debug!(
                    "merged bucket {} into {} at local depth {}",
                    bucket_page_id, image_page_id, merged_depth
                );
            }

            while directory.can_shrink() {
                directory.decr_global_depth();
            }
            directory.save(dir_guard.data_mut());
        }

        true
    }

    /// Walks the header and every reachable directory, checking the
    /// directory-level invariants.
    ///
    /// # Panics
    ///
    /// Panics on the first violated invariant.
    pub fn verify_integrity(&self) {
        let header_guard = self
            .bpm
            .fetch_page_read(self.header_page_id)
            .expect("header page must be fetchable");
        let header = ExtendableHTableHeaderPage::load(header_guard.data());

        for i in 0..header.max_size() as usize {
            let directory_page_id = header.get_directory_page_id(i);
            if directory_page_id == INVALID_PAGE_ID {
                continue;
            }
            let dir_guard = self
                .bpm
                .fetch_page_read(directory_page_id)
                .expect("directory page must be fetchable");
            let directory = ExtendableHTableDirectoryPage::load(dir_guard.data());
            directory.verify_integrity();
        }
    }

    fn hash(&self, key: &K) -> u32 {
        self.hash_fn.get_hash(key) as u32
    }

    /// Reads the directory page id the hash routes to through the header.
    /// `None` means the header itself could not be fetched.
    fn route_to_directory(&self, hash: u32) -> Option<PageId> {
        let header_guard = self.bpm.fetch_page_read(self.header_page_id)?;
        let header = ExtendableHTableHeaderPage::load(header_guard.data());
        Some(header.get_directory_page_id(header.hash_to_directory_index(hash) as usize))
    }

    /// Creates a directory page for the hash's header slot, re-checking under
    /// the header's exclusive latch in case another thread got there first.
    fn create_directory(&self, hash: u32) -> Option<PageId> {
        let mut header_guard = self.bpm.fetch_page_write(self.header_page_id)?;
        let mut header = ExtendableHTableHeaderPage::load(header_guard.data());
        let directory_idx = header.hash_to_directory_index(hash) as usize;

        let existing = header.get_directory_page_id(directory_idx);
        if existing != INVALID_PAGE_ID {
            return Some(existing);
        }

        let mut dir_guard = self.bpm.new_page_guarded()?.upgrade_write();
        let directory = ExtendableHTableDirectoryPage::new(self.directory_max_depth);
        directory.save(dir_guard.data_mut());

        header.set_directory_page_id(directory_idx, dir_guard.page_id());
        header.save(header_guard.data_mut());
        debug!(
            "created directory page {} for header slot {}",
            dir_guard.page_id(),
            directory_idx
        );
        Some(dir_guard.page_id())
    }
}
