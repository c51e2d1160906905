use std::cmp::Ordering;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::mem::size_of;

use crate::common::config::{PageData, DB_PAGE_SIZE};
use crate::storage::index::codec::Codec;
use crate::storage::index::comparator::Comparator;

pub const HTABLE_BUCKET_PAGE_METADATA_SIZE: usize = 2 * size_of::<u32>();

/// Number of `(key, value)` pairs a bucket page can hold for a given pair
/// encoding width.
pub fn htable_bucket_array_size(mapping_type_size: usize) -> usize {
    (DB_PAGE_SIZE - HTABLE_BUCKET_PAGE_METADATA_SIZE) / mapping_type_size
}

pub type MappingType<K, V> = (K, V);

/// Leaf page of an extendible hash table: an unordered array of key/value
/// pairs with unique keys.
///
/// In-page layout (host byte order):
/// `[size: u32][max_size: u32][(key, value) x size]`
pub struct ExtendableHTableBucketPage<K, V, C> {
    max_size: u32,
    array: Vec<MappingType<K, V>>,
    _marker: PhantomData<C>,
}

impl<K, V, C> ExtendableHTableBucketPage<K, V, C>
where
    K: Codec + Clone + Debug,
    V: Codec + Clone + Debug,
    C: Comparator<K>,
{
    /// Creates an empty bucket holding at most `max_size` pairs.
    pub fn new(max_size: u32) -> Self {
        assert!(
            max_size as usize <= htable_bucket_array_size(K::SIZE + V::SIZE),
            "bucket max_size {} does not fit in a page",
            max_size
        );
        Self {
            max_size,
            array: Vec::with_capacity(max_size as usize),
            _marker: PhantomData,
        }
    }

    /// Reads a bucket back from a page buffer.
    pub fn load(data: &PageData) -> Self {
        let size = u32::from_ne_bytes(data[0..4].try_into().unwrap());
        let max_size = u32::from_ne_bytes(data[4..8].try_into().unwrap());
        assert!(
            size <= max_size
                && max_size as usize <= htable_bucket_array_size(K::SIZE + V::SIZE),
            "corrupt bucket page: size {} max_size {}",
            size,
            max_size
        );
        let mut array = Vec::with_capacity(max_size as usize);
        let mut offset = HTABLE_BUCKET_PAGE_METADATA_SIZE;
        for _ in 0..size {
            let key = K::decode(&data[offset..offset + K::SIZE]);
            offset += K::SIZE;
            let value = V::decode(&data[offset..offset + V::SIZE]);
            offset += V::SIZE;
            array.push((key, value));
        }
        Self {
            max_size,
            array,
            _marker: PhantomData,
        }
    }

    /// Writes the bucket into a page buffer.
    pub fn save(&self, data: &mut PageData) {
        data[0..4].copy_from_slice(&(self.array.len() as u32).to_ne_bytes());
        data[4..8].copy_from_slice(&self.max_size.to_ne_bytes());
        let mut offset = HTABLE_BUCKET_PAGE_METADATA_SIZE;
        for (key, value) in &self.array {
            key.encode(&mut data[offset..offset + K::SIZE]);
            offset += K::SIZE;
            value.encode(&mut data[offset..offset + V::SIZE]);
            offset += V::SIZE;
        }
    }

    /// Returns the value stored under `key`, if any.
    pub fn lookup(&self, key: &K, cmp: &C) -> Option<&V> {
        self.array
            .iter()
            .find(|(k, _)| cmp.compare(k, key) == Ordering::Equal)
            .map(|(_, v)| v)
    }

    /// Attempts to insert a key-value pair. Fails when the bucket is full or
    /// the key is already present.
    pub fn insert(&mut self, key: K, value: V, cmp: &C) -> bool {
        if self.is_full() || self.lookup(&key, cmp).is_some() {
            return false;
        }
        self.array.push((key, value));
        true
    }

    /// Removes every entry matching `key`. Returns whether anything was
    /// removed.
    pub fn remove(&mut self, key: &K, cmp: &C) -> bool {
        let before = self.array.len();
        self.array
            .retain(|(k, _)| cmp.compare(k, key) != Ordering::Equal);
        self.array.len() != before
    }

    /// Removes the entry at a specific index.
    pub fn remove_at(&mut self, bucket_idx: usize) {
        assert!(bucket_idx < self.array.len(), "bucket entry {} out of range", bucket_idx);
        self.array.swap_remove(bucket_idx);
    }

    /// Gets the key at a specific index.
    pub fn key_at(&self, bucket_idx: usize) -> &K {
        &self.entry_at(bucket_idx).0
    }

    /// Gets the value at a specific index.
    pub fn value_at(&self, bucket_idx: usize) -> &V {
        &self.entry_at(bucket_idx).1
    }

    /// Gets the entry at a specific index.
    pub fn entry_at(&self, bucket_idx: usize) -> &MappingType<K, V> {
        assert!(bucket_idx < self.array.len(), "bucket entry {} out of range", bucket_idx);
        &self.array[bucket_idx]
    }

    /// Takes every entry out of the bucket, leaving it empty. Used when
    /// redistributing a splitting bucket.
    pub(crate) fn take_entries(&mut self) -> Vec<MappingType<K, V>> {
        std::mem::take(&mut self.array)
    }

    /// Appends without the full/duplicate checks; only valid while
    /// redistributing entries that came out of a bucket of the same capacity.
    pub(crate) fn append_unchecked(&mut self, key: K, value: V) {
        debug_assert!(self.array.len() < self.max_size as usize);
        self.array.push((key, value));
    }

    /// Returns the number of entries in the bucket.
    pub fn size(&self) -> u32 {
        self.array.len() as u32
    }

    /// Returns the maximum number of entries the bucket can hold.
    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    pub fn is_full(&self) -> bool {
        self.array.len() >= self.max_size as usize
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::DB_PAGE_SIZE;
    use crate::common::rid::RID;
    use crate::storage::index::comparator::IntComparator;

    type TestBucket = ExtendableHTableBucketPage<i32, RID, IntComparator>;

    #[test]
    fn insert_lookup_remove() {
        let cmp = IntComparator::new();
        let mut bucket = TestBucket::new(4);

        assert!(bucket.insert(1, RID::new(1, 0), &cmp));
        assert!(bucket.insert(2, RID::new(2, 0), &cmp));
        assert_eq!(bucket.lookup(&1, &cmp), Some(&RID::new(1, 0)));
        assert_eq!(bucket.lookup(&3, &cmp), None);

        assert!(bucket.remove(&1, &cmp));
        assert!(!bucket.remove(&1, &cmp));
        assert_eq!(bucket.lookup(&1, &cmp), None);
        assert_eq!(bucket.size(), 1);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let cmp = IntComparator::new();
        let mut bucket = TestBucket::new(4);
        assert!(bucket.insert(1, RID::new(1, 0), &cmp));
        assert!(!bucket.insert(1, RID::new(9, 9), &cmp));
        assert_eq!(bucket.lookup(&1, &cmp), Some(&RID::new(1, 0)));
    }

    #[test]
    fn full_bucket_rejects_insert() {
        let cmp = IntComparator::new();
        let mut bucket = TestBucket::new(2);
        assert!(bucket.insert(1, RID::new(1, 0), &cmp));
        assert!(bucket.insert(2, RID::new(2, 0), &cmp));
        assert!(bucket.is_full());
        assert!(!bucket.insert(3, RID::new(3, 0), &cmp));
    }

    #[test]
    fn save_load_round_trip() {
        let cmp = IntComparator::new();
        let mut bucket = TestBucket::new(8);
        for i in 0..5 {
            assert!(bucket.insert(i, RID::new(i, i as u32), &cmp));
        }

        let mut data: PageData = [0; DB_PAGE_SIZE];
        bucket.save(&mut data);
        let reloaded = TestBucket::load(&data);

        assert_eq!(reloaded.size(), 5);
        assert_eq!(reloaded.max_size(), 8);
        for i in 0..5 {
            assert_eq!(reloaded.lookup(&i, &cmp), Some(&RID::new(i, i as u32)));
        }
    }

    #[test]
    fn capacity_is_derived_from_pair_width() {
        // i32 key + RID value = 12 bytes per pair.
        assert_eq!(
            htable_bucket_array_size(12),
            (DB_PAGE_SIZE - HTABLE_BUCKET_PAGE_METADATA_SIZE) / 12
        );
    }
}
