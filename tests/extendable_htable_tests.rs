use std::sync::Arc;

use hematite::buffer::buffer_pool_manager::BufferPoolManager;
use hematite::common::config::INVALID_PAGE_ID;
use hematite::common::logger::initialize_logger;
use hematite::common::rid::RID;
use hematite::container::disk_extendable_hash_table::DiskExtendableHashTable;
use hematite::container::hash_function::{HashFunction, KeyHasher};
use hematite::storage::disk::disk_manager::{DiskIO, MemoryDiskManager};
use hematite::storage::index::comparator::IntComparator;
use hematite::storage::page::page_types::extendable_hash_table_directory_page::ExtendableHTableDirectoryPage;
use hematite::storage::page::page_types::extendable_hash_table_header_page::ExtendableHTableHeaderPage;

/// Hashes a key to itself, making bucket routing bit patterns explicit.
#[derive(Clone, Copy)]
struct IdentityHash;

impl KeyHasher<i32> for IdentityHash {
    fn get_hash(&self, key: &i32) -> u64 {
        *key as u32 as u64
    }
}

fn make_bpm(pool_size: usize) -> Arc<BufferPoolManager> {
    initialize_logger();
    let disk_manager = Arc::new(MemoryDiskManager::new());
    Arc::new(BufferPoolManager::new(
        pool_size,
        disk_manager as Arc<dyn DiskIO>,
        2,
        None,
    ))
}

/// Reads back the single directory of a table routed entirely through header
/// slot 0 (header_max_depth 0).
fn load_directory(
    bpm: &Arc<BufferPoolManager>,
    ht: &DiskExtendableHashTable<i32, RID, IntComparator, IdentityHash>,
) -> ExtendableHTableDirectoryPage {
    let header_guard = bpm.fetch_page_read(ht.header_page_id()).unwrap();
    let header = ExtendableHTableHeaderPage::load(header_guard.data());
    let directory_page_id = header.get_directory_page_id(0);
    assert_ne!(directory_page_id, INVALID_PAGE_ID);
    drop(header_guard);

    let dir_guard = bpm.fetch_page_read(directory_page_id).unwrap();
    ExtendableHTableDirectoryPage::load(dir_guard.data())
}

#[test]
fn split_on_full_bucket() {
    let bpm = make_bpm(32);
    let ht = DiskExtendableHashTable::<i32, RID, IntComparator, IdentityHash>::new(
        "split_test",
        Arc::clone(&bpm),
        IntComparator::new(),
        IdentityHash,
        0,
        9,
        2,
    )
    .unwrap();

    // Keys 0b00 and 0b10 fill the single depth-0 bucket.
    assert!(ht.insert(0b00, RID::new(0, 0)));
    assert!(ht.insert(0b10, RID::new(2, 0)));

    // Key 0b01 forces a split: the directory doubles and the bucket divides
    // on the low bit.
    assert!(ht.insert(0b01, RID::new(1, 0)));
    ht.verify_integrity();

    let directory = load_directory(&bpm, &ht);
    assert!(directory.get_global_depth() >= 1);
    assert_ne!(
        directory.get_bucket_page_id(0),
        directory.get_bucket_page_id(1),
        "the split must produce two distinct buckets"
    );

    for key in [0b00, 0b10, 0b01] {
        assert_eq!(ht.get_value(&key), vec![RID::new(key, 0)]);
    }
}

#[test]
fn merge_on_remove_and_directory_shrink() {
    let bpm = make_bpm(32);
    let ht = DiskExtendableHashTable::<i32, RID, IntComparator, IdentityHash>::new(
        "merge_test",
        Arc::clone(&bpm),
        IntComparator::new(),
        IdentityHash,
        0,
        9,
        2,
    )
    .unwrap();

    assert!(ht.insert(0b00, RID::new(0, 0)));
    assert!(ht.insert(0b10, RID::new(2, 0)));
    assert!(ht.insert(0b01, RID::new(1, 0)));
    assert!(load_directory(&bpm, &ht).get_global_depth() >= 1);

    // Removing the odd key empties its bucket, which merges back with its
    // split image; with every local depth back at zero the directory shrinks.
    assert!(ht.remove(&0b01));
    ht.verify_integrity();

    let directory = load_directory(&bpm, &ht);
    assert_eq!(directory.get_global_depth(), 0);
    assert_eq!(directory.get_local_depth(0), 0);

    for key in [0b00, 0b10] {
        assert_eq!(ht.get_value(&key), vec![RID::new(key, 0)]);
    }
    assert!(ht.get_value(&0b01).is_empty());
}

#[test]
fn insert_fails_when_directory_is_full() {
    let bpm = make_bpm(32);
    let ht = DiskExtendableHashTable::<i32, RID, IntComparator, IdentityHash>::new(
        "directory_full_test",
        Arc::clone(&bpm),
        IntComparator::new(),
        IdentityHash,
        0,
        2,
        1,
    )
    .unwrap();

    // Keys 0..4 occupy all four buckets of a depth-2 directory.
    for key in 0..4 {
        assert!(ht.insert(key, RID::new(key, 0)), "failed to insert {}", key);
    }
    ht.verify_integrity();

    // Key 4 routes to the full bucket of key 0, whose local depth already
    // equals the directory's max depth.
    assert!(!ht.insert(4, RID::new(4, 0)));

    // The failed insert must not have corrupted anything.
    ht.verify_integrity();
    for key in 0..4 {
        assert_eq!(ht.get_value(&key), vec![RID::new(key, 0)]);
    }
}

#[test]
fn recursive_split_handles_skewed_redistribution() {
    let bpm = make_bpm(64);
    let ht = DiskExtendableHashTable::<i32, RID, IntComparator, IdentityHash>::new(
        "recursive_split_test",
        Arc::clone(&bpm),
        IntComparator::new(),
        IdentityHash,
        0,
        9,
        2,
    )
    .unwrap();

    // 0b000 and 0b100 share the low two bits; splitting once on the low bit
    // leaves them together, so inserting 0b1000 must split again.
    assert!(ht.insert(0b0000, RID::new(0, 0)));
    assert!(ht.insert(0b0100, RID::new(4, 0)));
    assert!(ht.insert(0b1000, RID::new(8, 0)));
    ht.verify_integrity();

    for key in [0b0000, 0b0100, 0b1000] {
        assert_eq!(ht.get_value(&key), vec![RID::new(key, 0)]);
    }
}

#[test]
fn xxh3_grow_and_drain_soak() {
    let bpm = make_bpm(128);
    let ht = DiskExtendableHashTable::<i32, RID, IntComparator>::new(
        "soak_test",
        Arc::clone(&bpm),
        IntComparator::new(),
        HashFunction::new(),
        2,
        9,
        8,
    )
    .unwrap();

    for key in 0..500 {
        assert!(ht.insert(key, RID::new(key, 0)), "failed to insert {}", key);
    }
    ht.verify_integrity();

    for key in 0..500 {
        assert_eq!(ht.get_value(&key), vec![RID::new(key, 0)]);
    }
    assert!(ht.get_value(&9999).is_empty());

    for key in (0..500).step_by(2) {
        assert!(ht.remove(&key), "failed to remove {}", key);
    }
    ht.verify_integrity();

    for key in 0..500 {
        if key % 2 == 0 {
            assert!(ht.get_value(&key).is_empty());
        } else {
            assert_eq!(ht.get_value(&key), vec![RID::new(key, 0)]);
        }
    }

    for key in (1..500).step_by(2) {
        assert!(ht.remove(&key));
    }
    ht.verify_integrity();
    for key in 0..500 {
        assert!(ht.get_value(&key).is_empty());
    }
}

#[test]
fn values_round_trip_through_eviction() {
    // A pool this small forces the index's own pages in and out of memory
    // constantly; correctness must not depend on residency.
    let bpm = make_bpm(8);
    let ht = DiskExtendableHashTable::<i32, RID, IntComparator>::new(
        "eviction_round_trip",
        Arc::clone(&bpm),
        IntComparator::new(),
        HashFunction::new(),
        1,
        9,
        8,
    )
    .unwrap();

    for key in 0..100 {
        assert!(ht.insert(key, RID::new(key, key as u32)));
    }
    for key in 0..100 {
        assert_eq!(ht.get_value(&key), vec![RID::new(key, key as u32)]);
    }
}
