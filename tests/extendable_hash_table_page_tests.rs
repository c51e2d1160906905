use std::sync::Arc;

use hematite::buffer::buffer_pool_manager::BufferPoolManager;
use hematite::common::config::INVALID_PAGE_ID;
use hematite::common::logger::initialize_logger;
use hematite::common::rid::RID;
use hematite::storage::disk::disk_manager::{DiskIO, MemoryDiskManager};
use hematite::storage::index::comparator::IntComparator;
use hematite::storage::page::page_types::extendable_hash_table_bucket_page::ExtendableHTableBucketPage;
use hematite::storage::page::page_types::extendable_hash_table_directory_page::ExtendableHTableDirectoryPage;
use hematite::storage::page::page_types::extendable_hash_table_header_page::ExtendableHTableHeaderPage;

fn make_bpm() -> Arc<BufferPoolManager> {
    initialize_logger();
    let disk_manager = Arc::new(MemoryDiskManager::new());
    Arc::new(BufferPoolManager::new(
        8,
        disk_manager as Arc<dyn DiskIO>,
        2,
        None,
    ))
}

#[test]
fn header_page_survives_guarded_write_and_refetch() {
    let bpm = make_bpm();

    let page_id = {
        let mut guard = bpm.new_page_guarded().unwrap().upgrade_write();
        let mut header = ExtendableHTableHeaderPage::new(2);
        header.set_directory_page_id(1, 33);
        header.save(guard.data_mut());
        guard.page_id()
    };

    let guard = bpm.fetch_page_read(page_id).unwrap();
    let header = ExtendableHTableHeaderPage::load(guard.data());
    assert_eq!(header.max_depth(), 2);
    assert_eq!(header.get_directory_page_id(1), 33);
    assert_eq!(header.get_directory_page_id(0), INVALID_PAGE_ID);
}

#[test]
fn directory_page_grow_and_shrink_through_guard() {
    let bpm = make_bpm();

    let page_id = {
        let mut guard = bpm.new_page_guarded().unwrap().upgrade_write();
        let mut directory = ExtendableHTableDirectoryPage::new(3);
        directory.set_bucket_page_id(0, 5);
        directory.incr_global_depth();
        directory.incr_global_depth();
        directory.save(guard.data_mut());
        guard.page_id()
    };

    {
        let mut guard = bpm.fetch_page_write(page_id).unwrap();
        let mut directory = ExtendableHTableDirectoryPage::load(guard.data());
        assert_eq!(directory.get_global_depth(), 2);
        assert_eq!(directory.get_bucket_page_id(3), 5);
        directory.verify_integrity();

        assert!(directory.can_shrink());
        directory.decr_global_depth();
        directory.save(guard.data_mut());
    }

    let guard = bpm.fetch_page_read(page_id).unwrap();
    let directory = ExtendableHTableDirectoryPage::load(guard.data());
    assert_eq!(directory.get_global_depth(), 1);
}

#[test]
fn bucket_page_contents_survive_eviction() {
    let bpm = make_bpm();
    let cmp = IntComparator::new();

    let page_id = {
        let mut guard = bpm.new_page_guarded().unwrap().upgrade_write();
        let mut bucket = ExtendableHTableBucketPage::<i32, RID, IntComparator>::new(10);
        for i in 0..10 {
            assert!(bucket.insert(i, RID::new(i, 0), &cmp));
        }
        assert!(bucket.is_full());
        bucket.save(guard.data_mut());
        guard.page_id()
    };

    // Push the bucket page out of the pool.
    for _ in 0..8 {
        bpm.new_page_guarded().unwrap();
    }

    let guard = bpm.fetch_page_read(page_id).unwrap();
    let bucket = ExtendableHTableBucketPage::<i32, RID, IntComparator>::load(guard.data());
    assert_eq!(bucket.size(), 10);
    for i in 0..10 {
        assert_eq!(bucket.lookup(&i, &cmp), Some(&RID::new(i, 0)));
    }
}
