use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Result as IoResult;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};

use log::{error, warn};
use parking_lot::Mutex;

use crate::common::config::{PageData, PageId, DB_PAGE_SIZE};

/// The `DiskIO` trait defines the basic operations for interacting with disk
/// storage. Implementers of this trait must provide methods to write and read
/// pages. Reads past the end of the backing store fill the buffer with zeroes.
pub trait DiskIO: Send + Sync {
    fn write_page(&self, page_id: PageId, page_data: &PageData) -> IoResult<()>;
    fn read_page(&self, page_id: PageId, page_data: &mut PageData) -> IoResult<()>;

    /// Number of pages already persisted in the backing store. The buffer pool
    /// seeds its page id allocator from this so that a reopened database does
    /// not hand out ids that collide with persisted pages.
    fn num_pages(&self) -> PageId;
}

/// The `FileDiskManager` is responsible for managing disk I/O operations,
/// including reading and writing pages and managing the write-ahead log file.
pub struct FileDiskManager {
    file_name: String,
    log_name: String,
    db_io: Mutex<File>,
    log_io: Mutex<File>,
    num_flushes: AtomicI32,
    num_writes: AtomicI32,
}

impl FileDiskManager {
    /// Opens (creating if necessary) the database file and its log file.
    pub fn new(db_file: impl AsRef<Path>, log_file: impl AsRef<Path>) -> IoResult<Self> {
        let db_io = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(db_file.as_ref())?;
        let log_io = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(log_file.as_ref())?;

        Ok(Self {
            file_name: db_file.as_ref().display().to_string(),
            log_name: log_file.as_ref().display().to_string(),
            db_io: Mutex::new(db_io),
            log_io: Mutex::new(log_io),
            num_flushes: AtomicI32::new(0),
            num_writes: AtomicI32::new(0),
        })
    }

    /// Flushes both files to stable storage.
    pub fn shut_down(&self) -> IoResult<()> {
        self.db_io.lock().sync_all()?;
        self.log_io.lock().sync_all()?;
        Ok(())
    }

    /// Appends log data to the log file and flushes it to disk.
    pub fn write_log(&self, log_data: &[u8]) -> IoResult<()> {
        let mut log_io = self.log_io.lock();
        log_io.seek(SeekFrom::End(0))?;
        log_io.write_all(log_data)?;
        log_io.sync_data()?;
        self.num_flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Reads log data from the log file at a specified offset. Returns `false`
    /// when the offset is past the end of the log.
    pub fn read_log(&self, log_data: &mut [u8], offset: u64) -> IoResult<bool> {
        let mut log_io = self.log_io.lock();
        if offset >= log_io.metadata()?.len() {
            return Ok(false);
        }
        log_io.seek(SeekFrom::Start(offset))?;
        let bytes_read = read_full(&mut *log_io, log_data)?;
        if bytes_read < log_data.len() {
            log_data[bytes_read..].fill(0);
            warn!(
                "log read at offset {} reached EOF, zero-filled {} trailing bytes",
                offset,
                log_data.len() - bytes_read
            );
        }
        Ok(true)
    }

    /// Retrieves the number of log flushes performed so far.
    pub fn get_num_flushes(&self) -> i32 {
        self.num_flushes.load(Ordering::SeqCst)
    }

    /// Retrieves the number of page writes performed so far.
    pub fn get_num_writes(&self) -> i32 {
        self.num_writes.load(Ordering::SeqCst)
    }

    pub fn get_file_name(&self) -> &str {
        &self.file_name
    }

    pub fn get_log_name(&self) -> &str {
        &self.log_name
    }
}

impl DiskIO for FileDiskManager {
    fn write_page(&self, page_id: PageId, page_data: &PageData) -> IoResult<()> {
        assert!(page_id >= 0, "cannot write invalid page id {}", page_id);
        let offset = page_id as u64 * DB_PAGE_SIZE as u64;
        let mut db_io = self.db_io.lock();
        db_io.seek(SeekFrom::Start(offset))?;
        db_io.write_all(page_data)?;
        db_io.flush()?;
        self.num_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_page(&self, page_id: PageId, page_data: &mut PageData) -> IoResult<()> {
        assert!(page_id >= 0, "cannot read invalid page id {}", page_id);
        let offset = page_id as u64 * DB_PAGE_SIZE as u64;
        let mut db_io = self.db_io.lock();
        let file_len = db_io.metadata()?.len();
        if offset >= file_len {
            warn!(
                "read of page {} is past the end of {}, returning zeroed page",
                page_id, self.file_name
            );
            page_data.fill(0);
            return Ok(());
        }
        db_io.seek(SeekFrom::Start(offset))?;
        let bytes_read = read_full(&mut *db_io, page_data)?;
        if bytes_read < DB_PAGE_SIZE {
            page_data[bytes_read..].fill(0);
        }
        Ok(())
    }

    fn num_pages(&self) -> PageId {
        match self.db_io.lock().metadata() {
            Ok(meta) => meta.len().div_ceil(DB_PAGE_SIZE as u64) as PageId,
            Err(e) => {
                error!("failed to stat {}: {}", self.file_name, e);
                0
            }
        }
    }
}

/// In-memory disk manager used by tests that do not care about durability.
#[derive(Default)]
pub struct MemoryDiskManager {
    pages: Mutex<HashMap<PageId, Box<PageData>>>,
}

impl MemoryDiskManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiskIO for MemoryDiskManager {
    fn write_page(&self, page_id: PageId, page_data: &PageData) -> IoResult<()> {
        assert!(page_id >= 0, "cannot write invalid page id {}", page_id);
        self.pages.lock().insert(page_id, Box::new(*page_data));
        Ok(())
    }

    fn read_page(&self, page_id: PageId, page_data: &mut PageData) -> IoResult<()> {
        assert!(page_id >= 0, "cannot read invalid page id {}", page_id);
        match self.pages.lock().get(&page_id) {
            Some(stored) => page_data.copy_from_slice(&stored[..]),
            None => page_data.fill(0),
        }
        Ok(())
    }

    fn num_pages(&self) -> PageId {
        self.pages
            .lock()
            .keys()
            .max()
            .map(|max| max + 1)
            .unwrap_or(0)
    }
}

/// Reads until `buf` is full or EOF is reached, returning the bytes read.
fn read_full(file: &mut File, buf: &mut [u8]) -> IoResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read_page() {
        let dir = TempDir::new().unwrap();
        let dm = FileDiskManager::new(dir.path().join("test.db"), dir.path().join("test.log"))
            .unwrap();

        let mut data: PageData = [0; DB_PAGE_SIZE];
        data[..5].copy_from_slice(b"hello");
        dm.write_page(3, &data).unwrap();

        let mut buf: PageData = [0xAA; DB_PAGE_SIZE];
        dm.read_page(3, &mut buf).unwrap();
        assert_eq!(&buf[..], &data[..]);
        assert_eq!(dm.num_pages(), 4);
    }

    #[test]
    fn test_read_past_eof_zero_fills() {
        let dir = TempDir::new().unwrap();
        let dm = FileDiskManager::new(dir.path().join("test.db"), dir.path().join("test.log"))
            .unwrap();

        let mut buf: PageData = [0xFF; DB_PAGE_SIZE];
        dm.read_page(17, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_log_round_trip() {
        let dir = TempDir::new().unwrap();
        let dm = FileDiskManager::new(dir.path().join("test.db"), dir.path().join("test.log"))
            .unwrap();

        dm.write_log(b"first record").unwrap();
        let mut buf = [0u8; 12];
        assert!(dm.read_log(&mut buf, 0).unwrap());
        assert_eq!(&buf, b"first record");
        assert!(!dm.read_log(&mut buf, 1024).unwrap());
        assert_eq!(dm.get_num_flushes(), 1);
    }

    #[test]
    fn test_memory_disk_manager() {
        let dm = MemoryDiskManager::new();
        let mut data: PageData = [0; DB_PAGE_SIZE];
        data[0] = 42;
        dm.write_page(0, &data).unwrap();

        let mut buf: PageData = [0; DB_PAGE_SIZE];
        dm.read_page(0, &mut buf).unwrap();
        assert_eq!(buf[0], 42);

        dm.read_page(9, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }
}
