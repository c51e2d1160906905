use std::io::Result as IoResult;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::storage::disk::disk_manager::FileDiskManager;

/// Append-only log buffer flushed through the disk manager's log file. The
/// buffer pool holds an optional handle to one of these as an extension point;
/// nothing in the storage core depends on it.
pub struct LogManager {
    disk_manager: Arc<FileDiskManager>,
    log_buffer: Mutex<Vec<u8>>,
}

impl LogManager {
    pub fn new(disk_manager: Arc<FileDiskManager>) -> Self {
        Self {
            disk_manager,
            log_buffer: Mutex::new(Vec::new()),
        }
    }

    /// Buffers a log record for the next flush.
    pub fn append_record(&self, record: &[u8]) {
        let mut buffer = self.log_buffer.lock();
        buffer.extend_from_slice(&(record.len() as u32).to_ne_bytes());
        buffer.extend_from_slice(record);
    }

    /// Writes the buffered records to the log file and clears the buffer.
    pub fn flush(&self) -> IoResult<()> {
        let mut buffer = self.log_buffer.lock();
        if buffer.is_empty() {
            return Ok(());
        }
        self.disk_manager.write_log(&buffer)?;
        debug!("flushed {} bytes of log records", buffer.len());
        buffer.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn append_and_flush() {
        let dir = TempDir::new().unwrap();
        let dm = Arc::new(
            FileDiskManager::new(dir.path().join("test.db"), dir.path().join("test.log"))
                .unwrap(),
        );
        let log_manager = LogManager::new(Arc::clone(&dm));

        log_manager.append_record(b"begin");
        log_manager.append_record(b"commit");
        log_manager.flush().unwrap();

        let mut buf = [0u8; 4];
        assert!(dm.read_log(&mut buf, 0).unwrap());
        assert_eq!(u32::from_ne_bytes(buf), 5);
    }

    #[test]
    fn flush_of_empty_buffer_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let dm = Arc::new(
            FileDiskManager::new(dir.path().join("test.db"), dir.path().join("test.log"))
                .unwrap(),
        );
        let log_manager = LogManager::new(Arc::clone(&dm));
        log_manager.flush().unwrap();
        assert_eq!(dm.get_num_flushes(), 0);
    }
}
