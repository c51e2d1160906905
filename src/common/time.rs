use std::time::{SystemTime, UNIX_EPOCH};

/// Source of monotonically non-decreasing timestamps, injectable so that
/// eviction decisions can be replayed deterministically in tests.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall-clock time source with microsecond resolution.
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_micros() as u64
    }
}
