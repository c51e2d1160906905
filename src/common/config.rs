pub const DB_PAGE_SIZE: usize = 4096; // size of a data page in bytes
pub const BUFFER_POOL_SIZE: usize = 10; // default size of the buffer pool
pub const LRUK_REPLACER_K: usize = 10; // lookback window for the lru-k replacer
pub const BUCKET_SIZE: usize = 50; // default size of an extendible hash bucket

pub type PageId = i32; // page id type
pub type FrameId = usize; // frame id type

/// Raw content of a single page.
pub type PageData = [u8; DB_PAGE_SIZE];

pub const INVALID_PAGE_ID: PageId = -1; // invalid page id
