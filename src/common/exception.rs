use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPoolError {
    #[error("no free frame is available and no frame can be evicted")]
    OutOfFrames,
}
