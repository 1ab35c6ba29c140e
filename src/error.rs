/// Engine-level errors
/// These represent failures in the log's core operations.
#[derive(thiserror::Error, Debug)]
pub enum LogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested offset is not covered by any segment. Recoverable:
    /// a tailing consumer treats this as "caught up, retry later".
    #[error("offset out of range: {0}")]
    OffsetOutOfRange(u64),

    /// The index's mapped capacity cannot hold one more entry. Consumed by
    /// the log to trigger rotation; never surfaces past the log boundary.
    #[error("index full")]
    IndexFull,

    /// No entry at the requested index position (empty or short index).
    #[error("end of index")]
    EndOfIndex,

    #[error("encode error: {0}")]
    EncodeError(String),

    #[error("decode error: {0}")]
    DecodeError(String),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("lock poisoned")]
    LockPoisoned,
}
