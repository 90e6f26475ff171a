use thiserror::Error;

/// Unified error type for the engine.
///
/// `InvalidInput` is always raised before any work begins; `CorruptFrame`
/// during frame parsing, before any segment is decoded; `Backend` when an
/// individual segment fails its checksum or backend decode.  No error is
/// retried internally.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("corrupt frame: {0}")]
    CorruptFrame(String),

    #[error("backend error: {0}")]
    Backend(String),

    /// Worker pool construction failed.  Reported rather than silently
    /// degraded to single-threaded execution.
    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, Error>;
