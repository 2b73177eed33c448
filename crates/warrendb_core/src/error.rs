//! Error types for WarrenDB core.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in WarrenDB store operations.
///
/// Every error is a kind (the variant) plus a message; there are no
/// numeric codes in the public contract. When a write transaction fails,
/// every command pending in it receives the same error, which is why the
/// enum is `Clone`.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The environment could not be opened.
    #[error("failed to open environment: {message}")]
    Open {
        /// Description of the failure.
        message: String,
    },

    /// The handle was used after `close`.
    #[error("database is closed")]
    Closed,

    /// A key exceeds the engine's key-size limit.
    #[error("key of {size} bytes exceeds the engine limit of {max}")]
    KeyTooLarge {
        /// Size of the rejected key in bytes.
        size: usize,
        /// Maximum key size the engine accepts.
        max: usize,
    },

    /// A value exceeds the engine's value-size limit.
    #[error("value of {size} bytes exceeds the engine limit")]
    ValueTooLarge {
        /// Size of the rejected value in bytes.
        size: usize,
    },

    /// The memory map is full.
    ///
    /// The transaction that hit the limit was aborted; the environment
    /// itself stays usable. Reopen with a larger `map_size` to make room.
    #[error("environment map is full")]
    MapFull,

    /// A write transaction was started while one is already open.
    #[error("a write transaction is already open")]
    TransactionAlreadyOpen,

    /// A write transaction was committed, aborted, or written through
    /// while none is open.
    #[error("no write transaction is open")]
    NoTransaction,

    /// The write worker thread terminated unexpectedly.
    #[error("write worker terminated unexpectedly")]
    WorkerDead,

    /// Any other engine failure, wrapped.
    #[error("engine error: {message}")]
    Engine {
        /// Message reported by the engine.
        message: String,
    },
}

impl StoreError {
    /// Creates an open error.
    pub fn open(message: impl Into<String>) -> Self {
        Self::Open {
            message: message.into(),
        }
    }

    /// Creates a wrapped engine error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Error reported to writes whose enclosing transaction was aborted
    /// before it committed.
    pub(crate) fn aborted() -> Self {
        Self::engine("write transaction aborted before commit")
    }
}

impl From<heed::Error> for StoreError {
    fn from(err: heed::Error) -> Self {
        match err {
            heed::Error::Mdb(heed::MdbError::MapFull) => Self::MapFull,
            other => Self::engine(other.to_string()),
        }
    }
}
