//! Errors raised by storage backends.

use thiserror::Error;

use crate::models::DateKey;


/// Any failure while running a transaction or a read.
///
/// A transaction that returns one of these has not changed stored state.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("stored document under key {key:?} is corrupt: {reason}")]
    CorruptDocument { key: String, reason: String },

    #[error("count for {date} would overflow")]
    Overflow { date: DateKey },

    #[error("invalid stored value: {0}")]
    InvalidValue(String),

    #[error("write to key {key:?} failed: {reason}")]
    WriteFailed { key: String, reason: String },

    #[error("storage backend is closed")]
    Closed,
}
