//! Storage layer for daily counters and the increment log.
//!
//! Every backend exposes the same transaction contract over two logical
//! tables, `counters` and `increments`. Two implementations exist: a SQLite
//! database and a single JSON document kept in a key-value store.

mod document;
mod error;
mod kv;
mod sqlite;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::{DOCUMENT_STORAGE_KEY, SQLITE_FILE_NAME};
use crate::models::{Amount, DailyCounter, DateKey, IncrementEvent};

#[allow(unused_imports)]
pub use document::{Document, DocumentBackend};
pub use error::StorageError;
pub use kv::{FileKeyValueStore, KeyValueStore};
#[cfg(test)]
pub use kv::MemoryKeyValueStore;
pub use sqlite::SqliteBackend;


/// Which physical representation backs the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Relational SQLite database.
    Sqlite,
    /// One JSON document under a single storage key.
    Document,
}


impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Sqlite => write!(f, "sqlite"),
            BackendKind::Document => write!(f, "document"),
        }
    }
}


/// Queries available inside reads and transactions.
pub trait ReadStatements {
    fn select_by_date(&self, date: DateKey) -> Result<Option<DailyCounter>, StorageError>;

    /// All rows, ascending by date.
    fn select_all_ordered(&self) -> Result<Vec<DailyCounter>, StorageError>;

    /// `(hour, sum of amounts)` for hours with at least one event, ascending.
    fn select_hour_sums(&self, date: DateKey) -> Result<Vec<(u8, u64)>, StorageError>;

    /// Events of one day in insertion order.
    fn select_increments(&self, date: DateKey) -> Result<Vec<IncrementEvent>, StorageError>;
}


/// Mutations available inside a transaction.
pub trait Transaction: ReadStatements {
    fn ensure_schema(&mut self) -> Result<(), StorageError>;

    /// Insert `(date, 0)` unless a row for `date` exists.
    fn ensure_row(&mut self, date: DateKey) -> Result<(), StorageError>;

    /// Add to an existing row. Returns the number of rows changed, 0 if missing.
    fn add_to_count(&mut self, date: DateKey, amount: Amount) -> Result<usize, StorageError>;

    fn insert_count(&mut self, date: DateKey, count: u64) -> Result<(), StorageError>;

    /// Overwrite an existing row. Returns the number of rows changed.
    fn set_count(&mut self, date: DateKey, count: u64) -> Result<usize, StorageError>;

    /// Append to the increment log, returning the new event id.
    fn append_increment(
        &mut self,
        date: DateKey,
        hour: u8,
        timestamp: &str,
        amount: Amount,
    ) -> Result<i64, StorageError>;
}


/// Transactional access to persisted counters.
///
/// Transactions are serialized: statements of two calls never interleave,
/// and a failing body leaves stored state exactly as it was.
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn run_transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn Transaction) -> Result<(), StorageError>,
    ) -> Result<(), StorageError>;

    /// Run queries against a fully committed state without waiting on writers.
    fn run_read(
        &self,
        work: &mut dyn FnMut(&dyn ReadStatements) -> Result<(), StorageError>,
    ) -> Result<(), StorageError>;

    /// Release the underlying resources. Later calls fail with `Closed`.
    fn close(&self) -> Result<(), StorageError>;
}


/// Value-returning wrappers around the object-safe backend calls.
pub trait StorageExt {
    fn transact<T>(
        &self,
        work: impl FnOnce(&mut dyn Transaction) -> Result<T, StorageError>,
    ) -> Result<T, StorageError>;

    fn read<T>(
        &self,
        work: impl FnOnce(&dyn ReadStatements) -> Result<T, StorageError>,
    ) -> Result<T, StorageError>;
}


impl<B: StorageBackend + ?Sized> StorageExt for B {
    fn transact<T>(
        &self,
        work: impl FnOnce(&mut dyn Transaction) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut work = Some(work);
        let mut output = None;
        self.run_transaction(&mut |tx| {
            let work = work.take().ok_or_else(reentered)?;
            output = Some(work(tx)?);
            Ok(())
        })?;
        output.ok_or_else(reentered)
    }

    fn read<T>(
        &self,
        work: impl FnOnce(&dyn ReadStatements) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut work = Some(work);
        let mut output = None;
        self.run_read(&mut |reads| {
            let work = work.take().ok_or_else(reentered)?;
            output = Some(work(reads)?);
            Ok(())
        })?;
        output.ok_or_else(reentered)
    }
}


fn reentered() -> StorageError {
    StorageError::InvalidValue("backend ran a unit of work other than exactly once".to_string())
}


/// Open the backend of the given kind inside `data_dir`.
pub fn open(kind: BackendKind, data_dir: &Path) -> Result<Arc<dyn StorageBackend>, StorageError> {
    let backend: Arc<dyn StorageBackend> = match kind {
        BackendKind::Sqlite => Arc::new(SqliteBackend::open(&data_dir.join(SQLITE_FILE_NAME))?),
        BackendKind::Document => Arc::new(DocumentBackend::open(
            Box::new(FileKeyValueStore::new(data_dir)),
            DOCUMENT_STORAGE_KEY,
        )?),
    };
    log::debug!("opened {} backend in {}", kind, data_dir.display());
    Ok(backend)
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_files_per_kind() {
        let tmp_dir = TempDir::new().unwrap();

        let sqlite = open(BackendKind::Sqlite, tmp_dir.path()).unwrap();
        assert_eq!(sqlite.kind(), BackendKind::Sqlite);
        assert!(tmp_dir.path().join(SQLITE_FILE_NAME).exists());
        sqlite.close().unwrap();

        let document = open(BackendKind::Document, tmp_dir.path()).unwrap();
        assert_eq!(document.kind(), BackendKind::Document);
        let date: DateKey = "2025-01-01".parse().unwrap();
        document.transact(|tx| tx.ensure_row(date)).unwrap();
        assert!(tmp_dir.path().join(format!("{DOCUMENT_STORAGE_KEY}.json")).exists());
    }

    #[test]
    fn test_transact_returns_body_value() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let date: DateKey = "2025-01-01".parse().unwrap();
        let row = backend
            .transact(|tx| {
                tx.ensure_row(date)?;
                tx.select_by_date(date)
            })
            .unwrap();
        assert_eq!(row, Some(DailyCounter::zero(date)));
    }
}
