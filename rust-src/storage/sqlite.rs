//! SQLite backend for daily counters.

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, TransactionBehavior};

use super::{BackendKind, ReadStatements, StorageBackend, StorageError, Transaction};
use crate::models::{Amount, DailyCounter, DateKey, IncrementEvent};


const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS counters (
  date TEXT PRIMARY KEY,
  count INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS increments (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  date TEXT NOT NULL,
  hour INTEGER NOT NULL,
  iso TEXT NOT NULL,
  amount INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_increments_date ON increments(date);
"#;


/// Counters stored in a SQLite database.
///
/// Writes go through one connection held behind a mutex, so transactions
/// never interleave. File databases serve reads from short-lived read-only
/// connections that see the last committed state.
pub struct SqliteBackend {
    conn: Mutex<Option<Connection>>,
    path: Option<PathBuf>,
}


impl SqliteBackend {
    /// Open (creating if needed) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = open_write_conn(path)?;
        conn.execute_batch(SCHEMA)?;
        log::debug!("opened sqlite database {}", path.display());

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// A private database that disappears when the backend is closed.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path: None,
        })
    }
}


impl StorageBackend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn run_transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn Transaction) -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or(StorageError::Closed)?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        work(&mut SqliteStatements { conn: &tx })?;
        tx.commit()?;
        Ok(())
    }

    fn run_read(
        &self,
        work: &mut dyn FnMut(&dyn ReadStatements) -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        match &self.path {
            Some(path) => {
                if self.conn.lock().is_none() {
                    return Err(StorageError::Closed);
                }
                let conn = open_read_conn(path)?;
                work(&SqliteStatements { conn: &conn })
            }
            None => {
                let guard = self.conn.lock();
                let conn = guard.as_ref().ok_or(StorageError::Closed)?;
                work(&SqliteStatements { conn })
            }
        }
    }

    fn close(&self) -> Result<(), StorageError> {
        let Some(conn) = self.conn.lock().take() else {
            return Ok(());
        };
        conn.close().map_err(|(_, e)| StorageError::Sqlite(e))?;
        log::debug!("closed sqlite backend");
        Ok(())
    }
}


fn open_write_conn(path: &Path) -> Result<Connection, StorageError> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(conn)
}


fn open_read_conn(path: &Path) -> Result<Connection, StorageError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}


/// Statements bound to one connection or open transaction.
struct SqliteStatements<'c> {
    conn: &'c Connection,
}


impl ReadStatements for SqliteStatements<'_> {
    fn select_by_date(&self, date: DateKey) -> Result<Option<DailyCounter>, StorageError> {
        let count: Option<i64> = self
            .conn
            .query_row(
                "SELECT count FROM counters WHERE date = ?1 LIMIT 1",
                params![date],
                |row| row.get(0),
            )
            .optional()?;

        match count {
            Some(count) => Ok(Some(DailyCounter { date, count: to_u64(count)? })),
            None => Ok(None),
        }
    }

    fn select_all_ordered(&self) -> Result<Vec<DailyCounter>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT date, count FROM counters ORDER BY date ASC")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, DateKey>(0)?, row.get::<_, i64>(1)?)))?;

        let mut counters = Vec::new();
        for row in rows {
            let (date, count) = row?;
            counters.push(DailyCounter { date, count: to_u64(count)? });
        }
        Ok(counters)
    }

    fn select_hour_sums(&self, date: DateKey) -> Result<Vec<(u8, u64)>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT hour, SUM(amount) FROM increments WHERE date = ?1 GROUP BY hour ORDER BY hour ASC",
        )?;
        let rows = stmt.query_map(params![date], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut sums = Vec::new();
        for row in rows {
            let (hour, sum) = row?;
            sums.push((to_hour(hour)?, to_u64(sum)?));
        }
        Ok(sums)
    }

    fn select_increments(&self, date: DateKey) -> Result<Vec<IncrementEvent>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, hour, iso, amount FROM increments WHERE date = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![date], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, DateKey>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, date, hour, timestamp, amount) = row?;
            events.push(IncrementEvent {
                id,
                date,
                hour: to_hour(hour)?,
                timestamp,
                amount: to_u64(amount)?,
            });
        }
        Ok(events)
    }
}


impl Transaction for SqliteStatements<'_> {
    fn ensure_schema(&mut self) -> Result<(), StorageError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn ensure_row(&mut self, date: DateKey) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO counters (date, count) VALUES (?1, 0)",
            params![date],
        )?;
        Ok(())
    }

    fn add_to_count(&mut self, date: DateKey, amount: Amount) -> Result<usize, StorageError> {
        // Refuse to leave the i64 range; SQLite would silently switch to REAL.
        let changed = self.conn.execute(
            "UPDATE counters SET count = count + ?1 WHERE date = ?2 AND count <= ?3",
            params![amount.as_i64(), date, i64::MAX - amount.as_i64()],
        )?;
        if changed == 0 && self.select_by_date(date)?.is_some() {
            return Err(StorageError::Overflow { date });
        }
        Ok(changed)
    }

    fn insert_count(&mut self, date: DateKey, count: u64) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO counters (date, count) VALUES (?1, ?2)",
            params![date, to_i64(count)?],
        )?;
        Ok(())
    }

    fn set_count(&mut self, date: DateKey, count: u64) -> Result<usize, StorageError> {
        let changed = self.conn.execute(
            "UPDATE counters SET count = ?1 WHERE date = ?2",
            params![to_i64(count)?, date],
        )?;
        Ok(changed)
    }

    fn append_increment(
        &mut self,
        date: DateKey,
        hour: u8,
        timestamp: &str,
        amount: Amount,
    ) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO increments (date, hour, iso, amount) VALUES (?1, ?2, ?3, ?4)",
            params![date, hour, timestamp, amount.as_i64()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}


impl ToSql for DateKey {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}


impl FromSql for DateKey {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}


fn to_u64(value: i64) -> Result<u64, StorageError> {
    u64::try_from(value).map_err(|_| StorageError::InvalidValue(format!("negative count {value}")))
}


fn to_i64(value: u64) -> Result<i64, StorageError> {
    i64::try_from(value).map_err(|_| StorageError::InvalidValue(format!("count {value} out of range")))
}


fn to_hour(value: i64) -> Result<u8, StorageError> {
    u8::try_from(value)
        .ok()
        .filter(|hour| *hour < 24)
        .ok_or_else(|| StorageError::InvalidValue(format!("hour {value} out of range")))
}
