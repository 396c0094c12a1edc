//! Today's counter: seeding, increments and resets.

use std::sync::Arc;

use super::{increment_log, CounterError};
use crate::clock::Clock;
use crate::models::{Amount, DailyCounter, DateKey, DayTotal, IntoAmount};
use crate::storage::{StorageBackend, StorageError, StorageExt, Transaction};


/// Owner of the `counters` table.
#[derive(Clone)]
pub struct CounterStore {
    backend: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
}


impl CounterStore {
    pub fn new(backend: Arc<dyn StorageBackend>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Create the tables and seed today's row at zero. Safe on every start.
    pub fn initialize(&self) -> Result<(), CounterError> {
        let today = self.clock.today();
        self.backend.transact(|tx| {
            tx.ensure_schema()?;
            tx.ensure_row(today)
        })?;
        log::debug!("initialized counter store for {today}");
        Ok(())
    }

    /// Add `amount` to today's count and log the increment.
    ///
    /// The amount is validated before any storage access. Returns the total
    /// read back inside the same transaction.
    pub fn increment_today(&self, amount: impl IntoAmount) -> Result<DayTotal, CounterError> {
        let amount = amount.into_amount()?;
        let now = self.clock.now();
        let today = DateKey::of(&now);

        let total = self.backend.transact(|tx| {
            tx.ensure_row(today)?;
            add_or_insert(tx, today, amount)?;
            increment_log::append(tx, &now, amount)?;
            let row = tx.select_by_date(today)?;
            Ok(row.unwrap_or(DailyCounter { date: today, count: amount.get() }))
        })?;
        Ok(total)
    }

    /// Set today's count back to zero. The increment log is left untouched.
    pub fn reset_today(&self) -> Result<DayTotal, CounterError> {
        let today = self.clock.today();
        self.backend.transact(|tx| {
            tx.ensure_row(today)?;
            if tx.set_count(today, 0)? == 0 {
                tx.insert_count(today, 0)?;
            }
            Ok(())
        })?;
        log::info!("reset counter for {today}");
        Ok(DailyCounter::zero(today))
    }

    /// Today's total; a day nobody touched yet reads as zero.
    pub fn today(&self) -> Result<DayTotal, CounterError> {
        let today = self.clock.today();
        let count = self.count_for(today)?.unwrap_or(0);
        Ok(DailyCounter { date: today, count })
    }

    /// Count recorded for `date`, `None` if the day was never touched.
    pub fn count_for(&self, date: DateKey) -> Result<Option<u64>, CounterError> {
        let row = self.backend.read(|reads| reads.select_by_date(date))?;
        Ok(row.map(|row| row.count))
    }
}


fn add_or_insert(tx: &mut dyn Transaction, date: DateKey, amount: Amount) -> Result<(), StorageError> {
    if tx.add_to_count(date, amount)? == 0 {
        // ensure_row ran just before; only a concurrent delete could get here
        log::warn!("counter row for {date} missing after seeding, inserting {amount}");
        tx.insert_count(date, amount.get())?;
    }
    Ok(())
}
