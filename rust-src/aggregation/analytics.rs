//! Read-only projections over counters and the increment log.

use std::sync::Arc;

use crate::clock::Clock;
use crate::counter::increment_log;
use crate::models::{DateKey, DayTotal, HourBucket, IncrementEvent, HOURS_PER_DAY};
use crate::storage::{ReadStatements, StorageBackend, StorageError, StorageExt};


/// Daily and hourly views. Never writes.
#[derive(Clone)]
pub struct Analytics {
    backend: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
}


impl Analytics {
    pub fn new(backend: Arc<dyn StorageBackend>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Every known day, oldest first.
    pub fn daily_totals(&self) -> Result<Vec<DayTotal>, StorageError> {
        self.backend.read(|reads| reads.select_all_ordered())
    }

    /// The most recent `days` entries of [`Analytics::daily_totals`].
    pub fn last_days(&self, days: usize) -> Result<Vec<DayTotal>, StorageError> {
        let mut totals = self.daily_totals()?;
        let skip = totals.len().saturating_sub(days);
        totals.drain(..skip);
        Ok(totals)
    }

    /// Increment amounts of `date` summed per hour, 24 buckets.
    ///
    /// Built from the increment log only, so resets do not show up here.
    pub fn hourly_trend(&self, date: DateKey) -> Result<Vec<HourBucket>, StorageError> {
        let sums = self.backend.read(|reads| increment_log::hour_sums(reads, date))?;
        Ok(to_buckets(&sums))
    }

    /// Trend of the current day, together with the day it was read for.
    pub fn hourly_trend_today(&self) -> Result<(DateKey, Vec<HourBucket>), StorageError> {
        let today = self.clock.today();
        Ok((today, self.hourly_trend(today)?))
    }

    pub fn events_for(&self, date: DateKey) -> Result<Vec<IncrementEvent>, StorageError> {
        self.backend.read(|reads: &dyn ReadStatements| increment_log::events_for(reads, date))
    }
}


fn to_buckets(sums: &[u64; HOURS_PER_DAY]) -> Vec<HourBucket> {
    sums.iter()
        .enumerate()
        .map(|(hour, count)| HourBucket {
            hour: hour as u8,
            count: *count,
        })
        .collect()
}
