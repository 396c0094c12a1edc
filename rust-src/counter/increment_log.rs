//! Append-only log of increment events.

use chrono::{DateTime, SecondsFormat, TimeZone, Timelike};

use crate::models::{Amount, DateKey, IncrementEvent, HOURS_PER_DAY};
use crate::storage::{ReadStatements, StorageError, Transaction};


/// Record one increment of `amount` made at `at`, as part of `tx`.
pub fn append<Tz: TimeZone>(
    tx: &mut dyn Transaction,
    at: &DateTime<Tz>,
    amount: Amount,
) -> Result<IncrementEvent, StorageError>
where
    Tz::Offset: std::fmt::Display,
{
    let date = DateKey::of(at);
    // hour() is 0..=23 by construction
    let hour = at.hour() as u8;
    let timestamp = at.to_rfc3339_opts(SecondsFormat::Millis, false);

    let id = tx.append_increment(date, hour, &timestamp, amount)?;
    Ok(IncrementEvent {
        id,
        date,
        hour,
        timestamp,
        amount: amount.get(),
    })
}


/// Sum of amounts for each hour of `date`, zero where nothing was logged.
pub fn hour_sums(reads: &dyn ReadStatements, date: DateKey) -> Result<[u64; HOURS_PER_DAY], StorageError> {
    let mut sums = [0u64; HOURS_PER_DAY];
    for (hour, sum) in reads.select_hour_sums(date)? {
        match sums.get_mut(usize::from(hour)) {
            Some(slot) => *slot = sum,
            None => log::warn!("ignoring increments logged at hour {hour} on {date}"),
        }
    }
    Ok(sums)
}


/// Raw events of `date`, oldest first.
pub fn events_for(reads: &dyn ReadStatements, date: DateKey) -> Result<Vec<IncrementEvent>, StorageError> {
    reads.select_increments(date)
}
