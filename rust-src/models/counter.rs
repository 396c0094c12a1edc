//! Daily counter rows, increment events and the views derived from them.

use serde::{Deserialize, Serialize};

use super::DateKey;


/// Number of hour buckets in a trend.
pub const HOURS_PER_DAY: usize = 24;


/// One row of the `counters` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCounter {
    pub date: DateKey,
    pub count: u64,
}


/// A day's total as returned to callers.
pub type DayTotal = DailyCounter;


/// One row of the append-only `increments` log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementEvent {
    pub id: i64,
    pub date: DateKey,
    /// Local hour of day, 0-23.
    pub hour: u8,
    /// RFC 3339 local instant with offset.
    pub timestamp: String,
    pub amount: u64,
}


/// Sum of increment amounts for one hour of one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourBucket {
    pub hour: u8,
    pub count: u64,
}


impl DailyCounter {
    pub fn zero(date: DateKey) -> Self {
        Self { date, count: 0 }
    }
}
