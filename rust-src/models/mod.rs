//! Data models for daily counters and their increment log.

mod amount;
mod counter;
mod date_key;

#[allow(unused_imports)]
pub use amount::{Amount, IntoAmount, InvalidAmount};
#[allow(unused_imports)]
pub use counter::{DailyCounter, DayTotal, HourBucket, IncrementEvent, HOURS_PER_DAY};
pub use date_key::DateKey;
