//! Local wall-clock time.

use chrono::{DateTime, Local};

use crate::models::DateKey;


/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    /// Today's date key in local time.
    fn today(&self) -> DateKey {
        DateKey::of(&self.now())
    }
}


/// The operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;


impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}
