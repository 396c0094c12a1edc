//! Local calendar date used as the primary key of daily records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeZone};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;


/// Format shared by parsing and display.
const DATE_FORMAT: &str = "%Y-%m-%d";


/// A `YYYY-MM-DD` local date.
///
/// The textual form is zero-padded and fixed width, so sorting the strings
/// and sorting the dates give the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);


/// Returned when a string is not a `YYYY-MM-DD` calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid date key {0:?}, expected YYYY-MM-DD")]
pub struct InvalidDateKey(pub String);


impl DateKey {
    #[cfg(test)]
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Date key of an instant, in the instant's own timezone.
    pub fn of<Tz: TimeZone>(at: &DateTime<Tz>) -> Self {
        Self(at.date_naive())
    }
}


impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}


impl FromStr for DateKey {
    type Err = InvalidDateKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let shaped = bytes.len() == 10
            && bytes[4] == b'-'
            && bytes[7] == b'-'
            && bytes
                .iter()
                .enumerate()
                .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
        if !shaped {
            return Err(InvalidDateKey(s.to_string()));
        }

        NaiveDate::parse_from_str(s, DATE_FORMAT)
            .map(Self)
            .map_err(|_| InvalidDateKey(s.to_string()))
    }
}


impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}


impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
