//! Validated increment amounts.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;


/// Largest amount that still fits a signed 64-bit SQLite integer.
const MAX_AMOUNT: u64 = i64::MAX as u64;


/// A positive whole number of units to add to a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Amount(u64);


/// Returned for zero, negative, fractional or oversized amounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("amount must be a positive integer, got {0}")]
pub struct InvalidAmount(pub String);


impl Amount {
    #[cfg(test)]
    pub const ONE: Amount = Amount(1);

    pub fn new(value: u64) -> Result<Self, InvalidAmount> {
        if value == 0 || value > MAX_AMOUNT {
            return Err(InvalidAmount(value.to_string()));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Always in range, see [`MAX_AMOUNT`].
    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }
}


impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}


impl FromStr for Amount {
    type Err = InvalidAmount;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidAmount(s.to_string()));
        }
        let value: u64 = trimmed.parse().map_err(|_| InvalidAmount(s.to_string()))?;
        Self::new(value)
    }
}


/// Anything a caller may hand to `increment_today`.
///
/// Integers convert when positive, floats only when they are whole numbers.
pub trait IntoAmount {
    fn into_amount(self) -> Result<Amount, InvalidAmount>;
}


impl IntoAmount for Amount {
    fn into_amount(self) -> Result<Amount, InvalidAmount> {
        Ok(self)
    }
}


impl IntoAmount for &str {
    fn into_amount(self) -> Result<Amount, InvalidAmount> {
        self.parse()
    }
}


macro_rules! int_into_amount {
    ($($ty:ty),*) => {
        $(
            impl IntoAmount for $ty {
                fn into_amount(self) -> Result<Amount, InvalidAmount> {
                    u64::try_from(self)
                        .map_err(|_| InvalidAmount(self.to_string()))
                        .and_then(Amount::new)
                }
            }
        )*
    };
}

int_into_amount!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);


impl IntoAmount for f64 {
    fn into_amount(self) -> Result<Amount, InvalidAmount> {
        if !self.is_finite() || self.fract() != 0.0 || self < 1.0 || self >= MAX_AMOUNT as f64 {
            return Err(InvalidAmount(self.to_string()));
        }
        Amount::new(self as u64)
    }
}


impl IntoAmount for f32 {
    fn into_amount(self) -> Result<Amount, InvalidAmount> {
        f64::from(self).into_amount()
    }
}
