//! Aggregation layer for daily and hourly counter views.

mod analytics;

pub use analytics::Analytics;
