//! Days / hours / log commands.

use anyhow::{Context, Result};

use super::{print_json, App};
use crate::config::Settings;
use crate::models::{DateKey, HourBucket};


/// Widest bar drawn next to a count.
const BAR_WIDTH: u64 = 40;


/// Show daily totals, oldest first, optionally only the last `last` days.
pub fn days(settings: &Settings, last: Option<usize>, json: bool) -> Result<()> {
    let app = App::open(settings)?;
    let totals = match last {
        Some(days) => app.analytics.last_days(days),
        None => app.analytics.daily_totals(),
    }
    .context("Failed to read daily totals")?;

    if json {
        print_json(&totals)?;
        return app.close();
    }

    let max = totals.iter().map(|t| t.count).max().unwrap_or(0);
    let title = match last {
        Some(days) => format!("LAST {} DAYS", days),
        None => "ALL DAYS".to_string(),
    };
    println!("{}", title);
    println!("{}", "-".repeat(60));
    for total in &totals {
        println!(
            "  {}  {:>10}  {}",
            total.date,
            format_number(total.count),
            bar(total.count, max)
        );
    }

    app.close()
}


/// Show the hourly trend of `date` (default: today).
pub fn hours(settings: &Settings, date: Option<DateKey>, json: bool) -> Result<()> {
    let app = App::open(settings)?;
    let (date, trend) = match date {
        Some(date) => app.analytics.hourly_trend(date).map(|trend| (date, trend)),
        None => app.analytics.hourly_trend_today(),
    }
    .context("Failed to read hourly trend")?;

    if json {
        print_json(&trend)?;
        return app.close();
    }

    print_trend(date, &trend);
    app.close()
}


/// List the increments recorded on `date` (default: today).
pub fn log(settings: &Settings, date: Option<DateKey>, json: bool) -> Result<()> {
    let app = App::open(settings)?;
    let date = date.unwrap_or_else(|| app.clock.today());
    let events = app
        .analytics
        .events_for(date)
        .with_context(|| format!("Failed to read increments for {date}"))?;

    if json {
        print_json(&events)?;
        return app.close();
    }

    if events.is_empty() {
        println!("\x1b[2mNo increments recorded on {}\x1b[0m", date);
        return app.close();
    }

    println!("INCREMENTS ON {}", date);
    println!("{}", "-".repeat(60));
    for event in &events {
        println!("  #{:<6} {}  \x1b[32m+{}\x1b[0m", event.id, event.timestamp, event.amount);
    }

    app.close()
}


fn print_trend(date: DateKey, trend: &[HourBucket]) {
    let max = trend.iter().map(|b| b.count).max().unwrap_or(0);
    let total: u64 = trend.iter().map(|b| b.count).sum();

    println!("HOURLY TREND {}", date);
    println!("{}", "-".repeat(60));
    for bucket in trend {
        println!(
            "  {:02}:00  {:>8}  {}",
            bucket.hour,
            format_number(bucket.count),
            bar(bucket.count, max)
        );
    }
    println!("{}", "-".repeat(60));
    println!("  Total   {:>8}", format_number(total));
}


/// Bar scaled so that `max` fills [`BAR_WIDTH`].
fn bar(count: u64, max: u64) -> String {
    if max == 0 || count == 0 {
        return String::new();
    }
    let width = (u128::from(count) * u128::from(BAR_WIDTH) / u128::from(max)).max(1);
    "#".repeat(width as usize)
}


/// Format a number with commas.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    let chars: Vec<char> = s.chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }

    result
}
