//! Today / add / reset commands.

use anyhow::{Context, Result};

use super::{print_json, App};
use crate::config::Settings;
use crate::models::Amount;


/// Show today's count.
pub fn today(settings: &Settings, json: bool) -> Result<()> {
    let app = App::open(settings)?;
    let total = app.store.today()?;

    if json {
        print_json(&total)?;
    } else {
        println!("\x1b[1m{}\x1b[0m  {}", total.date, total.count);
    }

    app.close()
}


/// Add `amount` to today's count.
pub fn add(settings: &Settings, amount: &str, json: bool) -> Result<()> {
    // Reject bad input before touching storage.
    let amount: Amount = amount.parse()?;

    let app = App::open(settings)?;
    let total = app
        .store
        .increment_today(amount)
        .context("Failed to increment today's count")?;

    if json {
        print_json(&total)?;
    } else {
        println!("\x1b[32m+{}\x1b[0m  {}: \x1b[1m{}\x1b[0m", amount, total.date, total.count);
    }

    app.close()
}


/// Reset today's count to zero.
pub fn reset(settings: &Settings, json: bool) -> Result<()> {
    let app = App::open(settings)?;
    let total = app.store.reset_today().context("Failed to reset today's count")?;

    if json {
        print_json(&total)?;
    } else {
        println!("\x1b[33mReset\x1b[0m  {}: {}", total.date, total.count);
    }

    app.close()
}
