//! Watch command - run the midnight rollover in the foreground.

use std::io::{self, BufRead};

use anyhow::Result;

use super::App;
use crate::config::Settings;
use crate::scheduler::RolloverScheduler;


/// Run the rollover scheduler until stdin reaches a newline or EOF.
pub fn run(settings: &Settings) -> Result<()> {
    let app = App::open(settings)?;
    let scheduler = RolloverScheduler::new(app.backend.clone(), app.clock.clone());
    let handle = scheduler.start();

    println!("\x1b[1m\x1b[36mRollover scheduler running\x1b[0m");
    println!("Storage: {} ({})", settings.storage_path().display(), settings.backend);
    println!("\x1b[2mPress Enter to stop.\x1b[0m");

    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line);

    handle.cancel();
    println!("\x1b[32m+ Stopped\x1b[0m");

    read?;
    app.close()
}
