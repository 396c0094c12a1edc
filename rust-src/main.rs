//! daytally - a daily counter with durable storage.
//!
//! Counts land in a per-day row, every increment is logged with its hour,
//! and a background scheduler seeds the next day at local midnight.

mod aggregation;
mod cli;
mod clock;
mod commands;
mod config;
mod counter;
mod models;
mod scheduler;
mod storage;

#[cfg(test)]
mod contract_tests;


fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = cli::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
