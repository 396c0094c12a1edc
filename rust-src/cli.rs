//! CLI definitions using clap.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use crate::config::Settings;
use crate::models::DateKey;
use crate::storage::BackendKind;


/// daytally - count things per day and see when they happen
#[derive(Parser)]
#[command(name = "tally")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Storage backend
    #[arg(long, global = true, value_enum, env = "TALLY_BACKEND", default_value_t = BackendKind::Sqlite)]
    backend: BackendKind,

    /// Directory holding the counter data (default: ~/.daytally)
    #[arg(long, global = true, env = "TALLY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}


#[derive(Subcommand)]
enum Commands {
    /// Show today's count
    Today,

    /// Add to today's count
    Add {
        /// Positive whole number to add
        #[arg(default_value = "1")]
        amount: String,
    },

    /// Set today's count back to zero
    Reset,

    /// Show daily totals, oldest first
    Days {
        /// Number of most recent days to show
        #[arg(short, long, conflicts_with = "all")]
        last: Option<usize>,

        /// Show every recorded day
        #[arg(long)]
        all: bool,
    },

    /// Show the 24-hour trend of a day
    Hours {
        /// Day to show as YYYY-MM-DD (default: today)
        #[arg(short, long)]
        date: Option<DateKey>,
    },

    /// List the individual increments of a day
    Log {
        /// Day to show as YYYY-MM-DD (default: today)
        #[arg(short, long)]
        date: Option<DateKey>,
    },

    /// Keep seeding a fresh day at every midnight until stdin closes
    Watch,
}


/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::resolve(cli.backend, cli.data_dir);
    let json = cli.json;

    match cli.command {
        Some(Commands::Today) => commands::counter::today(&settings, json),
        Some(Commands::Add { amount }) => commands::counter::add(&settings, &amount, json),
        Some(Commands::Reset) => commands::counter::reset(&settings, json),
        Some(Commands::Days { last, all }) => {
            let last = if all { None } else { Some(last.unwrap_or(crate::config::DEFAULT_RECENT_DAYS)) };
            commands::report::days(&settings, last, json)
        }
        Some(Commands::Hours { date }) => commands::report::hours(&settings, date, json),
        Some(Commands::Log { date }) => commands::report::log(&settings, date, json),
        Some(Commands::Watch) => commands::watch::run(&settings),
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            Ok(())
        }
    }
}
