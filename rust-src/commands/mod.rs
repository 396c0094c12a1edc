//! CLI command implementations.

pub mod counter;
pub mod report;
pub mod watch;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::aggregation::Analytics;
use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::counter::CounterStore;
use crate::storage::{self, StorageBackend};


/// Everything a command needs, wired from settings.
pub struct App {
    pub backend: Arc<dyn StorageBackend>,
    pub clock: Arc<dyn Clock>,
    pub store: CounterStore,
    pub analytics: Analytics,
}


impl App {
    /// Open the configured backend and make sure today's row exists.
    pub fn open(settings: &Settings) -> Result<Self> {
        let backend = storage::open(settings.backend, settings.data_dir()).with_context(|| {
            format!(
                "Failed to open {} storage in {}",
                settings.backend,
                settings.data_dir().display()
            )
        })?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let store = CounterStore::new(Arc::clone(&backend), Arc::clone(&clock));
        let analytics = Analytics::new(Arc::clone(&backend), Arc::clone(&clock));
        store.initialize().context("Failed to initialize counter store")?;

        Ok(Self {
            backend,
            clock,
            store,
            analytics,
        })
    }

    pub fn close(self) -> Result<()> {
        self.backend.close().context("Failed to close storage")
    }
}


/// Print a value as one line of JSON.
fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
