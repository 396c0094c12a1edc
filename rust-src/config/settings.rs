//! Application settings and path constants.

use std::path::{Path, PathBuf};

use crate::storage::BackendKind;


/// Directory under the home directory holding all state.
pub const DATA_DIR_NAME: &str = ".daytally";

/// SQLite database file inside the data directory.
pub const SQLITE_FILE_NAME: &str = "counter.db";

/// Storage key of the document backend.
pub const DOCUMENT_STORAGE_KEY: &str = "counters_storage_v1";

/// Number of days shown by `tally days` without `--last`.
pub const DEFAULT_RECENT_DAYS: usize = 7;


/// Get the default data directory.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR_NAME)
}


/// Resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend: BackendKind,
    pub data_dir: PathBuf,
}


impl Settings {
    /// Explicit values win; a missing data directory falls back to the default.
    pub fn resolve(backend: BackendKind, data_dir: Option<PathBuf>) -> Self {
        Self {
            backend,
            data_dir: data_dir.unwrap_or_else(default_data_dir),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// File that holds the data for the selected backend.
    pub fn storage_path(&self) -> PathBuf {
        match self.backend {
            BackendKind::Sqlite => self.data_dir.join(SQLITE_FILE_NAME),
            BackendKind::Document => self.data_dir.join(format!("{DOCUMENT_STORAGE_KEY}.json")),
        }
    }
}


impl Default for Settings {
    fn default() -> Self {
        Self::resolve(BackendKind::Sqlite, None)
    }
}
