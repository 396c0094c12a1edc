//! Configuration and settings for daytally.

mod settings;

#[allow(unused_imports)]
pub use settings::{
    default_data_dir,
    Settings,
    DATA_DIR_NAME,
    DEFAULT_RECENT_DAYS,
    DOCUMENT_STORAGE_KEY,
    SQLITE_FILE_NAME,
};
