//! Counter store and increment log.

pub mod increment_log;
mod store;

use thiserror::Error;

use crate::models::InvalidAmount;
use crate::storage::StorageError;

pub use store::CounterStore;


/// Errors surfaced by counter operations.
#[derive(Debug, Error)]
pub enum CounterError {
    #[error(transparent)]
    InvalidAmount(#[from] InvalidAmount),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
