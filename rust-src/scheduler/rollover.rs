//! Seeds a zero counter row shortly after every local midnight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, TimeZone};
use parking_lot::Mutex;

use crate::clock::Clock;
use crate::models::DateKey;
use crate::storage::{StorageBackend, StorageError, StorageExt};


/// Wait used when the next midnight cannot be resolved in the local zone.
const FALLBACK_DELAY: Duration = Duration::from_secs(24 * 60 * 60);


/// Lifecycle of a rollover scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Created, not started.
    Idle,
    /// Waiting for the next midnight.
    Armed,
    /// Midnight passed, seeding the new day.
    Fired,
    /// Cancelled. Terminal.
    Stopped,
}


/// Keeps a zero row in place for each new day without anyone touching the counter.
pub struct RolloverScheduler {
    backend: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
}


/// Returned by [`RolloverScheduler::start`]. Dropping it cancels the scheduler.
pub struct RolloverHandle {
    shared: Arc<Shared>,
    cancel_tx: Mutex<Option<Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}


struct Shared {
    state: Mutex<SchedulerState>,
    cancelled: AtomicBool,
}


impl Shared {
    /// Move to `next` unless already stopped. Returns whether it moved.
    fn advance(&self, next: SchedulerState) -> bool {
        let mut state = self.state.lock();
        if *state == SchedulerState::Stopped {
            return false;
        }
        *state = next;
        true
    }
}


impl RolloverScheduler {
    pub fn new(backend: Arc<dyn StorageBackend>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Arm the timer for the next local midnight on a background thread.
    pub fn start(self) -> RolloverHandle {
        let shared = Arc::new(Shared {
            state: Mutex::new(SchedulerState::Idle),
            cancelled: AtomicBool::new(false),
        });
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();

        let worker = Arc::clone(&shared);
        let thread = thread::spawn(move || {
            loop {
                if worker.cancelled.load(Ordering::SeqCst) {
                    break;
                }

                let delay = delay_until_next_midnight(&self.clock.now());
                if !worker.advance(SchedulerState::Armed) {
                    break;
                }
                log::debug!("rollover armed, firing in {}s", delay.as_secs());

                match cancel_rx.recv_timeout(delay) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }

                if worker.cancelled.load(Ordering::SeqCst) || !worker.advance(SchedulerState::Fired) {
                    break;
                }

                let today = self.clock.today();
                match seed_day(self.backend.as_ref(), today) {
                    Ok(()) => log::info!("rollover seeded {today}"),
                    // A missed seed heals on the next initialize or increment.
                    Err(e) => log::warn!("rollover seed for {today} failed: {e}"),
                }
            }
            log::debug!("rollover scheduler stopped");
        });

        RolloverHandle {
            shared,
            cancel_tx: Mutex::new(Some(cancel_tx)),
            thread: Mutex::new(Some(thread)),
        }
    }
}


impl RolloverHandle {
    /// Disarm the pending timer. Safe to call any number of times.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
        *self.shared.state.lock() = SchedulerState::Stopped;

        // Dropping the sender wakes the worker out of its wait.
        self.cancel_tx.lock().take();

        if let Some(thread) = self.thread.lock().take() {
            if thread.thread().id() != thread::current().id() && thread.join().is_err() {
                log::warn!("rollover worker panicked");
            }
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> SchedulerState {
        *self.shared.state.lock()
    }
}


impl Drop for RolloverHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}


/// Ensure a zero row exists for `date`. Never touches an existing count.
pub fn seed_day(backend: &dyn StorageBackend, date: DateKey) -> Result<(), StorageError> {
    backend.transact(|tx| tx.ensure_row(date))
}


/// Time from `now` until the start of the next calendar day, never negative.
///
/// When midnight itself does not exist (a DST gap) the first valid minute
/// of the next day is used.
pub fn delay_until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    let Some(tomorrow) = now.date_naive().succ_opt() else {
        return FALLBACK_DELAY;
    };

    let next = (0..3u32)
        .filter_map(|hour| tomorrow.and_hms_opt(hour, 0, 0))
        .find_map(|naive| now.timezone().from_local_datetime(&naive).earliest());

    match next {
        Some(next) => next
            .signed_duration_since(now.clone())
            .to_std()
            .unwrap_or(Duration::ZERO),
        None => FALLBACK_DELAY,
    }
}
