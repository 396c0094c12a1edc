//! Background day-rollover.

mod rollover;

#[allow(unused_imports)]
pub use rollover::{
    delay_until_next_midnight,
    seed_day,
    RolloverHandle,
    RolloverScheduler,
    SchedulerState,
};
