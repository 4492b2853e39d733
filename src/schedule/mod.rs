//! Daily time-of-day sync schedule

pub mod error;
pub mod scheduler;
pub mod store;
pub mod times;

pub use error::ScheduleError;
pub use scheduler::{Clock, Scheduler};
pub use times::calculate_next_sync_time;
