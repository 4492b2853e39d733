//! Maintenance ("rest") windows.
//!
//! A window stops the playback service at `start` and starts it again at
//! `stop`. Windows are stored as crontab entries owned by the service account,
//! each bracketed by a marker comment so unrelated entries survive rewrites.

pub mod crontab;
pub mod error;
pub mod overlap;
pub mod windows;

use serde::{Deserialize, Serialize};

use crate::clock::TimeOfDay;

pub use crontab::{CronCommands, merge_entries, parse_entries, render_entries, sanitize};
pub use error::RestError;
pub use overlap::{OverlapError, validate};
pub use windows::{CrontabIo, RestWindows, SystemCrontab};

/// One maintenance window on the 24-hour ring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestTimePair {
    /// When the guarded service is stopped
    pub start: TimeOfDay,
    /// When the guarded service is started again
    pub stop: TimeOfDay,
}

impl RestTimePair {
    pub fn new(start: TimeOfDay, stop: TimeOfDay) -> Self {
        Self { start, stop }
    }
}
