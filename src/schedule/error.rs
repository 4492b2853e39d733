use thiserror::Error;

use crate::clock::InvalidTimeFormat;
use crate::state::StateError;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    InvalidTimeFormat(#[from] InvalidTimeFormat),

    #[error("failed to persist schedule: {0}")]
    State(#[from] StateError),
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
