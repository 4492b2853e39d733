use thiserror::Error;

use super::overlap::OverlapError;

#[derive(Debug, Error)]
pub enum RestError {
    #[error("invalid rest windows: {0}")]
    Overlap(#[from] OverlapError),

    #[error("crontab command failed: {0}")]
    Crontab(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RestError>;
