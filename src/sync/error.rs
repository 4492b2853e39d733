use std::fmt;
use thiserror::Error;

use super::client::FetchError;
use super::download::DownloadError;

/// A failed item of an otherwise completed sync
#[derive(Debug)]
pub struct ItemFailure {
    pub filename: String,
    pub error: DownloadError,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.filename, self.error)
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("manifest fetch failed: {0}")]
    Fetch(FetchError),

    #[error("{} of {total} downloads failed: {}", failures.len(), join(failures))]
    Downloads {
        total: usize,
        failures: Vec<ItemFailure>,
    },

    #[error("a sync is already in progress")]
    AlreadyInProgress,

    #[error("sync cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FetchError> for SyncError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::NotConfigured => SyncError::Configuration(e.to_string()),
            FetchError::Cancelled => SyncError::Cancelled,
            other => SyncError::Fetch(other),
        }
    }
}

fn join(failures: &[ItemFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_errors_are_classified() {
        assert!(matches!(
            SyncError::from(FetchError::NotConfigured),
            SyncError::Configuration(_)
        ));
        assert!(matches!(
            SyncError::from(FetchError::Cancelled),
            SyncError::Cancelled
        ));
        assert!(matches!(
            SyncError::from(FetchError::Timeout),
            SyncError::Fetch(FetchError::Timeout)
        ));
    }

    #[test]
    fn test_downloads_error_lists_every_failure() {
        let err = SyncError::Downloads {
            total: 3,
            failures: vec![
                ItemFailure {
                    filename: "a.mp4".into(),
                    error: DownloadError::SizeMismatch {
                        expected: 2,
                        actual: 1,
                    },
                },
                ItemFailure {
                    filename: "b.mp4".into(),
                    error: DownloadError::Cancelled,
                },
            ],
        };

        let message = err.to_string();
        assert!(message.starts_with("2 of 3 downloads failed"));
        assert!(message.contains("a.mp4: size mismatch"));
        assert!(message.contains("b.mp4: download cancelled"));
    }
}
