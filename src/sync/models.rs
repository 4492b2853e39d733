//! Wire and status types of the content sync engine.
//!
//! The management server publishes the manifest as a JSON array:
//!
//! ```json
//! [
//!   {
//!     "id": 42,
//!     "filename": "lobby-loop.mp4",
//!     "fileSizeBytes": 1048576,
//!     "sha256": "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
//!   }
//! ]
//! ```
//!
//! `filename` is untrusted input and must pass
//! [`validate_filename`](super::filename::validate_filename) before it touches
//! the filesystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One server-side file the device should hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestItem {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub filename: String,
    pub file_size_bytes: u64,
    pub sha256: String,
}

/// Outcome of the most recent sync attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub last_sync_time: Option<DateTime<Utc>>,
    pub ok: bool,
    pub error: Option<String>,
}

/// Counts reported by a successful sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub downloaded: usize,
    pub up_to_date: usize,
    pub invalid: usize,
    pub removed: usize,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
