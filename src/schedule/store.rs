use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::times::parse_lenient;
use crate::clock::TimeOfDay;
use crate::state::{JsonFile, Result};

/// On-disk form: `{"times": ["03:00", "15:30"]}`
#[derive(Debug, Default, Serialize, Deserialize)]
struct ScheduleDocument {
    #[serde(default)]
    times: Vec<String>,
}

impl ScheduleDocument {
    fn from_times(times: &[TimeOfDay]) -> Self {
        Self {
            times: times.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Persistent home of the sync schedule
#[derive(Debug, Clone)]
pub struct ScheduleStore {
    file: JsonFile,
}

impl ScheduleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    /// Load the stored schedule. Unreadable files and invalid entries are
    /// logged and treated as absent.
    pub fn load(&self) -> Vec<TimeOfDay> {
        match self.file.load::<ScheduleDocument>() {
            Ok(Some(doc)) => parse_lenient(&doc.times),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable sync schedule");
                Vec::new()
            }
        }
    }

    pub fn store(&self, times: &[TimeOfDay]) -> Result<()> {
        self.file.store(&ScheduleDocument::from_times(times))
    }

    /// Async form of [`store`](Self::store), writing on the blocking pool
    pub async fn persist(&self, times: &[TimeOfDay]) -> Result<()> {
        self.file.persist(&ScheduleDocument::from_times(times)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_then_load() {
        let temp = TempDir::new().unwrap();
        let store = ScheduleStore::new(temp.path().join("schedule.json"));
        let times = vec![TimeOfDay::new(3, 0).unwrap(), TimeOfDay::new(15, 30).unwrap()];

        store.store(&times).unwrap();

        let raw = std::fs::read_to_string(temp.path().join("schedule.json")).unwrap();
        assert!(raw.contains("\"03:00\""));
        assert_eq!(store.load(), times);
    }

    #[test]
    fn test_load_missing_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = ScheduleStore::new(temp.path().join("schedule.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_skips_invalid_entries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("schedule.json");
        std::fs::write(&path, r#"{"times": ["bogus", "7:05", "24:00"]}"#).unwrap();

        let loaded = ScheduleStore::new(path).load();
        assert_eq!(loaded, vec![TimeOfDay::new(7, 5).unwrap()]);
    }

    #[test]
    fn test_load_corrupt_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("schedule.json");
        std::fs::write(&path, b"[1, 2").unwrap();

        assert!(ScheduleStore::new(path).load().is_empty());
    }
}
