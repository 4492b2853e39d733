//! Request and response bodies of the local API.
//!
//! Times travel as `"HH:MM"` strings and are parsed by the handlers, so a
//! malformed time is reported as `400 INVALID_PAYLOAD` rather than as a JSON
//! extraction failure.

use serde::{Deserialize, Serialize};

use crate::clock::{InvalidTimeFormat, TimeOfDay};
use crate::observability::MetricsSnapshot;
use crate::rest::RestTimePair;
use crate::sync::SyncStatus;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sync_in_progress: bool,
    pub scheduler_running: bool,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusResponse {
    #[serde(flatten)]
    pub status: SyncStatus,
    pub in_progress: bool,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// `GET`/`PUT /sync/schedule` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleBody {
    pub times: Vec<String>,
}

impl ScheduleBody {
    pub fn from_times(times: &[TimeOfDay]) -> Self {
        Self {
            times: times.iter().map(ToString::to_string).collect(),
        }
    }
}

/// One element of the `GET`/`PUT /rest-times` array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestTimeBody {
    pub start: String,
    pub stop: String,
}

impl RestTimeBody {
    pub fn parse(&self) -> Result<RestTimePair, InvalidTimeFormat> {
        Ok(RestTimePair::new(self.start.parse()?, self.stop.parse()?))
    }
}

impl From<RestTimePair> for RestTimeBody {
    fn from(pair: RestTimePair) -> Self {
        Self {
            start: pair.start.to_string(),
            stop: pair.stop.to_string(),
        }
    }
}
