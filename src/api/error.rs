use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

use super::models::ErrorResponse;
use crate::clock::InvalidTimeFormat;
use crate::rest::RestError;
use crate::schedule::ScheduleError;
use crate::sync::SyncError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("payload invalid: {0}")]
    InvalidPayload(String),
    #[error("a sync is already in progress")]
    SyncInProgress,
    #[error("sync cancelled")]
    SyncCancelled,
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::SyncInProgress | ApiError::SyncCancelled => StatusCode::CONFLICT,
            ApiError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::SyncInProgress => "SYNC_IN_PROGRESS",
            ApiError::SyncCancelled => "SYNC_CANCELLED",
            ApiError::NotConfigured(_) => "NOT_CONFIGURED",
            ApiError::Upstream(_) => "UPSTREAM_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(json!(body))).into_response()
    }
}

impl From<SyncError> for ApiError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::AlreadyInProgress => ApiError::SyncInProgress,
            SyncError::Cancelled => ApiError::SyncCancelled,
            SyncError::Configuration(msg) => ApiError::NotConfigured(msg),
            SyncError::Fetch(e) => ApiError::Upstream(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ScheduleError> for ApiError {
    fn from(e: ScheduleError) -> Self {
        match e {
            ScheduleError::InvalidTimeFormat(e) => ApiError::InvalidPayload(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<RestError> for ApiError {
    fn from(e: RestError) -> Self {
        match e {
            RestError::Overlap(e) => ApiError::InvalidPayload(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<InvalidTimeFormat> for ApiError {
    fn from(e: InvalidTimeFormat) -> Self {
        ApiError::InvalidPayload(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::OverlapError;
    use crate::sync::FetchError;

    #[test]
    fn test_sync_errors_map_to_status_codes() {
        let cases = [
            (SyncError::AlreadyInProgress, StatusCode::CONFLICT),
            (
                SyncError::Configuration("missing".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (SyncError::Fetch(FetchError::Timeout), StatusCode::BAD_GATEWAY),
            (
                SyncError::Downloads {
                    total: 1,
                    failures: vec![],
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status_code(), status);
        }
    }

    #[test]
    fn test_overlap_is_bad_request() {
        let err = ApiError::from(RestError::Overlap(OverlapError::FullDay { index: 0 }));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "INVALID_PAYLOAD");
    }
}
