use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use super::{
    error::ApiError,
    models::{
        CancelResponse, HealthResponse, RestTimeBody, ScheduleBody, SyncStatusResponse,
    },
    state::AppState,
};
use crate::rest::RestTimePair;
use crate::sync::SyncReport;

/// Liveness plus component state (GET /health)
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let agent = &state.agent;

    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sync_in_progress: agent.sync.is_sync_in_progress(),
        scheduler_running: agent.scheduler.is_running(),
        metrics: agent.metrics.snapshot(),
    };

    (StatusCode::OK, Json(response))
}

/// Last sync outcome (GET /sync/status)
pub async fn sync_status(State(state): State<AppState>) -> Json<SyncStatusResponse> {
    Json(SyncStatusResponse {
        status: state.agent.sync.status(),
        in_progress: state.agent.sync.is_sync_in_progress(),
    })
}

/// Run a sync and answer once it is over (POST /sync)
///
/// A second request while a sync runs gets `409` immediately. The sync is
/// bound to the agent's lifetime, not to this request, so a dropped client
/// connection does not abort it.
pub async fn trigger_sync(State(state): State<AppState>) -> Result<Json<SyncReport>, ApiError> {
    let agent = state.agent.clone();
    let report = tokio::spawn(async move {
        let token = agent.shutdown_token().clone();
        agent.sync.trigger_sync(&token).await
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(report))
}

/// Abort the running sync (POST /sync/cancel)
pub async fn cancel_sync(State(state): State<AppState>) -> Json<CancelResponse> {
    Json(CancelResponse {
        cancelled: state.agent.sync.cancel_sync(),
    })
}

/// GET /sync/schedule
pub async fn get_schedule(State(state): State<AppState>) -> Json<ScheduleBody> {
    Json(ScheduleBody::from_times(&state.agent.scheduler.schedule()))
}

/// Replace the sync schedule (PUT /sync/schedule)
pub async fn put_schedule(
    State(state): State<AppState>,
    Json(body): Json<ScheduleBody>,
) -> Result<Json<ScheduleBody>, ApiError> {
    let applied = state.agent.scheduler.set_schedule(&body.times).await?;
    Ok(Json(ScheduleBody::from_times(&applied)))
}

/// GET /rest-times
pub async fn get_rest_times(State(state): State<AppState>) -> Result<Json<Vec<RestTimeBody>>, ApiError> {
    let pairs = state.agent.rest.get_rest_windows().await?;
    Ok(Json(pairs.into_iter().map(RestTimeBody::from).collect()))
}

/// Replace the maintenance windows (PUT /rest-times)
pub async fn put_rest_times(
    State(state): State<AppState>,
    Json(body): Json<Vec<RestTimeBody>>,
) -> Result<Json<Vec<RestTimeBody>>, ApiError> {
    let pairs = body
        .iter()
        .map(RestTimeBody::parse)
        .collect::<Result<Vec<RestTimePair>, _>>()?;

    state.agent.rest.set_rest_windows(&pairs).await?;
    Ok(Json(pairs.into_iter().map(RestTimeBody::from).collect()))
}
