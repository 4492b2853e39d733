use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use super::{
    services::{
        cancel_sync, get_rest_times, get_schedule, health, put_rest_times, put_schedule,
        sync_status, trigger_sync,
    },
    state::AppState,
};

/// Local API routes over the agent in `state`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sync", post(trigger_sync))
        .route("/sync/status", get(sync_status))
        .route("/sync/cancel", post(cancel_sync))
        .route("/sync/schedule", get(get_schedule).put(put_schedule))
        .route("/rest-times", get(get_rest_times).put(put_rest_times))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
