//! Poller HTTP endpoints.
//!
//! - GET  /api/v1/poller/status — state of the background refresh loop
//! - POST /api/v1/poller/refresh — queue an immediate refresh ("try again")

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tokio::sync::Notify;
use utoipa::ToSchema;

use crate::services::poller::{PollerState, SharedPollerState};

/// State for the poller endpoints.
#[derive(Clone)]
pub(crate) struct PollerRouteState {
    pub(crate) state: SharedPollerState,
    pub(crate) refresh: Arc<Notify>,
}

/// Response to a manual refresh request.
#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshAccepted {
    /// Always "queued"
    pub status: String,
    /// True if a cycle was already running; the new one starts after it
    pub refresh_in_progress: bool,
}

/// Get the current poller status.
///
/// Last success, last error, counters and the next scheduled refresh.
#[utoipa::path(
    get,
    path = "/api/v1/poller/status",
    tag = "Poller",
    responses(
        (status = 200, description = "Current poller status", body = PollerState),
    )
)]
pub async fn get_poller_status(State(s): State<PollerRouteState>) -> Json<PollerState> {
    let state = s.state.read().await;
    Json(state.clone())
}

/// Request an immediate refresh.
///
/// Requests made while a cycle is running collapse into one follow-up cycle.
#[utoipa::path(
    post,
    path = "/api/v1/poller/refresh",
    tag = "Poller",
    responses(
        (status = 202, description = "Refresh queued", body = RefreshAccepted),
    )
)]
pub async fn trigger_refresh(
    State(s): State<PollerRouteState>,
) -> (StatusCode, Json<RefreshAccepted>) {
    let refresh_in_progress = s.state.read().await.refresh_in_progress;
    s.refresh.notify_one();
    tracing::debug!("Manual refresh queued (in progress: {})", refresh_in_progress);

    (
        StatusCode::ACCEPTED,
        Json(RefreshAccepted {
            status: "queued".to_string(),
            refresh_in_progress,
        }),
    )
}
