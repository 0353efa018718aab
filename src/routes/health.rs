use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::poller::SnapshotReceiver;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status ("ok" once a snapshot is loaded, "starting" before)
    pub status: String,
    /// API version
    pub version: String,
    /// Whether a snapshot has been loaded
    pub snapshot_loaded: bool,
    /// `lastUpdated` of the current snapshot
    pub last_updated: Option<String>,
}

/// Health check endpoint.
///
/// Always 200 so the process is considered alive while the first refresh is
/// still running or failing; `status` tells the two apart.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse),
    )
)]
pub async fn health_check(State(snapshot): State<SnapshotReceiver>) -> Json<HealthResponse> {
    let last_updated = snapshot
        .borrow()
        .as_ref()
        .map(|data| data.last_updated.clone());

    Json(HealthResponse {
        status: if last_updated.is_some() {
            "ok".to_string()
        } else {
            "starting".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        snapshot_loaded: last_updated.is_some(),
        last_updated,
    })
}
