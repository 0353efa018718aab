//! Conditions HTTP endpoints.
//!
//! - GET /api/v1/conditions
//! - GET /api/v1/conditions/summary

use std::sync::Arc;

use axum::extract::State;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::{AppError, ErrorResponse};
use crate::services::display::{
    alert_count_tone, format_human_time, road_status_text, road_status_tone, weather_icon, Tone,
    WeatherIcon,
};
use crate::services::poller::SnapshotReceiver;
use crate::services::snapshot::ApiData;

/// Latest published snapshot, or `Unavailable` if no refresh has succeeded yet.
pub(crate) fn current_snapshot(snapshot: &SnapshotReceiver) -> Result<Arc<ApiData>, AppError> {
    snapshot.borrow().clone().ok_or(AppError::Unavailable)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// One road row in the compact summary.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoadSummary {
    /// Position in `ApiData.roads`, for the details endpoint
    pub index: usize,
    pub name: String,
    pub from: String,
    pub to: String,
    /// e.g. "12 min delays"
    pub status_text: String,
    pub tone: Tone,
}

/// One weather row in the compact summary.
#[derive(Debug, Serialize, ToSchema)]
pub struct WeatherSummary {
    pub index: usize,
    pub name: String,
    /// Temperature in °F
    pub temperature: Option<i64>,
    pub condition: String,
    pub icon: WeatherIcon,
}

/// Compact "current conditions" view.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConditionsSummary {
    /// Only roads with something to report
    pub roads: Vec<RoadSummary>,
    /// True when no road has issues
    pub all_clear: bool,
    pub weather: Vec<WeatherSummary>,
    pub alert_count: usize,
    pub alert_tone: Tone,
    pub last_updated: String,
    /// e.g. "5 min ago"
    pub last_updated_human: String,
}

impl ConditionsSummary {
    pub fn from_snapshot(data: &ApiData, now: DateTime<Tz>) -> Self {
        let roads: Vec<RoadSummary> = data
            .roads
            .iter()
            .enumerate()
            .filter(|(_, road)| road.has_issues())
            .map(|(index, road)| RoadSummary {
                index,
                name: road.name.clone(),
                from: road.from.clone(),
                to: road.to.clone(),
                status_text: road_status_text(road),
                tone: road_status_tone(road),
            })
            .collect();

        let weather = data
            .weather
            .iter()
            .enumerate()
            .map(|(index, w)| WeatherSummary {
                index,
                name: w.name.clone(),
                temperature: w.temperature,
                condition: w.condition.clone(),
                icon: weather_icon(&w.icon),
            })
            .collect();

        Self {
            all_clear: roads.is_empty(),
            roads,
            weather,
            alert_count: data.alerts.len(),
            alert_tone: alert_count_tone(&data.alerts),
            last_updated: data.last_updated.clone(),
            last_updated_human: format_human_time(&data.last_updated, now),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Get the full current snapshot.
///
/// Roads, weather locations and the global alert list (deduplicated by
/// title, most severe first). Returns 503 until the first refresh succeeds.
#[utoipa::path(
    get,
    path = "/api/v1/conditions",
    tag = "Conditions",
    responses(
        (status = 200, description = "Current snapshot", body = ApiData),
        (status = 503, description = "No snapshot loaded yet", body = ErrorResponse),
    )
)]
pub async fn get_conditions(
    State(snapshot): State<SnapshotReceiver>,
) -> Result<Json<ApiData>, AppError> {
    let data = current_snapshot(&snapshot)?;
    Ok(Json(data.as_ref().clone()))
}

/// Get the compact current-conditions summary.
#[utoipa::path(
    get,
    path = "/api/v1/conditions/summary",
    tag = "Conditions",
    responses(
        (status = 200, description = "Conditions summary", body = ConditionsSummary),
        (status = 503, description = "No snapshot loaded yet", body = ErrorResponse),
    )
)]
pub async fn get_conditions_summary(
    State(snapshot): State<SnapshotReceiver>,
    Extension(zone): Extension<Tz>,
) -> Result<Json<ConditionsSummary>, AppError> {
    let data = current_snapshot(&snapshot)?;
    let now = Utc::now().with_timezone(&zone);
    Ok(Json(ConditionsSummary::from_snapshot(&data, now)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::snapshot::build_snapshot_at;
    use serde_json::json;
    use tokio::sync::watch;

    fn now() -> DateTime<Utc> {
        "2026-01-15T08:00:00Z".parse().unwrap()
    }

    fn local_now() -> DateTime<Tz> {
        now().with_timezone(&Tz::UTC)
    }

    fn sample() -> ApiData {
        let roads = json!({
            "roads": [
                { "name": "SR-4", "section": "Angels Camp to Murphys", "status": "OPEN",
                  "congestionLevel": "CLEAR", "chainControl": "none" },
                { "name": "SR-4", "section": "Arnold to Bear Valley", "delayMinutes": 20 },
                { "name": "SR-26", "section": "Valley Springs to Mokelumne Hill",
                  "chainControl": "R2" }
            ],
            "lastUpdated": "2026-01-15T07:55:00Z"
        });
        let weather = json!({
            "weatherData": [
                { "locationName": "Murphys", "temperatureCelsius": 10, "weatherIcon": "10d",
                  "weatherDescription": "light rain",
                  "alerts": [{ "event": "Flood Watch" }] }
            ]
        });
        build_snapshot_at(&roads, &weather, now()).unwrap()
    }

    #[test]
    fn test_summary_lists_only_roads_with_issues() {
        let summary = ConditionsSummary::from_snapshot(&sample(), local_now());
        assert!(!summary.all_clear);
        assert_eq!(summary.roads.len(), 2);

        assert_eq!(summary.roads[0].index, 1);
        assert_eq!(summary.roads[0].status_text, "20 min delays");
        assert_eq!(summary.roads[0].tone, Tone::Danger);

        assert_eq!(summary.roads[1].index, 2);
        assert_eq!(summary.roads[1].status_text, "Restrictions");
        assert_eq!(summary.roads[1].tone, Tone::Warning);
    }

    #[test]
    fn test_summary_weather_and_timestamps() {
        let summary = ConditionsSummary::from_snapshot(&sample(), local_now());
        assert_eq!(summary.weather.len(), 1);
        assert_eq!(summary.weather[0].temperature, Some(50));
        assert_eq!(summary.weather[0].icon, WeatherIcon::Rain);
        assert_eq!(summary.alert_count, 1);
        assert_eq!(summary.alert_tone, Tone::Warning);
        assert_eq!(summary.last_updated, "2026-01-15T07:55:00Z");
        assert_eq!(summary.last_updated_human, "5 min ago");
    }

    #[test]
    fn test_summary_all_clear() {
        let data = build_snapshot_at(
            &json!({ "roads": [{ "name": "SR-4", "status": "OPEN" }] }),
            &json!({ "weatherData": [] }),
            now(),
        )
        .unwrap();
        let summary = ConditionsSummary::from_snapshot(&data, local_now());
        assert!(summary.all_clear);
        assert!(summary.roads.is_empty());
        assert_eq!(summary.alert_tone, Tone::Info);
    }

    #[tokio::test]
    async fn test_get_conditions_unavailable_before_first_refresh() {
        let (_tx, rx) = watch::channel(None);
        let result = get_conditions(State(rx)).await;
        assert!(matches!(result, Err(AppError::Unavailable)));
    }

    #[tokio::test]
    async fn test_get_conditions_returns_published_snapshot() {
        let (tx, rx) = watch::channel(None);
        tx.send_replace(Some(Arc::new(sample())));

        let Json(data) = get_conditions(State(rx.clone())).await.unwrap();
        assert_eq!(data.roads.len(), 3);
        assert_eq!(data.alerts[0].title, "Flood Watch");

        let Json(summary) = get_conditions_summary(State(rx), Extension(Tz::UTC)).await.unwrap();
        assert_eq!(summary.roads.len(), 2);
    }
}
