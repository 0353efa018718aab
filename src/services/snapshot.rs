//! Snapshot assembly.
//!
//! Combines transformed roads and weather locations into one immutable
//! [`ApiData`]: a global alert list (deduplicated by title, stable-sorted by
//! severity) plus the per-entity views. A fresh snapshot is built on every
//! successful refresh cycle; nothing here is ever mutated after assembly.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::services::alerts::Alert;
use crate::services::raw::{records_in, RawRecord};
use crate::services::status::{transform_road, transform_weather, RoadSegment, WeatherLocation};

/// One refresh cycle's worth of display data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiData {
    pub roads: Vec<RoadSegment>,
    pub weather: Vec<WeatherLocation>,
    /// All alerts, deduplicated by title and ordered most severe first
    pub alerts: Vec<Alert>,
    /// Upstream-reported update time, or assembly time if neither feed had one
    pub last_updated: String,
}

/// `lastUpdated` values reported by each feed.
#[derive(Debug, Clone, Default)]
pub struct FeedTimestamps {
    pub roads: Option<String>,
    pub weather: Option<String>,
}

/// Assemble a snapshot from already-transformed entities.
pub fn assemble(
    roads: Vec<RoadSegment>,
    weather: Vec<WeatherLocation>,
    timestamps: FeedTimestamps,
    now: DateTime<Utc>,
) -> ApiData {
    let concatenated = roads
        .iter()
        .flat_map(|r| r.alerts.iter())
        .chain(weather.iter().flat_map(|w| w.alerts.iter()));

    let mut alerts = dedupe_by_title(concatenated);
    sort_by_severity(&mut alerts);

    let last_updated = timestamps
        .roads
        .or(timestamps.weather)
        .unwrap_or_else(|| now.to_rfc3339());

    ApiData {
        roads,
        weather,
        alerts,
        last_updated,
    }
}

/// Keep the first alert seen for each distinct title.
///
/// The same incident is commonly attached to several road segments or
/// weather locations; the first occurrence keeps its full field set.
pub fn dedupe_by_title<'a>(alerts: impl IntoIterator<Item = &'a Alert>) -> Vec<Alert> {
    let mut seen: HashSet<&'a str> = HashSet::new();
    let mut unique = Vec::new();
    for alert in alerts {
        if seen.insert(alert.title.as_str()) {
            unique.push(alert.clone());
        }
    }
    unique
}

/// Stable sort, most severe first. Equal severities keep their input order.
pub fn sort_by_severity(alerts: &mut [Alert]) {
    alerts.sort_by_key(|a| a.severity.rank());
}

/// Build a snapshot straight from the two upstream JSON documents.
///
/// Per-record problems are absorbed by the transformers; only a missing
/// top-level `roads` / `weatherData` array is an error.
pub fn build_snapshot(roads_json: &Value, weather_json: &Value) -> Result<ApiData, AppError> {
    build_snapshot_at(roads_json, weather_json, Utc::now())
}

/// [`build_snapshot`] with an explicit assembly time.
pub fn build_snapshot_at(
    roads_json: &Value,
    weather_json: &Value,
    now: DateTime<Utc>,
) -> Result<ApiData, AppError> {
    let road_records = top_level_records(roads_json, "roads")?;
    let weather_records = top_level_records(weather_json, "weatherData")?;

    let roads: Vec<RoadSegment> = road_records.iter().map(transform_road).collect();
    let weather: Vec<WeatherLocation> = weather_records.iter().map(transform_weather).collect();

    let timestamps = FeedTimestamps {
        roads: feed_timestamp(roads_json),
        weather: feed_timestamp(weather_json),
    };

    let snapshot = assemble(roads, weather, timestamps, now);

    tracing::debug!(
        "Built snapshot: {} roads, {} weather locations, {} alerts (last updated {})",
        snapshot.roads.len(),
        snapshot.weather.len(),
        snapshot.alerts.len(),
        snapshot.last_updated,
    );

    Ok(snapshot)
}

fn top_level_records<'a>(doc: &'a Value, key: &str) -> Result<Vec<RawRecord<'a>>, AppError> {
    let values = doc
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::MalformedPayload(format!("missing '{}' array", key)))?;
    Ok(records_in(values, key))
}

fn feed_timestamp(doc: &Value) -> Option<String> {
    RawRecord::from_value(doc).and_then(|r| r.string("lastUpdated"))
}
