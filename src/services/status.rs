//! Road and weather status derivation.
//!
//! Turns one raw road record (or weather record) plus its transformed alerts
//! into the display entity for that road segment (or weather location).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::helpers::opt_celsius_to_fahrenheit;
use crate::services::alerts::{transform_alerts, Alert, AlertOrigin};
use crate::services::raw::RawRecord;
use crate::services::severity::Severity;

/// Separator between the endpoints of a road section ("Angels Camp to Murphys").
const SECTION_SEPARATOR: &str = " to ";

/// Destination shown when a section doesn't name one.
const DEFAULT_DESTINATION: &str = "Destination";

/// Display status of a road segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RoadStatus {
    Clear,
    Delays,
    Restrictions,
    Closed,
}

/// Chain-control details for a road, passed through from upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChainControlInfo {
    /// Upstream level token, e.g. "CHAIN_CONTROL_LEVEL_R2"
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_time: Option<String>,
}

impl ChainControlInfo {
    fn from_raw(raw: &RawRecord<'_>) -> Option<Self> {
        Some(Self {
            level: raw.string("level")?,
            description: raw.string("description"),
            location_name: raw.string("locationName"),
            latitude: raw.f64("latitude"),
            longitude: raw.f64("longitude"),
            direction: raw.string("direction"),
            effective_time: raw.string("effectiveTime"),
        })
    }
}

/// One road section with its derived status and alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoadSegment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub from: String,
    pub to: String,
    pub status: RoadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_minutes: Option<f64>,
    /// Short note shown under the segment, e.g. "Chain control: R1"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub alert_count: usize,
    pub alerts: Vec<Alert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub congestion_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_control: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_control_info: Option<ChainControlInfo>,
    /// Upstream status before derivation ("OPEN", "CLOSED", ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_explanation: Option<String>,
}

impl RoadSegment {
    /// Whether this segment has anything worth flagging in a summary.
    pub fn has_issues(&self) -> bool {
        self.status != RoadStatus::Clear || self.chain_control_active()
    }

    /// Chain control is set and not "none".
    pub fn chain_control_active(&self) -> bool {
        is_active_chain_control(self.chain_control.as_deref())
    }
}

/// One weather observation point with its alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeatherLocation {
    pub name: String,
    /// Whole degrees Fahrenheit; absent when upstream gave no temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<i64>,
    pub condition: String,
    /// OpenWeatherMap icon code, e.g. "13d"
    pub icon: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_celsius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feels_like_celsius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed_kmh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_direction_degrees: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_main: Option<String>,
    pub alerts: Vec<Alert>,
}

fn eq_ignore_case(value: Option<&str>, expected: &str) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case(expected))
}

fn is_active_chain_control(chain_control: Option<&str>) -> bool {
    chain_control.is_some_and(|c| !c.trim().is_empty() && !c.trim().eq_ignore_ascii_case("none"))
}

/// Derive a road's display status. Rules are checked in order; first match wins.
///
/// A critical alert outranks plain delays: it signals road-blocking severity
/// even before upstream reports any delay minutes.
pub fn derive_road_status(road: &RawRecord<'_>, alerts: &[Alert]) -> RoadStatus {
    let raw_status = road.str("status");

    if eq_ignore_case(raw_status, "closed") {
        return RoadStatus::Closed;
    }
    if alerts.iter().any(|a| a.severity == Severity::Critical) {
        return RoadStatus::Restrictions;
    }
    if road.f64("delayMinutes").is_some_and(|d| d > 0.0) {
        return RoadStatus::Delays;
    }
    if is_active_chain_control(road.str("chainControl")) {
        return RoadStatus::Restrictions;
    }
    if eq_ignore_case(road.str("congestionLevel"), "clear") && eq_ignore_case(raw_status, "open") {
        return RoadStatus::Clear;
    }
    RoadStatus::Clear
}

/// Split a section like "Angels Camp to Murphys" into its endpoints.
///
/// Without a separator the road name is the origin and the destination is
/// the generic "Destination".
pub fn parse_section(section: Option<&str>, name: &str) -> (String, String) {
    let Some(section) = section.filter(|s| s.contains(SECTION_SEPARATOR)) else {
        return (name.to_string(), DEFAULT_DESTINATION.to_string());
    };

    let mut parts = section.split(SECTION_SEPARATOR);
    let from = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(name);
    let to = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_DESTINATION);
    (from.to_string(), to.to_string())
}

/// Build the display segment for one raw road record.
pub fn transform_road(road: &RawRecord<'_>) -> RoadSegment {
    let alerts = transform_alerts(road, AlertOrigin::Road);
    let status = derive_road_status(road, &alerts);
    let name = road.string("name").unwrap_or_default();
    let (from, to) = parse_section(road.str("section"), &name);

    let chain_control = road.string("chainControl");
    let description = chain_control
        .as_deref()
        .filter(|c| is_active_chain_control(Some(*c)))
        .map(|c| format!("Chain control: {}", c));

    RoadSegment {
        id: road.string("id"),
        name,
        from,
        to,
        status,
        delay_minutes: road.f64("delayMinutes"),
        description,
        alert_count: alerts.len(),
        alerts,
        congestion_level: road.string("congestionLevel"),
        duration_minutes: road.f64("durationMinutes"),
        distance_km: road.f64("distanceKm"),
        chain_control,
        chain_control_info: road
            .object("chainControlInfo")
            .and_then(|info| ChainControlInfo::from_raw(&info)),
        raw_status: road.string("status"),
        status_explanation: road.string("statusExplanation"),
    }
}

/// Build the display location for one raw weather record.
pub fn transform_weather(record: &RawRecord<'_>) -> WeatherLocation {
    let temperature_celsius = record.f64("temperatureCelsius");

    WeatherLocation {
        name: record.string("locationName").unwrap_or_default(),
        temperature: opt_celsius_to_fahrenheit(temperature_celsius),
        condition: record
            .first_str(&["weatherDescription", "weatherMain"])
            .unwrap_or_default()
            .to_string(),
        icon: record.string("weatherIcon").unwrap_or_default(),
        location_id: record.string("locationId"),
        temperature_celsius,
        feels_like_celsius: record.f64("feelsLikeCelsius"),
        humidity_percent: record.f64("humidityPercent"),
        wind_speed_kmh: record.f64("windSpeedKmh"),
        wind_direction_degrees: record.f64("windDirectionDegrees"),
        visibility_km: record.f64("visibilityKm"),
        weather_main: record.string("weatherMain"),
        alerts: transform_alerts(record, AlertOrigin::Weather),
    }
}
