//! Detail-view HTTP endpoints.
//!
//! - GET /api/v1/conditions/roads/:index
//! - GET /api/v1/conditions/weather/:index
//! - GET /api/v1/conditions/alerts/:index
//!
//! Indexes refer to positions in the current snapshot's `roads`, `weather`
//! and (sorted) `alerts` lists.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::{AppError, ErrorResponse};
use crate::helpers::{
    average_speed_mph, km_to_miles, kmh_to_mph, opt_celsius_to_fahrenheit, round_half_up,
    wind_direction,
};
use crate::routes::conditions::current_snapshot;
use crate::services::alerts::Alert;
use crate::services::display::{
    alert_count_tone, chain_control_display, chain_control_in_effect, format_details,
    format_distance_to_route, format_enum_value, format_human_time, format_metadata_key,
    format_metadata_value, impact_chip, incident_chip, map_search_url, raw_status_tone,
    weather_icon, ChainControlLevel, Chip, TextSpan, Tone, WeatherIcon,
};
use crate::services::poller::SnapshotReceiver;
use crate::services::severity::{Classification, Severity};
use crate::services::status::{ChainControlInfo, RoadSegment, WeatherLocation};

// ---------------------------------------------------------------------------
// Shared pieces
// ---------------------------------------------------------------------------

/// Alert body: `details` markup when present, else the plain description.
fn alert_body(alert: &Alert) -> Vec<Vec<Vec<TextSpan>>> {
    match alert.details.as_deref() {
        Some(details) => format_details(details),
        None => vec![vec![vec![TextSpan {
            text: alert.description.clone(),
            bold: false,
        }]]],
    }
}

fn critical_or(alert: &Alert, otherwise: Tone) -> Tone {
    if alert.severity == Severity::Critical {
        Tone::Danger
    } else {
        otherwise
    }
}

/// An alert as shown inside the route details view.
#[derive(Debug, Serialize, ToSchema)]
pub struct AlertCard {
    pub alert: Alert,
    pub tone: Tone,
    /// Location with incident type, or the title
    pub heading: String,
    /// Human-friendly start time
    pub started: Option<String>,
    /// Distance from the route, for alerts not on it
    pub distance: Option<String>,
    pub incident: Chip,
    pub impact: Option<Chip>,
    /// Formatted metadata values worth showing
    pub metadata_chips: Vec<String>,
    pub map_url: Option<String>,
}

impl AlertCard {
    fn new(alert: &Alert, tone: Tone, now: DateTime<Tz>) -> Self {
        let heading = match alert.location_description.as_deref() {
            Some(location) => match alert.incident_type.as_deref() {
                Some(kind) => format!("{} ({})", location, format_enum_value(kind)),
                None => location.to_string(),
            },
            None => alert.title.clone(),
        };

        let distance = if alert.classification == Some(Classification::OnRoute) {
            None
        } else {
            format_distance_to_route(alert.distance_to_route_meters)
        };

        let metadata_chips = alert
            .metadata
            .iter()
            .flat_map(|m| m.values())
            .filter_map(|v| format_metadata_value(v, now))
            .collect();

        Self {
            tone,
            heading,
            started: alert.start_time.as_deref().map(|t| format_human_time(t, now)),
            distance,
            incident: incident_chip(alert),
            impact: impact_chip(alert.impact.as_deref()),
            metadata_chips,
            map_url: alert.location.as_deref().map(map_search_url),
            alert: alert.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Route details
// ---------------------------------------------------------------------------

/// Active chain control, as shown on a route.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChainControlCard {
    /// Upstream level, e.g. "CHAIN_CONTROL_LEVEL_R2"
    pub level: String,
    pub display: Option<ChainControlLevel>,
    pub description: Option<String>,
    /// Location name with direction, e.g. "Arnold (Eastbound)"
    pub location: Option<String>,
    pub map_url: Option<String>,
    pub effective: Option<String>,
}

impl ChainControlCard {
    /// `None` when no chain control is in effect.
    fn from_info(info: &ChainControlInfo, now: DateTime<Tz>) -> Option<Self> {
        if !chain_control_in_effect(&info.level) {
            return None;
        }
        let display = chain_control_display(&info.level);

        let location = info.location_name.as_ref().map(|name| match &info.direction {
            Some(direction) => format!("{} ({})", name, direction),
            None => name.clone(),
        });
        let map_url = match (info.latitude, info.longitude) {
            (Some(lat), Some(lon)) if location.is_some() && lat != 0.0 && lon != 0.0 => {
                Some(map_search_url(&format!("{},{}", lat, lon)))
            }
            _ => None,
        };

        Some(Self {
            level: info.level.clone(),
            description: info
                .description
                .clone()
                .or_else(|| display.as_ref().map(|d| d.description.clone())),
            display,
            location,
            map_url,
            effective: info.effective_time.as_deref().map(|t| format_human_time(t, now)),
        })
    }
}

/// Distance / speed / duration stats for a route.
#[derive(Debug, Serialize, ToSchema)]
pub struct RouteStats {
    pub miles: Option<i64>,
    pub avg_mph: Option<i64>,
    /// e.g. "~15"
    pub minutes: Option<String>,
}

/// Route details view.
#[derive(Debug, Serialize, ToSchema)]
pub struct RouteDetails {
    pub name: String,
    pub from: String,
    pub to: String,
    /// Upstream status badge ("Open", "Closed", ...)
    pub status_badge: Option<Chip>,
    /// Only set when positive
    pub delay_minutes: Option<f64>,
    /// e.g. "Heavy traffic"
    pub congestion: Option<String>,
    pub status_explanation: Option<String>,
    pub stats: RouteStats,
    pub chain_control: Option<ChainControlCard>,
    /// Alerts classified as on the route
    pub on_route: Vec<AlertCard>,
    /// Nearby alerts, most severe first
    pub nearby: Vec<AlertCard>,
}

impl RouteDetails {
    pub fn from_segment(segment: &RoadSegment, now: DateTime<Tz>) -> Self {
        let on_route = segment
            .alerts
            .iter()
            .filter(|a| a.classification == Some(Classification::OnRoute))
            .map(|a| AlertCard::new(a, critical_or(a, Tone::Warning), now))
            .collect();

        let mut nearby: Vec<&Alert> = segment
            .alerts
            .iter()
            .filter(|a| a.classification == Some(Classification::Nearby))
            .collect();
        nearby.sort_by_key(|a| a.severity.rank());
        let nearby = nearby
            .into_iter()
            .map(|a| AlertCard::new(a, critical_or(a, Tone::Muted), now))
            .collect();

        let positive = |v: Option<f64>| v.filter(|x| *x > 0.0);
        let stats = RouteStats {
            miles: positive(segment.distance_km).map(km_to_miles),
            avg_mph: average_speed_mph(segment.distance_km, segment.duration_minutes),
            minutes: positive(segment.duration_minutes)
                .map(|m| format!("~{}", round_half_up(m))),
        };

        Self {
            name: segment.name.clone(),
            from: segment.from.clone(),
            to: segment.to.clone(),
            status_badge: segment.raw_status.as_deref().map(|s| Chip {
                label: format_enum_value(s),
                tone: raw_status_tone(Some(s)),
            }),
            delay_minutes: positive(segment.delay_minutes),
            congestion: segment
                .congestion_level
                .as_deref()
                .map(|c| format!("{} traffic", format_enum_value(c))),
            status_explanation: segment.status_explanation.clone(),
            stats,
            chain_control: segment
                .chain_control_info
                .as_ref()
                .and_then(|info| ChainControlCard::from_info(info, now)),
            on_route,
            nearby,
        }
    }
}

// ---------------------------------------------------------------------------
// Weather details
// ---------------------------------------------------------------------------

/// An alert as shown inside the weather details view.
#[derive(Debug, Serialize, ToSchema)]
pub struct WeatherAlertCard {
    pub alert: Alert,
    pub tone: Tone,
    /// Paragraphs of lines of spans
    pub body: Vec<Vec<Vec<TextSpan>>>,
}

impl WeatherAlertCard {
    fn new(alert: &Alert) -> Self {
        Self {
            tone: critical_or(alert, Tone::Warning),
            body: alert_body(alert),
            alert: alert.clone(),
        }
    }
}

/// Weather details view.
#[derive(Debug, Serialize, ToSchema)]
pub struct WeatherDetails {
    pub name: String,
    pub condition: String,
    pub icon: WeatherIcon,
    /// °F
    pub temperature: Option<i64>,
    /// °F
    pub feels_like: Option<i64>,
    pub humidity_percent: Option<f64>,
    /// "Wind NNE", or "Wind" without a direction
    pub wind_label: String,
    pub wind_mph: Option<i64>,
    /// Alerts classified as on the route
    pub route_alerts: Vec<WeatherAlertCard>,
    /// Everything else
    pub area_alerts: Vec<WeatherAlertCard>,
    pub area_tone: Tone,
}

impl WeatherDetails {
    pub fn from_location(location: &WeatherLocation) -> Self {
        let (route, area): (Vec<&Alert>, Vec<&Alert>) = location
            .alerts
            .iter()
            .partition(|a| a.classification == Some(Classification::OnRoute));

        let area_tone = alert_count_tone(area.iter().copied());

        let wind_label = match location.wind_direction_degrees {
            Some(deg) => format!("Wind {}", wind_direction(deg)),
            None => "Wind".to_string(),
        };

        Self {
            name: location.name.clone(),
            condition: location.condition.clone(),
            icon: weather_icon(&location.icon),
            temperature: location.temperature,
            feels_like: opt_celsius_to_fahrenheit(location.feels_like_celsius),
            humidity_percent: location.humidity_percent,
            wind_label,
            wind_mph: location.wind_speed_kmh.map(kmh_to_mph),
            route_alerts: route.into_iter().map(WeatherAlertCard::new).collect(),
            area_alerts: area.into_iter().map(WeatherAlertCard::new).collect(),
            area_tone,
        }
    }
}

// ---------------------------------------------------------------------------
// Alert details
// ---------------------------------------------------------------------------

/// One metadata row in the alert details view.
#[derive(Debug, Serialize, ToSchema)]
pub struct MetadataEntry {
    /// Prettified key, e.g. "Lanes affected"
    pub key: String,
    pub value: String,
}

/// Alert details view.
#[derive(Debug, Serialize, ToSchema)]
pub struct AlertDetails {
    pub alert: Alert,
    pub tone: Tone,
    pub critical: bool,
    /// Lowercase severity, e.g. "warning"
    pub severity_label: String,
    /// e.g. "Moderate impact"
    pub impact_label: Option<String>,
    /// "Road" or "Weather"
    pub origin_label: String,
    pub body: Vec<Vec<Vec<TextSpan>>>,
    pub started: Option<String>,
    pub expected_end: Option<String>,
    pub location_description: Option<String>,
    pub map_url: Option<String>,
    pub metadata: Vec<MetadataEntry>,
}

impl AlertDetails {
    pub fn from_alert(alert: &Alert, now: DateTime<Tz>) -> Self {
        let metadata = alert
            .metadata
            .iter()
            .flat_map(|m| m.iter())
            .filter_map(|(key, value)| {
                let value = match value {
                    serde_json::Value::Null => return None,
                    serde_json::Value::String(s) if s.is_empty() => return None,
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some(MetadataEntry {
                    key: format_metadata_key(key),
                    value,
                })
            })
            .collect();

        Self {
            tone: Tone::from(alert.severity),
            critical: alert.severity == Severity::Critical,
            severity_label: alert.severity.label().to_string(),
            impact_label: alert.impact.as_deref().map(|i| format!("{} impact", i)),
            origin_label: alert.origin.label().to_string(),
            body: alert_body(alert),
            started: alert.start_time.as_deref().map(|t| format_human_time(t, now)),
            expected_end: alert.expected_end.as_deref().map(|t| format_human_time(t, now)),
            location_description: alert.location_description.clone(),
            map_url: alert.location.as_deref().map(map_search_url),
            metadata,
            alert: alert.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn out_of_range(kind: &str, index: usize, len: usize) -> AppError {
    AppError::NotFound(format!("No {} at index {} ({} available)", kind, index, len))
}

/// Get the details view for one road segment.
#[utoipa::path(
    get,
    path = "/api/v1/conditions/roads/{index}",
    tag = "Conditions",
    params(("index" = usize, Path, description = "Position in the snapshot's roads list")),
    responses(
        (status = 200, description = "Route details", body = RouteDetails),
        (status = 404, description = "Index out of range", body = ErrorResponse),
        (status = 503, description = "No snapshot loaded yet", body = ErrorResponse),
    )
)]
pub async fn get_route_details(
    State(snapshot): State<SnapshotReceiver>,
    Extension(zone): Extension<Tz>,
    Path(index): Path<usize>,
) -> Result<Json<RouteDetails>, AppError> {
    let data = current_snapshot(&snapshot)?;
    let segment = data
        .roads
        .get(index)
        .ok_or_else(|| out_of_range("road", index, data.roads.len()))?;
    Ok(Json(RouteDetails::from_segment(
        segment,
        Utc::now().with_timezone(&zone),
    )))
}

/// Get the details view for one weather location.
#[utoipa::path(
    get,
    path = "/api/v1/conditions/weather/{index}",
    tag = "Conditions",
    params(("index" = usize, Path, description = "Position in the snapshot's weather list")),
    responses(
        (status = 200, description = "Weather details", body = WeatherDetails),
        (status = 404, description = "Index out of range", body = ErrorResponse),
        (status = 503, description = "No snapshot loaded yet", body = ErrorResponse),
    )
)]
pub async fn get_weather_details(
    State(snapshot): State<SnapshotReceiver>,
    Path(index): Path<usize>,
) -> Result<Json<WeatherDetails>, AppError> {
    let data = current_snapshot(&snapshot)?;
    let location = data
        .weather
        .get(index)
        .ok_or_else(|| out_of_range("weather location", index, data.weather.len()))?;
    Ok(Json(WeatherDetails::from_location(location)))
}

/// Get the details view for one alert in the global (sorted) list.
#[utoipa::path(
    get,
    path = "/api/v1/conditions/alerts/{index}",
    tag = "Conditions",
    params(("index" = usize, Path, description = "Position in the snapshot's alerts list")),
    responses(
        (status = 200, description = "Alert details", body = AlertDetails),
        (status = 404, description = "Index out of range", body = ErrorResponse),
        (status = 503, description = "No snapshot loaded yet", body = ErrorResponse),
    )
)]
pub async fn get_alert_details(
    State(snapshot): State<SnapshotReceiver>,
    Extension(zone): Extension<Tz>,
    Path(index): Path<usize>,
) -> Result<Json<AlertDetails>, AppError> {
    let data = current_snapshot(&snapshot)?;
    let alert = data
        .alerts
        .get(index)
        .ok_or_else(|| out_of_range("alert", index, data.alerts.len()))?;
    Ok(Json(AlertDetails::from_alert(
        alert,
        Utc::now().with_timezone(&zone),
    )))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::alerts::{transform_alert, AlertOrigin};
    use crate::services::raw::RawRecord;
    use crate::services::snapshot::build_snapshot_at;
    use crate::services::status::transform_road;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::watch;

    fn now() -> DateTime<Utc> {
        "2026-01-15T08:00:00Z".parse().unwrap()
    }

    fn local_now() -> DateTime<Tz> {
        now().with_timezone(&Tz::UTC)
    }

    fn road(v: serde_json::Value) -> RoadSegment {
        transform_road(&RawRecord::from_value(&v).unwrap())
    }

    fn alert(v: serde_json::Value, origin: AlertOrigin) -> Alert {
        transform_alert(&RawRecord::from_value(&v).unwrap(), origin)
    }

    #[test]
    fn test_route_details_splits_and_sorts_alerts() {
        let segment = road(json!({
            "name": "SR-4",
            "section": "Arnold to Bear Valley",
            "status": "RESTRICTED",
            "alerts": [
                { "title": "Lane work", "severity": "INFO", "classification": "NEARBY",
                  "distanceToRouteMeters": 800 },
                { "title": "Spinout", "severity": "CRITICAL", "classification": "ON_ROUTE",
                  "locationDescription": "Near Dorrington", "incidentType": "COLLISION",
                  "distanceToRouteMeters": 5 },
                { "title": "Rockslide", "severity": "WARNING", "classification": "NEARBY",
                  "location": "38.4, -120.2" },
                { "title": "Far away", "severity": "WARNING", "classification": "DISTANT" }
            ]
        }));

        let details = RouteDetails::from_segment(&segment, local_now());

        assert_eq!(details.on_route.len(), 1);
        let card = &details.on_route[0];
        assert_eq!(card.heading, "Near Dorrington (Collision)");
        assert_eq!(card.tone, Tone::Danger);
        assert_eq!(card.incident.label, "Incident");
        assert!(card.distance.is_none());

        let nearby: Vec<&str> = details.nearby.iter().map(|c| c.heading.as_str()).collect();
        assert_eq!(nearby, vec!["Rockslide", "Lane work"]);
        assert_eq!(details.nearby[0].tone, Tone::Muted);
        assert!(details.nearby[0].map_url.as_deref().unwrap().ends_with("38.4%2C%20-120.2"));
        assert_eq!(details.nearby[1].distance.as_deref(), Some("2625 ft away"));

        let badge = details.status_badge.unwrap();
        assert_eq!(badge.label, "Restrictions");
        assert_eq!(badge.tone, Tone::Warning);
    }

    #[test]
    fn test_route_details_stats_and_header() {
        let segment = road(json!({
            "name": "SR-4",
            "section": "Angels Camp to Murphys",
            "durationMinutes": 15,
            "distanceKm": 13.5,
            "delayMinutes": 0,
            "congestionLevel": "HEAVY"
        }));
        let details = RouteDetails::from_segment(&segment, local_now());
        assert_eq!(details.stats.miles, Some(8));
        assert_eq!(details.stats.avg_mph, Some(34));
        assert_eq!(details.stats.minutes.as_deref(), Some("~15"));
        assert_eq!(details.delay_minutes, None);
        assert_eq!(details.congestion.as_deref(), Some("Heavy traffic"));
        assert!(details.chain_control.is_none());
    }

    #[test]
    fn test_route_details_chain_control_card() {
        let segment = road(json!({
            "name": "SR-4",
            "chainControl": "R2",
            "chainControlInfo": {
                "level": "CHAIN_CONTROL_LEVEL_R2",
                "locationName": "Cottage Springs",
                "direction": "Eastbound",
                "latitude": 38.37,
                "longitude": -120.19
            }
        }));
        let card = RouteDetails::from_segment(&segment, local_now()).chain_control.unwrap();
        assert_eq!(card.display.unwrap().label, "R2");
        assert!(card.description.unwrap().contains("4WD/AWD"));
        assert_eq!(card.location.as_deref(), Some("Cottage Springs (Eastbound)"));
        assert!(card.map_url.unwrap().ends_with("38.37%2C-120.19"));
    }

    #[test]
    fn test_inactive_chain_control_hidden() {
        let segment = road(json!({
            "name": "SR-4",
            "chainControlInfo": { "level": "CHAIN_CONTROL_LEVEL_NONE" }
        }));
        assert!(RouteDetails::from_segment(&segment, local_now()).chain_control.is_none());
    }

    #[test]
    fn test_alert_card_ignores_feed_type() {
        let a = alert(
            json!({
                "type": "weather",
                "title": "Winter Storm Warning",
                "severity": "WARNING",
                "locationDescription": "Arnold"
            }),
            AlertOrigin::Road,
        );

        let card = AlertCard::new(&a, Tone::Warning, local_now());
        assert_eq!(card.heading, "Arnold");
        assert_eq!(card.incident.label, "Warning");
    }

    #[test]
    fn test_weather_details() {
        let data = build_snapshot_at(
            &json!({ "roads": [] }),
            &json!({ "weatherData": [{
                "locationName": "Arnold",
                "temperatureCelsius": -2,
                "feelsLikeCelsius": -6,
                "humidityPercent": 85,
                "windSpeedKmh": 24,
                "windDirectionDegrees": 30,
                "weatherIcon": "13n",
                "alerts": [
                    { "event": "Winter Storm Warning", "classification": "ON_ROUTE",
                      "details": "**WHAT** Heavy snow.\nUp to 2 feet." },
                    { "event": "Wind Advisory", "description": "Gusty winds" }
                ]
            }]}),
            now(),
        )
        .unwrap();

        let details = WeatherDetails::from_location(&data.weather[0]);
        assert_eq!(details.temperature, Some(28));
        assert_eq!(details.feels_like, Some(21));
        assert_eq!(details.wind_label, "Wind NNE");
        assert_eq!(details.wind_mph, Some(15));
        assert_eq!(details.icon, WeatherIcon::Snow);

        assert_eq!(details.route_alerts.len(), 1);
        assert_eq!(details.route_alerts[0].body[0].len(), 2);
        assert!(details.route_alerts[0].body[0][0][0].bold);

        assert_eq!(details.area_alerts.len(), 1);
        assert_eq!(details.area_alerts[0].body[0][0][0].text, "Gusty winds");
        assert_eq!(details.area_tone, Tone::Info);
    }

    #[test]
    fn test_alert_details() {
        let a = alert(
            json!({
                "title": "Full closure",
                "severity": "CRITICAL",
                "impact": "SEVERE",
                "description": "Road closed",
                "startTime": "2026-01-15T06:00:00Z",
                "location": "38.2, -120.3",
                "locationDescription": "Near Hathaway Pines",
                "metadata": { "lanesAffected": "ALL", "detourRoute": "", "notes": null, "count": 2 }
            }),
            AlertOrigin::Road,
        );

        let details = AlertDetails::from_alert(&a, local_now());
        assert!(details.critical);
        assert_eq!(details.tone, Tone::Danger);
        assert_eq!(details.severity_label, "critical");
        assert_eq!(details.impact_label.as_deref(), Some("SEVERE impact"));
        assert_eq!(details.origin_label, AlertOrigin::Road.label());
        assert_eq!(details.started.as_deref(), Some("2 hours ago"));
        assert_eq!(details.body[0][0][0].text, "Road closed");
        assert!(details.map_url.is_some());

        let keys: Vec<&str> = details.metadata.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["Count", "Lanes affected"]);
        assert_eq!(details.metadata[1].value, "ALL");
    }

    #[tokio::test]
    async fn test_handlers_index_out_of_range() {
        let data = build_snapshot_at(
            &json!({ "roads": [{ "name": "SR-4" }] }),
            &json!({ "weatherData": [] }),
            now(),
        )
        .unwrap();
        let (tx, rx) = watch::channel(None);
        tx.send_replace(Some(Arc::new(data)));

        assert!(get_route_details(State(rx.clone()), Extension(Tz::UTC), Path(0)).await.is_ok());
        assert!(matches!(
            get_route_details(State(rx.clone()), Extension(Tz::UTC), Path(1)).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            get_weather_details(State(rx.clone()), Path(0)).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            get_alert_details(State(rx), Extension(Tz::UTC), Path(0)).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_handlers_unavailable_without_snapshot() {
        let (_tx, rx) = watch::channel(None);
        assert!(matches!(
            get_alert_details(State(rx), Extension(Tz::UTC), Path(0)).await,
            Err(AppError::Unavailable)
        ));
    }
}
