//! Canonical alert model and the per-alert transformer.
//!
//! Every upstream alert, road or weather, becomes exactly one [`Alert`].
//! Each field is resolved by its own explicit fallback chain so behavior can
//! be audited (and tested) field by field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::services::raw::RawRecord;
use crate::services::severity::{
    normalize_classification, severity_of, Classification, Severity,
};

/// Title used when upstream supplies nothing usable.
pub const FALLBACK_TITLE: &str = "Alert";
/// Description used when upstream supplies nothing usable.
pub const FALLBACK_DESCRIPTION: &str = "No description available";

/// Which feed produced an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertOrigin {
    Road,
    Weather,
}

impl AlertOrigin {
    pub fn label(self) -> &'static str {
        match self {
            AlertOrigin::Road => "road",
            AlertOrigin::Weather => "weather",
        }
    }
}

/// A normalized alert.
///
/// `title` and `description` are always non-empty. Everything else optional
/// is omitted from JSON when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Upstream identifier, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Feed that produced this alert
    pub origin: AlertOrigin,
    pub severity: Severity,
    /// Relationship to the route, when upstream supplied a recognized value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Long-form text; may contain `**bold**` markup and blank-line paragraphs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condensed_summary: Option<String>,
    /// Place name, raw location string, or "lat, lon" (4 decimals)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
    /// ISO 8601, passed through unvalidated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// ISO 8601, passed through unvalidated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_to_route_meters: Option<f64>,
    /// Opaque provider-specific extras, shown as-is
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Map<String, Value>>,
}

/// Build the canonical alert for one raw upstream record.
pub fn transform_alert(raw: &RawRecord<'_>, origin: AlertOrigin) -> Alert {
    let title = raw
        .first_str(&["title", "event", "description"])
        .unwrap_or(FALLBACK_TITLE)
        .to_string();

    // summary is the curated short form; raw descriptions are often long legal text
    let description = raw
        .first_str(&["summary", "description", "title", "event"])
        .unwrap_or(FALLBACK_DESCRIPTION)
        .to_string();

    Alert {
        id: raw.string("id"),
        origin,
        severity: severity_of(raw),
        classification: normalize_classification(raw.str("classification")),
        title,
        description,
        headline: raw.string("headline"),
        summary: raw.string("summary"),
        details: raw.string("details"),
        condensed_summary: raw.string("condensedSummary"),
        location: resolve_location(raw),
        location_description: raw.string("locationDescription"),
        incident_type: raw.string("incidentType"),
        impact: raw.string("impact"),
        start_time: raw.string("startTime"),
        expected_end: raw.first_str(&["expectedEnd", "end"]).map(str::to_string),
        distance_to_route_meters: raw.f64("distanceToRouteMeters"),
        metadata: raw.map("metadata"),
    }
}

/// Transform every object in a record's `alerts` array.
pub fn transform_alerts(parent: &RawRecord<'_>, origin: AlertOrigin) -> Vec<Alert> {
    parent
        .records("alerts")
        .iter()
        .map(|raw| transform_alert(raw, origin))
        .collect()
}

/// Resolve `location` from a string, a named place, or coordinates.
fn resolve_location(raw: &RawRecord<'_>) -> Option<String> {
    if let Some(s) = raw.str("location") {
        return Some(s.to_string());
    }
    let loc = raw.object("location")?;
    if let Some(name) = loc.str("name") {
        return Some(name.to_string());
    }
    match (loc.f64("latitude"), loc.f64("longitude")) {
        (Some(lat), Some(lon)) => Some(format!("{:.4}, {:.4}", lat, lon)),
        _ => None,
    }
}
