//! Presentation helpers shared by the summary and detail views.
//!
//! Everything here is pure formatting over the snapshot types: status text,
//! tones (the semantic colour of a badge or card), chips, enum and timestamp
//! prettifying, and the lightweight `**bold**` markup used in alert details.

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::alerts::Alert;
use crate::services::severity::Severity;
use crate::services::status::{RoadSegment, RoadStatus};

/// Delay (minutes) above which a compact summary shows a road in red.
const SEVERE_DELAY_MINUTES: f64 = 15.0;

/// Characters left unescaped by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const MAP_SEARCH_URL: &str = "https://www.google.com/maps/search/?api=1&query=";

/// Semantic colour of a badge, card, or counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Success,
    Info,
    Warning,
    Danger,
    Muted,
}

impl From<Severity> for Tone {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Critical => Tone::Danger,
            Severity::Warning => Tone::Warning,
            Severity::Info | Severity::Unspecified => Tone::Info,
        }
    }
}

/// A small labelled badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Chip {
    pub label: String,
    pub tone: Tone,
}

impl Chip {
    fn new(label: impl Into<String>, tone: Tone) -> Self {
        Self {
            label: label.into(),
            tone,
        }
    }
}

/// Kind of pictogram for a weather condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WeatherIcon {
    Sun,
    Cloud,
    Drizzle,
    Rain,
    Thunder,
    Snow,
    Mist,
}

/// Map an OpenWeatherMap icon code ("01d", "13n", ...) to a pictogram.
///
/// Unknown codes show a cloud.
pub fn weather_icon(code: &str) -> WeatherIcon {
    match code.get(..2) {
        Some("01") => WeatherIcon::Sun,
        Some("02" | "03" | "04") => WeatherIcon::Cloud,
        Some("09") => WeatherIcon::Drizzle,
        Some("10") => WeatherIcon::Rain,
        Some("11") => WeatherIcon::Thunder,
        Some("13") => WeatherIcon::Snow,
        Some("50") => WeatherIcon::Mist,
        _ => WeatherIcon::Cloud,
    }
}

/// Short status text for a road segment ("12 min delays", "Closed", ...).
pub fn road_status_text(segment: &RoadSegment) -> String {
    match segment.status {
        RoadStatus::Clear => "Clear".to_string(),
        RoadStatus::Delays => match segment.delay_minutes.filter(|d| *d > 0.0) {
            Some(minutes) => format!("{} min delays", minutes),
            None => "Delays".to_string(),
        },
        RoadStatus::Restrictions => "Restrictions".to_string(),
        RoadStatus::Closed => "Closed".to_string(),
    }
}

/// Tone of a road in the compact conditions summary.
pub fn road_status_tone(segment: &RoadSegment) -> Tone {
    let delay = segment.delay_minutes.unwrap_or(0.0);
    if segment.status == RoadStatus::Closed || delay > SEVERE_DELAY_MINUTES {
        Tone::Danger
    } else if segment.status != RoadStatus::Clear || delay > 0.0 || segment.chain_control_active() {
        Tone::Warning
    } else {
        Tone::Success
    }
}

/// Tone of an upstream status badge ("CLOSED", "RESTRICTED", "OPEN").
pub fn raw_status_tone(raw_status: Option<&str>) -> Tone {
    let Some(status) = raw_status else {
        return Tone::Muted;
    };
    match status.to_lowercase().as_str() {
        "closed" => Tone::Danger,
        "restricted" | "restrictions" => Tone::Warning,
        _ => Tone::Success,
    }
}

/// Worst tone across a set of alerts.
pub fn alert_count_tone<'a>(alerts: impl IntoIterator<Item = &'a Alert>) -> Tone {
    let mut worst = Tone::Info;
    for alert in alerts {
        match alert.severity {
            Severity::Critical => return Tone::Danger,
            Severity::Warning => worst = Tone::Warning,
            Severity::Info | Severity::Unspecified => {}
        }
    }
    worst
}

/// Prettify an upstream enum token: "LANE_CLOSURE" → "Lane closure",
/// "heavyTraffic" → "Heavy traffic". "restricted" reads as "Restrictions".
pub fn format_enum_value(value: &str) -> String {
    let mut spaced = String::with_capacity(value.len() + 4);
    let mut prev: Option<char> = None;
    for c in value.chars() {
        if c == '_' {
            spaced.push(' ');
        } else {
            if c.is_ascii_uppercase() && prev.is_some_and(|p| p.is_ascii_lowercase()) {
                spaced.push(' ');
            }
            spaced.push(c);
        }
        prev = Some(c);
    }

    let lower = spaced.to_lowercase();
    let trimmed = lower.trim();
    if trimmed == "restricted" {
        return "Restrictions".to_string();
    }

    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Human-friendly timestamp relative to `now`.
///
/// Recent past times read as "Just now" / "5 min ago" / "3 hours ago" /
/// "2 days ago"; anything else falls back to a clock or calendar form in the
/// zone `now` carries. Unparsable input is returned unchanged.
pub fn format_human_time(timestamp: &str, now: DateTime<Tz>) -> String {
    if timestamp.is_empty() {
        return String::new();
    }
    let Ok(parsed) = DateTime::parse_from_rfc3339(timestamp) else {
        return timestamp.to_string();
    };
    let when = parsed.with_timezone(&Utc);

    let diff = now.with_timezone(&Utc) - when;
    if diff.num_milliseconds() > 0 {
        let minutes = diff.num_minutes();
        let hours = minutes / 60;
        let days = hours / 24;
        if minutes < 60 {
            return if minutes <= 1 {
                "Just now".to_string()
            } else {
                format!("{} min ago", minutes)
            };
        }
        if hours < 24 {
            return format!("{} hour{} ago", hours, if hours > 1 { "s" } else { "" });
        }
        if days < 7 {
            return format!("{} day{} ago", days, if days > 1 { "s" } else { "" });
        }
    }

    let local = when.with_timezone(&now.timezone());
    if local.date_naive() == now.date_naive() {
        local.format("%-I:%M %p").to_string()
    } else if local.year() == now.year() {
        local.format("%b %-d, %-I:%M %p").to_string()
    } else {
        local.format("%b %-d, %Y, %-I:%M %p").to_string()
    }
}

/// Format a metadata value for a chip. Returns `None` for values not worth
/// showing ("", "none", "n/a").
pub fn format_metadata_value(value: &serde_json::Value, now: DateTime<Tz>) -> Option<String> {
    let raw = match value {
        serde_json::Value::Null => return None,
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let formatted = if looks_like_iso_timestamp(&raw) {
        format_human_time(&raw, now)
    } else {
        format_enum_value(&raw)
    };

    let lower = formatted.to_lowercase();
    if formatted.is_empty() || lower == "none" || lower == "n/a" {
        None
    } else {
        Some(formatted)
    }
}

/// Prettify a camelCase / snake_case metadata key.
pub fn format_metadata_key(key: &str) -> String {
    format_enum_value(key)
}

fn looks_like_iso_timestamp(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 19
        && b[..4].iter().all(u8::is_ascii_digit)
        && b[4] == b'-'
        && b[5..7].iter().all(u8::is_ascii_digit)
        && b[7] == b'-'
        && b[8..10].iter().all(u8::is_ascii_digit)
        && b[10] == b'T'
        && b[11..13].iter().all(u8::is_ascii_digit)
        && b[13] == b':'
        && b[14..16].iter().all(u8::is_ascii_digit)
        && b[16] == b':'
        && b[17..19].iter().all(u8::is_ascii_digit)
}

/// Known chain-control level, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ChainControlLevel {
    pub label: String,
    pub tone: Tone,
    pub description: String,
}

impl ChainControlLevel {
    fn new(label: &str, tone: Tone, description: &str) -> Self {
        Self {
            label: label.to_string(),
            tone,
            description: description.to_string(),
        }
    }
}

/// Whether an upstream chain-control level means controls are in effect.
pub fn chain_control_in_effect(level: &str) -> bool {
    !matches!(
        level,
        "CHAIN_CONTROL_LEVEL_NONE" | "CHAIN_CONTROL_LEVEL_UNSPECIFIED"
    )
}

/// Label and meaning of an R1/R2/R3 chain-control level.
pub fn chain_control_display(level: &str) -> Option<ChainControlLevel> {
    match level {
        "CHAIN_CONTROL_LEVEL_R1" => Some(ChainControlLevel::new(
            "R1",
            Tone::Warning,
            "Chains required except for vehicles with snow tires",
        )),
        "CHAIN_CONTROL_LEVEL_R2" => Some(ChainControlLevel::new(
            "R2",
            Tone::Warning,
            "Chains required except 4WD/AWD with snow tires on all wheels",
        )),
        "CHAIN_CONTROL_LEVEL_R3" => Some(ChainControlLevel::new(
            "R3",
            Tone::Danger,
            "Chains required on all vehicles, no exceptions",
        )),
        _ => None,
    }
}

/// Incident-type chip, falling back to a severity chip.
pub fn incident_chip(alert: &Alert) -> Chip {
    let kind = alert
        .incident_type
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| kind.contains(n));

    if has(&["closure", "closed"]) {
        Chip::new("Closure", Tone::Danger)
    } else if has(&["construction", "work"]) {
        Chip::new("Construction", Tone::Warning)
    } else if has(&["hazard", "debris"]) {
        Chip::new("Hazard", Tone::Warning)
    } else if has(&["weather", "snow", "ice"]) {
        Chip::new("Weather", Tone::Info)
    } else if has(&["vehicle", "accident", "collision"]) {
        Chip::new("Incident", Tone::Warning)
    } else {
        match alert.severity {
            Severity::Critical => Chip::new("Critical", Tone::Danger),
            Severity::Warning => Chip::new("Warning", Tone::Warning),
            Severity::Info | Severity::Unspecified => Chip::new("Info", Tone::Info),
        }
    }
}

/// Traffic-impact chip.
pub fn impact_chip(impact: Option<&str>) -> Option<Chip> {
    let impact = impact.filter(|i| !i.is_empty())?;
    let lower = impact.to_lowercase();
    let chip = if lower.contains("severe") || lower.contains("major") {
        Chip::new("Severe impact", Tone::Danger)
    } else if lower.contains("moderate") {
        Chip::new("Moderate impact", Tone::Warning)
    } else if lower.contains("light") || lower.contains("minor") {
        Chip::new("Light impact", Tone::Info)
    } else {
        Chip::new(format_enum_value(impact), Tone::Muted)
    };
    Some(chip)
}

/// Distance from the route, in friendly imperial units.
pub fn format_distance_to_route(meters: Option<f64>) -> Option<String> {
    let meters = meters.filter(|m| *m != 0.0)?;
    let miles = meters * 0.000621371;
    Some(if miles < 0.1 {
        "Very close".to_string()
    } else if miles < 1.0 {
        format!("{:.0} ft away", miles * 5280.0)
    } else {
        format!("{:.1} mi away", miles)
    })
}

/// Google Maps search link for a free-text location.
pub fn map_search_url(query: &str) -> String {
    format!(
        "{}{}",
        MAP_SEARCH_URL,
        utf8_percent_encode(query, URI_COMPONENT)
    )
}

/// A run of text, optionally bold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TextSpan {
    pub text: String,
    pub bold: bool,
}

/// One paragraph of formatted details: lines, each made of spans.
pub type Paragraph = Vec<Vec<TextSpan>>;

/// Split alert details into paragraphs (blank line), lines (`\n`), and
/// `**bold**` spans.
pub fn format_details(details: &str) -> Vec<Paragraph> {
    details
        .split("\n\n")
        .map(|paragraph| paragraph.split('\n').map(parse_bold_spans).collect())
        .collect()
}

/// Split a line on `**...**` markers. Markers only pair up around non-empty
/// text without asterisks; anything else stays literal.
fn parse_bold_spans(line: &str) -> Vec<TextSpan> {
    let mut spans = Vec::new();
    let mut plain = String::new();
    let mut rest = line;

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        let close = after
            .find('*')
            .filter(|&end| end > 0 && after[end..].starts_with("**"));
        match close {
            Some(end) => {
                plain.push_str(&rest[..start]);
                if !plain.is_empty() {
                    spans.push(TextSpan {
                        text: std::mem::take(&mut plain),
                        bold: false,
                    });
                }
                spans.push(TextSpan {
                    text: after[..end].to_string(),
                    bold: true,
                });
                rest = &after[end + 2..];
            }
            None => {
                plain.push_str(&rest[..start + 1]);
                rest = &rest[start + 1..];
            }
        }
    }
    plain.push_str(rest);
    if !plain.is_empty() || spans.is_empty() {
        spans.push(TextSpan {
            text: plain,
            bold: false,
        });
    }
    spans
}
