//! Severity and classification normalization.
//!
//! Maps whatever the upstream providers put in their severity-ish and
//! classification fields onto two closed enums. Nothing in here can fail:
//! unrecognized input falls back to `Info` (severity) or `None`
//! (classification) so a third-party feed can never break the display.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::raw::RawRecord;

/// Canonical four-level alert severity, used for sorting and styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    Warning,
    Info,
    #[serde(alias = "ALERT_SEVERITY_UNSPECIFIED")]
    Unspecified,
}

impl Severity {
    /// Sort rank: lower is more severe.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::Warning => 1,
            Severity::Info => 2,
            Severity::Unspecified => 3,
        }
    }

    /// Lowercase label used in badges.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Unspecified => "unspecified",
        }
    }

    /// Exact (case-insensitive) match against the canonical tokens.
    fn from_token(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Some(Severity::Critical),
            "WARNING" => Some(Severity::Warning),
            "INFO" => Some(Severity::Info),
            "UNSPECIFIED" | "ALERT_SEVERITY_UNSPECIFIED" => Some(Severity::Unspecified),
            _ => None,
        }
    }
}

/// An alert's spatial relationship to the user's route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    OnRoute,
    Nearby,
    Distant,
    #[serde(alias = "ALERT_CLASSIFICATION_UNSPECIFIED")]
    Unspecified,
}

/// Raw fields that may carry a severity, in precedence order.
pub const SEVERITY_FIELDS: [&str; 4] = ["severity", "priority", "urgency", "level"];

/// Event keyword table, checked in order. First match wins.
const EVENT_KEYWORDS: &[(&[&str], Severity)] = &[
    (
        &[
            "emergency",
            "extreme",
            "tornado warning",
            "flash flood warning",
            "blizzard warning",
        ],
        Severity::Critical,
    ),
    (&["warning"], Severity::Warning),
    (&["watch"], Severity::Warning),
    (&["advisory", "statement"], Severity::Info),
];

/// Raw-value keyword table, checked in order. First match wins.
const RAW_KEYWORDS: &[(&[&str], Severity)] = &[
    (&["critical", "severe", "emergency"], Severity::Critical),
    (&["warning", "major", "high", "important"], Severity::Warning),
    (&["info", "advisory", "minor"], Severity::Info),
];

fn match_keywords(text: &str, table: &[(&[&str], Severity)]) -> Option<Severity> {
    let lower = text.to_lowercase();
    table
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| lower.contains(n)))
        .map(|(_, severity)| *severity)
}

/// Normalize a severity from the first non-empty raw value and optional event text.
///
/// Event keywords take precedence over the raw value: weather providers
/// frequently omit or misreport severity, while the event name follows a
/// standard taxonomy ("... Warning", "... Watch", "... Advisory").
pub fn normalize_severity(raw_value: Option<&str>, event_text: Option<&str>) -> Severity {
    if let Some(severity) = event_text
        .filter(|e| !e.trim().is_empty())
        .and_then(|e| match_keywords(e, EVENT_KEYWORDS))
    {
        return severity;
    }

    let Some(raw) = raw_value.filter(|r| !r.trim().is_empty()) else {
        return Severity::Info;
    };

    Severity::from_token(raw)
        .or_else(|| match_keywords(raw, RAW_KEYWORDS))
        .unwrap_or(Severity::Info)
}

/// Normalize the severity of a raw alert record.
pub fn severity_of(record: &RawRecord<'_>) -> Severity {
    normalize_severity(record.first_str(&SEVERITY_FIELDS), record.str("event"))
}

/// Accept a classification only when it names one of the canonical tokens.
pub fn normalize_classification(raw: Option<&str>) -> Option<Classification> {
    match raw?.trim().to_ascii_uppercase().as_str() {
        "ON_ROUTE" => Some(Classification::OnRoute),
        "NEARBY" => Some(Classification::Nearby),
        "DISTANT" => Some(Classification::Distant),
        "UNSPECIFIED" | "ALERT_CLASSIFICATION_UNSPECIFIED" => Some(Classification::Unspecified),
        _ => None,
    }
}
