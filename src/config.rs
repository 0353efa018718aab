use std::time::Duration;

use chrono_tz::Tz;

const DEFAULT_UPSTREAM_BASE_URL: &str = "https://info.ersn.net";
const DEFAULT_USER_AGENT: &str = "RoadWeatherStatus/0.1 (+https://info.ersn.net)";
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 900;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_DISPLAY_TIMEZONE: Tz = Tz::America__Los_Angeles;

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL serving both the roads and weather feeds.
    pub upstream_base_url: String,
    pub upstream_user_agent: String,
    pub refresh_interval: Duration,
    pub request_timeout: Duration,
    pub port: u16,
    pub log_format: LogFormat,
    /// IANA zone for clock and calendar forms in display views.
    pub display_timezone: Tz,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            upstream_base_url: std::env::var("UPSTREAM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_UPSTREAM_BASE_URL.to_string()),
            upstream_user_agent: std::env::var("UPSTREAM_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            refresh_interval: Duration::from_secs(positive_secs(
                "REFRESH_INTERVAL_SECS",
                DEFAULT_REFRESH_INTERVAL_SECS,
            )),
            request_timeout: Duration::from_secs(positive_secs(
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("PORT must be a valid u16"),
            log_format: match std::env::var("LOG_FORMAT") {
                Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            display_timezone: match std::env::var("DISPLAY_TIMEZONE") {
                Ok(v) => v
                    .parse()
                    .expect("DISPLAY_TIMEZONE must be an IANA zone name, e.g. America/Los_Angeles"),
                Err(_) => DEFAULT_DISPLAY_TIMEZONE,
            },
        }
    }
}

/// Read a whole number of seconds; must be > 0.
fn positive_secs(var: &str, default: u64) -> u64 {
    match std::env::var(var) {
        Ok(v) => match v.parse::<u64>() {
            Ok(secs) if secs > 0 => secs,
            _ => panic!("{} must be a positive whole number of seconds", var),
        },
        Err(_) => default,
    }
}
