//! Shared helpers for unit conversions.
//!
//! Upstream feeds report metric values; the page displays imperial ones.
//! All rounding goes through [`round_half_up`] so every display value rounds
//! the same way (halves toward positive infinity, e.g. 40.5 → 41, -0.5 → 0).

/// Kilometres → miles.
const MILES_PER_KM: f64 = 0.621371;

/// Compass points, clockwise from north, 22.5° apart.
const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Round to the nearest integer, halves toward positive infinity.
pub(crate) fn round_half_up(v: f64) -> i64 {
    if !v.is_finite() {
        tracing::warn!("round_half_up received non-finite value {}, defaulting to 0", v);
        return 0;
    }
    // Compare the fraction instead of adding 0.5, which rounds up at
    // 0.49999999999999994.
    let floor = v.floor();
    if v - floor >= 0.5 {
        floor as i64 + 1
    } else {
        floor as i64
    }
}

/// Celsius → whole degrees Fahrenheit.
pub(crate) fn celsius_to_fahrenheit(celsius: f64) -> i64 {
    round_half_up(celsius * 9.0 / 5.0 + 32.0)
}

/// Optional Celsius → optional whole degrees Fahrenheit.
pub(crate) fn opt_celsius_to_fahrenheit(celsius: Option<f64>) -> Option<i64> {
    celsius.map(celsius_to_fahrenheit)
}

/// km/h → whole mph.
pub(crate) fn kmh_to_mph(kmh: f64) -> i64 {
    round_half_up(kmh * MILES_PER_KM)
}

/// Kilometres → whole miles.
pub(crate) fn km_to_miles(km: f64) -> i64 {
    round_half_up(km * MILES_PER_KM)
}

/// Average speed over a segment in whole mph.
///
/// `None` when either input is missing or zero.
pub(crate) fn average_speed_mph(distance_km: Option<f64>, duration_minutes: Option<f64>) -> Option<i64> {
    let distance = distance_km.filter(|d| *d != 0.0)?;
    let duration = duration_minutes.filter(|d| *d != 0.0)?;
    let speed_kmh = distance / duration * 60.0;
    Some(round_half_up(speed_kmh * MILES_PER_KM))
}

/// 16-point compass direction for a wind bearing in degrees.
pub(crate) fn wind_direction(degrees: f64) -> &'static str {
    let index = round_half_up(degrees / 22.5).rem_euclid(16) as usize;
    COMPASS_POINTS[index]
}
