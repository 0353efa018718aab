//! Background refresh loop for the roads/weather snapshot.
//!
//! Fetches both upstream feeds at startup and then on a fixed interval,
//! builds a fresh [`ApiData`] and publishes it to readers.
//!
//! Architecture:
//! - One task owns the loop, so cycles never overlap. Ticks that elapse
//!   while a cycle is running are skipped, not queued.
//! - A manual refresh (`Notify`) starts a cycle right away. Requests made
//!   while a cycle is running collapse into a single follow-up cycle.
//! - The last good snapshot lives in a `watch` channel and is replaced
//!   wholesale. A failed cycle leaves it untouched.
//! - Shutdown stops the timer and abandons an in-flight cycle.
//! - Status is in-memory (`Arc<RwLock<PollerState>>`) for the status endpoint.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify, RwLock};
use tokio::time::MissedTickBehavior;
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::services::snapshot::{build_snapshot, ApiData};
use crate::services::upstream::FeedClient;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Publishing side of the snapshot channel. `None` until the first success.
pub type SnapshotSender = watch::Sender<Option<Arc<ApiData>>>;

/// Reading side of the snapshot channel.
pub type SnapshotReceiver = watch::Receiver<Option<Arc<ApiData>>>;

/// Poller state, exposed via the status endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PollerState {
    pub active: bool,
    pub refresh_interval_secs: u64,
    pub refresh_in_progress: bool,
    pub next_refresh_at: Option<DateTime<Utc>>,
    pub last_refresh_completed_at: Option<DateTime<Utc>>,
    pub last_refresh_duration_ms: Option<u64>,
    /// Completion time of the cycle that produced the current snapshot
    pub last_success_at: Option<DateTime<Utc>>,
    pub total_refreshes: u64,
    pub failed_refreshes: u64,
    /// Error from the most recent cycle, cleared on success
    pub last_error: Option<String>,
}

impl PollerState {
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            active: true,
            refresh_interval_secs: refresh_interval.as_secs(),
            refresh_in_progress: false,
            next_refresh_at: None,
            last_refresh_completed_at: None,
            last_refresh_duration_ms: None,
            last_success_at: None,
            total_refreshes: 0,
            failed_refreshes: 0,
            last_error: None,
        }
    }
}

/// Shared poller state handle.
pub type SharedPollerState = Arc<RwLock<PollerState>>;

// ---------------------------------------------------------------------------
// One refresh cycle
// ---------------------------------------------------------------------------

/// Fetch both feeds and build a snapshot. All-or-nothing.
pub async fn fetch_snapshot(client: &FeedClient) -> Result<ApiData, AppError> {
    let docs = client.fetch_feeds().await?;
    build_snapshot(&docs.roads, &docs.weather)
}

/// Run one cycle: fetch, build, publish, and record the outcome.
///
/// On failure the previously published snapshot stays in place.
pub async fn refresh_once(
    client: &FeedClient,
    snapshot_tx: &SnapshotSender,
    state: &SharedPollerState,
) -> Result<(), AppError> {
    let started = Utc::now();
    state.write().await.refresh_in_progress = true;

    tracing::info!("Poller: refreshing from {}", client.base_url());
    let result = fetch_snapshot(client).await;

    let completed = Utc::now();
    let duration_ms = (completed - started).num_milliseconds().max(0) as u64;

    let mut s = state.write().await;
    s.refresh_in_progress = false;
    s.last_refresh_completed_at = Some(completed);
    s.last_refresh_duration_ms = Some(duration_ms);
    s.total_refreshes += 1;

    match result {
        Ok(data) => {
            tracing::info!(
                "Poller: refresh complete in {}ms ({} roads, {} weather locations, {} alerts)",
                duration_ms,
                data.roads.len(),
                data.weather.len(),
                data.alerts.len(),
            );
            snapshot_tx.send_replace(Some(Arc::new(data)));
            s.last_success_at = Some(completed);
            s.last_error = None;
            Ok(())
        }
        Err(e) => {
            tracing::error!("Poller: refresh failed after {}ms: {}", duration_ms, e);
            s.failed_refreshes += 1;
            s.last_error = Some(e.to_string());
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Main poller loop
// ---------------------------------------------------------------------------

/// Handles the poller loop needs besides the feed client.
pub struct PollerHandles {
    pub snapshot_tx: SnapshotSender,
    pub state: SharedPollerState,
    /// Signalled by the manual refresh endpoint
    pub refresh: Arc<Notify>,
    /// Flips to `true` on shutdown
    pub shutdown: watch::Receiver<bool>,
}

/// Run the refresh loop until shutdown.
///
/// The first tick fires immediately, which gives the startup fetch.
pub async fn run_poller(client: FeedClient, interval: Duration, handles: PollerHandles) {
    let PollerHandles {
        snapshot_tx,
        state,
        refresh,
        mut shutdown,
    } = handles;

    tracing::info!(
        "Background poller started (interval {}s)",
        interval.as_secs()
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown_signalled(&mut shutdown) => break,
            _ = ticker.tick() => {}
            _ = refresh.notified() => {
                tracing::info!("Poller: manual refresh requested");
                ticker.reset();
            }
        }

        let started = Utc::now();
        tokio::select! {
            biased;
            _ = shutdown_signalled(&mut shutdown) => {
                tracing::info!("Poller: shutdown during refresh, abandoning cycle");
                break;
            }
            // Failures are already logged and recorded in the state.
            _ = refresh_once(&client, &snapshot_tx, &state) => {}
        }

        state.write().await.next_refresh_at = Some(next_refresh_at(started, interval));
    }

    let mut s = state.write().await;
    s.active = false;
    s.refresh_in_progress = false;
    s.next_refresh_at = None;
    tracing::info!("Background poller stopped");
}

/// When the timer will next fire, given the start of the last cycle.
fn next_refresh_at(cycle_started: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    let step = ChronoDuration::from_std(interval).unwrap_or_else(|_| ChronoDuration::days(365));
    let mut next = cycle_started + step;
    let now = Utc::now();
    while next <= now && step > ChronoDuration::zero() {
        next += step;
    }
    next
}

/// Resolves once shutdown is requested or the sender is gone.
async fn shutdown_signalled(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::services::upstream::{ROADS_PATH, WEATHER_PATH};

    fn test_client(server: &MockServer) -> FeedClient {
        FeedClient::new(&server.uri(), "road-weather-status-test/0.1", Duration::from_secs(5))
            .unwrap()
    }

    fn new_state() -> SharedPollerState {
        Arc::new(RwLock::new(PollerState::new(Duration::from_secs(3600))))
    }

    async fn mount_feeds(server: &MockServer, road_title: &str) {
        Mock::given(method("GET"))
            .and(path(ROADS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "roads": [{
                    "name": "SR-4",
                    "section": "Arnold to Bear Valley",
                    "alerts": [{ "title": road_title, "severity": "WARNING" }]
                }],
                "lastUpdated": "2026-01-15T07:58:00Z"
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(WEATHER_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "weatherData": [{ "locationName": "Arnold", "temperatureCelsius": 0 }]
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_new_state_defaults() {
        let s = PollerState::new(Duration::from_secs(900));
        assert!(s.active);
        assert_eq!(s.refresh_interval_secs, 900);
        assert_eq!(s.total_refreshes, 0);
        assert!(s.last_success_at.is_none());
    }

    #[test]
    fn test_next_refresh_at_is_in_future() {
        let started = Utc::now() - ChronoDuration::seconds(50);
        let next = next_refresh_at(started, Duration::from_secs(20));
        assert!(next > Utc::now());
        assert_eq!((next - started).num_seconds() % 20, 0);
    }

    #[tokio::test]
    async fn test_refresh_once_publishes_snapshot() {
        let server = MockServer::start().await;
        mount_feeds(&server, "Chain control").await;
        let (tx, rx) = watch::channel(None);
        let state = new_state();

        assert_ok!(refresh_once(&test_client(&server), &tx, &state).await);

        let snapshot = rx.borrow().clone().expect("snapshot published");
        assert_eq!(snapshot.roads[0].to, "Bear Valley");
        assert_eq!(snapshot.weather[0].temperature, Some(32));
        assert_eq!(snapshot.alerts[0].title, "Chain control");

        let s = state.read().await;
        assert_eq!(s.total_refreshes, 1);
        assert_eq!(s.failed_refreshes, 0);
        assert!(s.last_success_at.is_some());
        assert!(!s.refresh_in_progress);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let good = MockServer::start().await;
        mount_feeds(&good, "Chain control").await;
        let (tx, rx) = watch::channel(None);
        let state = new_state();
        assert_ok!(refresh_once(&test_client(&good), &tx, &state).await);

        let bad = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&bad)
            .await;
        let err = assert_err!(refresh_once(&test_client(&bad), &tx, &state).await);
        assert!(matches!(err, AppError::ExternalServiceError(_)));

        let snapshot = rx.borrow().clone().expect("previous snapshot retained");
        assert_eq!(snapshot.alerts[0].title, "Chain control");

        let s = state.read().await;
        assert_eq!(s.total_refreshes, 2);
        assert_eq!(s.failed_refreshes, 1);
        assert!(s.last_error.as_deref().unwrap_or_default().contains("500"));
    }

    #[tokio::test]
    async fn test_first_failure_leaves_no_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ROADS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(WEATHER_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "weatherData": [] })))
            .mount(&server)
            .await;
        let (tx, rx) = watch::channel(None);
        let state = new_state();

        let err = assert_err!(refresh_once(&test_client(&server), &tx, &state).await);
        assert!(matches!(err, AppError::MalformedPayload(_)));
        assert!(rx.borrow().is_none());
    }

    #[tokio::test]
    async fn test_run_poller_fetches_at_startup_and_on_demand() {
        let server = MockServer::start().await;
        mount_feeds(&server, "Chain control").await;

        let (snapshot_tx, mut snapshot_rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = new_state();
        let refresh = Arc::new(Notify::new());

        let handle = tokio::spawn(run_poller(
            test_client(&server),
            Duration::from_secs(3600),
            PollerHandles {
                snapshot_tx,
                state: state.clone(),
                refresh: refresh.clone(),
                shutdown: shutdown_rx,
            },
        ));

        // startup cycle
        tokio::time::timeout(Duration::from_secs(5), snapshot_rx.changed())
            .await
            .expect("startup refresh")
            .unwrap();

        // manual cycle
        refresh.notify_one();
        tokio::time::timeout(Duration::from_secs(5), snapshot_rx.changed())
            .await
            .expect("manual refresh")
            .unwrap();

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("poller stops")
            .unwrap();

        let s = state.read().await;
        assert_eq!(s.total_refreshes, 2);
        assert!(!s.active);
    }

    #[tokio::test]
    async fn test_refreshes_requested_mid_cycle_collapse_into_one() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "roads": [], "weatherData": [] }))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let (snapshot_tx, mut snapshot_rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = new_state();
        let refresh = Arc::new(Notify::new());

        let handle = tokio::spawn(run_poller(
            test_client(&server),
            Duration::from_secs(3600),
            PollerHandles {
                snapshot_tx,
                state: state.clone(),
                refresh: refresh.clone(),
                shutdown: shutdown_rx,
            },
        ));

        // Wait for the startup cycle to be in flight, then ask twice.
        tokio::time::timeout(Duration::from_secs(5), async {
            while !state.read().await.refresh_in_progress {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("startup cycle begins");
        refresh.notify_one();
        refresh.notify_one();

        for cycle in ["startup", "follow-up"] {
            tokio::time::timeout(Duration::from_secs(5), snapshot_rx.changed())
                .await
                .unwrap_or_else(|_| panic!("{cycle} refresh"))
                .unwrap();
        }

        // Longer than one cycle: a third one would have finished by now.
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(!snapshot_rx.has_changed().unwrap());
        assert_eq!(state.read().await.total_refreshes, 2);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("poller stops")
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_abandons_in_flight_cycle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "roads": [], "weatherData": [] }))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = new_state();

        let client = FeedClient::new(
            &server.uri(),
            "road-weather-status-test/0.1",
            Duration::from_secs(60),
        )
        .unwrap();
        let handle = tokio::spawn(run_poller(
            client,
            Duration::from_secs(3600),
            PollerHandles {
                snapshot_tx,
                state: state.clone(),
                refresh: Arc::new(Notify::new()),
                shutdown: shutdown_rx,
            },
        ));

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("poller stops without waiting for upstream")
            .unwrap();

        assert!(snapshot_rx.borrow().is_none());
        let s = state.read().await;
        assert_eq!(s.total_refreshes, 0);
        assert!(!s.active);
        assert!(!s.refresh_in_progress);
    }
}
