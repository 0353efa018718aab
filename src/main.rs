// Road & Weather Status API v0.1
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{watch, Notify, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod errors;
mod helpers;
mod routes;
mod services;

use config::{AppConfig, LogFormat};
use routes::poller::PollerRouteState;
use services::poller::{PollerHandles, PollerState, SharedPollerState};
use services::upstream::FeedClient;

/// Road & Weather Status API — OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Road & Weather Status API",
        version = "0.1.0",
        description = "Current road and weather conditions for a mountain corridor. \
            Polls the upstream roads and weather feeds on a fixed interval, normalizes \
            their alerts into one severity scale, derives a status per road segment, \
            and serves the latest snapshot with ready-to-render summary and detail views.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Conditions", description = "Current road and weather conditions"),
        (name = "Poller", description = "Background refresh loop status and control"),
    ),
    paths(
        routes::health::health_check,
        routes::conditions::get_conditions,
        routes::conditions::get_conditions_summary,
        routes::details::get_route_details,
        routes::details::get_weather_details,
        routes::details::get_alert_details,
        routes::poller::get_poller_status,
        routes::poller::trigger_refresh,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            services::snapshot::ApiData,
            services::status::RoadSegment,
            services::status::RoadStatus,
            services::status::ChainControlInfo,
            services::status::WeatherLocation,
            services::alerts::Alert,
            services::alerts::AlertOrigin,
            services::severity::Severity,
            services::severity::Classification,
            services::display::Tone,
            services::display::Chip,
            services::display::WeatherIcon,
            services::display::TextSpan,
            services::display::ChainControlLevel,
            routes::conditions::ConditionsSummary,
            routes::conditions::RoadSummary,
            routes::conditions::WeatherSummary,
            routes::details::RouteDetails,
            routes::details::RouteStats,
            routes::details::AlertCard,
            routes::details::ChainControlCard,
            routes::details::WeatherDetails,
            routes::details::WeatherAlertCard,
            routes::details::AlertDetails,
            routes::details::MetadataEntry,
            routes::poller::RefreshAccepted,
            services::poller::PollerState,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "road_weather_status=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    // Create upstream feed client
    let feed_client = FeedClient::new(
        &config.upstream_base_url,
        &config.upstream_user_agent,
        config.request_timeout,
    )
    .expect("Failed to create upstream feed client");

    // Snapshot channel: written by the poller, read by every handler
    let (snapshot_tx, snapshot_rx) = watch::channel(None);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresh = Arc::new(Notify::new());

    // Create shared poller state and spawn background poller
    let poller_state: SharedPollerState =
        Arc::new(RwLock::new(PollerState::new(config.refresh_interval)));
    let poller = tokio::spawn(services::poller::run_poller(
        feed_client,
        config.refresh_interval,
        PollerHandles {
            snapshot_tx,
            state: poller_state.clone(),
            refresh: refresh.clone(),
            shutdown: shutdown_rx,
        },
    ));

    // CORS — GET for reads, POST for the manual refresh
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    // Build router
    // Conditions and health read the snapshot channel; poller routes use PollerRouteState.
    // Display views format clock times in the configured zone.
    let conditions_routes = Router::new()
        .route("/api/v1/conditions", get(routes::conditions::get_conditions))
        .route(
            "/api/v1/conditions/summary",
            get(routes::conditions::get_conditions_summary),
        )
        .route(
            "/api/v1/conditions/roads/:index",
            get(routes::details::get_route_details),
        )
        .route(
            "/api/v1/conditions/weather/:index",
            get(routes::details::get_weather_details),
        )
        .route(
            "/api/v1/conditions/alerts/:index",
            get(routes::details::get_alert_details),
        )
        .with_state(snapshot_rx.clone())
        .layer(Extension(config.display_timezone));

    let health_routes = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .with_state(snapshot_rx);

    let poller_routes = Router::new()
        .route(
            "/api/v1/poller/status",
            get(routes::poller::get_poller_status),
        )
        .route(
            "/api/v1/poller/refresh",
            post(routes::poller::trigger_refresh),
        )
        .with_state(PollerRouteState {
            state: poller_state,
            refresh,
        });

    let app = Router::new()
        .merge(health_routes)
        .merge(conditions_routes)
        .merge(poller_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server terminated unexpectedly");

    // Stop the poller; an in-flight refresh is abandoned.
    let _ = shutdown_tx.send(true);
    if let Err(e) = poller.await {
        tracing::error!("Poller task failed: {}", e);
    }
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
