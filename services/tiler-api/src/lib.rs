//! Dynamic tile API service library.
//!
//! Serves XYZ tiles rendered on demand from remote rasters, with a
//! Redis-backed tile cache keyed by request fingerprint, plus TileJSON,
//! WMTS capabilities and source metadata endpoints.

pub mod config;
pub mod fingerprint;
pub mod handlers;
pub mod pipeline;
pub mod state;
pub mod timing;

use std::sync::Arc;

use axum::{extract::Extension, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// Build the service router.
///
/// Scale and extension ride inside the final path segment
/// (`{y}[@{scale}x][.{ext}]`), so one route per arity covers every tile
/// URL shape.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // TileJSON metadata
        .route("/cogs/tilejson.json", get(handlers::tilejson_handler))
        .route(
            "/cogs/:identifier/tilejson.json",
            get(handlers::tilejson_tms_handler),
        )
        // WMTS capabilities
        .route("/cogs/WMTSCapabilities.xml", get(handlers::wmts_handler))
        .route(
            "/cogs/:identifier/WMTSCapabilities.xml",
            get(handlers::wmts_tms_handler),
        )
        // Source metadata
        .route("/cogs/bounds", get(handlers::bounds_handler))
        .route("/cogs/info", get(handlers::info_handler))
        .route("/cogs/metadata", get(handlers::metadata_handler))
        // XYZ tiles, with and without an explicit tile matrix set
        .route("/cogs/:z/:x/:tail", get(handlers::tile_handler))
        .route(
            "/cogs/:identifier/:z/:x/:tail",
            get(handlers::tile_tms_handler),
        )
        // Health checks
        .route("/health", get(handlers::health_handler))
        .route("/ready", get(handlers::ready_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}

/// The full router including the Prometheus scrape endpoint.
pub fn app_with_metrics(state: Arc<AppState>, prometheus_handle: PrometheusHandle) -> Router {
    app(state)
        .route("/metrics", get(handlers::metrics_handler))
        .layer(Extension(prometheus_handle))
}
