//! HTTP routes for the JWKS service.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::services::rotation_engine::RotationEngine;
use crate::services::token_service::TokenService;
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Key lifecycle owner shared with `tokens`.
    pub engine: Arc<RotationEngine>,

    pub tokens: TokenService,

    pub config: Config,
}

impl AppState {
    pub fn new(engine: Arc<RotationEngine>, config: Config) -> Self {
        let tokens = TokenService::new(engine.clone(), config.token_expiry());
        Self {
            engine,
            tokens,
            config,
        }
    }
}

/// Build the application routes.
///
/// - `/jwks`, `/.well-known/jwks.json` - published key set
/// - `/generateJWT` - token issuance (GET query claims, POST JSON claims)
/// - `/health` - liveness probe
/// - `/ready` - readiness probe (key store + signing key)
/// - `/metrics` - Prometheus metrics
///
/// Layers: 30 second request timeout, TraceLayer, and the HTTP metrics
/// middleware as the outermost layer.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let app_routes = Router::new()
        .route("/jwks", get(handlers::handle_get_jwks))
        .route("/.well-known/jwks.json", get(handlers::handle_get_jwks))
        .route(
            "/generateJWT",
            get(handlers::handle_generate_jwt_get).post(handlers::handle_generate_jwt_post),
        )
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    app_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
