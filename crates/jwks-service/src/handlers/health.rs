//! Liveness and readiness probes.

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness probe. Checks no dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe.
///
/// Ready when the key store answers and a non-expired signing key can be
/// obtained (generating one if needed). Failures are logged server-side and
/// reported with a generic message.
#[tracing::instrument(skip_all, name = "jwks.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if let Err(e) = state.engine.store().ping().await {
        tracing::warn!(target: "jwks.health", error = %e, "Readiness check failed: key store");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(not_ready(Some("unhealthy"), None)),
        );
    }

    if let Err(e) = state.engine.get_signing_key().await {
        tracing::warn!(target: "jwks.health", error = %e, "Readiness check failed: signing key");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(not_ready(Some("healthy"), Some("unavailable"))),
        );
    }

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready",
            database: Some("healthy"),
            signing_key: Some("available"),
            error: None,
        }),
    )
}

fn not_ready(database: Option<&'static str>, signing_key: Option<&'static str>) -> ReadinessResponse {
    ReadinessResponse {
        status: "not_ready",
        database,
        signing_key,
        error: Some("Service dependencies unavailable".to_string()),
    }
}
