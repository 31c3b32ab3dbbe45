use crate::errors::JwksError;
use crate::models::Jwks;
use crate::observability::metrics::{record_jwks_request, set_published_keys};
use crate::observability::record_handler_error;
use crate::routes::AppState;
use axum::{
    extract::State,
    http::header::{HeaderMap, HeaderValue, CACHE_CONTROL},
    Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Handle JWKS request
///
/// GET /jwks
/// GET /.well-known/jwks.json
///
/// Returns the current key followed by the stale key while it is within its
/// grace period. Never returns a partial set: any store failure is a 500.
#[instrument(name = "jwks.keys.get", skip_all, fields(status, keys))]
pub async fn handle_get_jwks(
    State(state): State<Arc<AppState>>,
) -> Result<(HeaderMap, Json<Jwks>), JwksError> {
    let result = state.engine.get_public_keys().await;

    let status = if result.is_ok() { "success" } else { "error" };
    tracing::Span::current().record("status", status);
    record_jwks_request(status);

    let jwks = result.inspect_err(|e| record_handler_error("publish_keys", e))?;

    tracing::Span::current().record("keys", jwks.keys.len());
    set_published_keys(jwks.keys.len());

    let mut headers = HeaderMap::new();
    let cache_control = format!("max-age={}", state.config.jwks_max_age_seconds);
    let value = HeaderValue::from_str(&cache_control).map_err(|_| JwksError::Internal)?;
    headers.insert(CACHE_CONTROL, value);

    Ok((headers, Json(jwks)))
}
