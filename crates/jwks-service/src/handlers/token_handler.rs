use crate::errors::JwksError;
use crate::models::GenerateJwtResponse;
use crate::observability::record_handler_error;
use crate::routes::AppState;
use crate::services::token_service::TokenPayload;
use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// Handle token request with claims in the query string
///
/// GET /generateJWT?sub=alice&role=admin
///
/// Every query parameter becomes a string claim.
#[instrument(name = "jwks.token.get", skip_all)]
pub async fn handle_generate_jwt_get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<GenerateJwtResponse>, JwksError> {
    let payload: TokenPayload = params
        .into_iter()
        .map(|(name, value)| (name, Value::String(value)))
        .collect();

    issue(&state, payload).await
}

/// Handle token request with claims in a JSON object body
///
/// POST /generateJWT
#[instrument(name = "jwks.token.post", skip_all)]
pub async fn handle_generate_jwt_post(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TokenPayload>,
) -> Result<Json<GenerateJwtResponse>, JwksError> {
    issue(&state, payload).await
}

async fn issue(state: &AppState, payload: TokenPayload) -> Result<Json<GenerateJwtResponse>, JwksError> {
    let jwt = state
        .tokens
        .issue(payload)
        .await
        .inspect_err(|e| record_handler_error("issue_token", e))?;

    Ok(Json(GenerateJwtResponse { jwt }))
}
