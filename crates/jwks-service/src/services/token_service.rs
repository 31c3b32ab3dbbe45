use crate::crypto;
use crate::errors::JwksError;
use crate::observability::metrics::record_token_issuance;
use crate::services::rotation_engine::RotationEngine;
use chrono::{Duration, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Claims as supplied by the caller.
pub type TokenPayload = Map<String, Value>;

/// Signs caller payloads with the current key.
#[derive(Clone)]
pub struct TokenService {
    engine: Arc<RotationEngine>,
    token_expiry: Duration,
}

impl TokenService {
    pub fn new(engine: Arc<RotationEngine>, token_expiry: Duration) -> Self {
        Self {
            engine,
            token_expiry,
        }
    }

    /// Issue a token carrying `payload`.
    ///
    /// `iat` and `exp` are always set by the service; caller-supplied values
    /// for them are replaced.
    #[instrument(skip_all, name = "jwks.token.issue", fields(claims = payload.len()))]
    pub async fn issue(&self, payload: TokenPayload) -> Result<String, JwksError> {
        let start = Instant::now();
        let result = self.sign(payload).await;

        let status = if result.is_ok() { "success" } else { "error" };
        record_token_issuance(status, start.elapsed());

        result
    }

    async fn sign(&self, mut payload: TokenPayload) -> Result<String, JwksError> {
        let key = self.engine.get_signing_key().await?;

        let now = Utc::now();
        let exp = now + self.token_expiry;
        payload.insert("iat".to_string(), Value::from(now.timestamp()));
        payload.insert("exp".to_string(), Value::from(exp.timestamp()));

        let token = crypto::sign_jwt(&payload, &key)?;

        tracing::debug!(
            target: "jwks.token",
            kid = %key.kid,
            algorithm = %key.algorithm,
            expires_at = exp.timestamp(),
            "Issued token"
        );

        Ok(token)
    }
}
