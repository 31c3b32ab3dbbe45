use crate::repositories::key_store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JwksError {
    /// Key store failure observed while rotating or loading keys.
    #[error("Key management error: {0}")]
    KeyManagement(#[from] StoreError),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Signing error: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Internal server error")]
    Internal,
}

impl JwksError {
    /// HTTP status reported at the transport boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            JwksError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            JwksError::KeyManagement(_)
            | JwksError::Crypto(_)
            | JwksError::Signing(_)
            | JwksError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for JwksError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, message) = match &self {
            JwksError::KeyManagement(_) => (
                "KEY_MANAGEMENT_ERROR",
                "Signing keys are temporarily unavailable".to_string(),
            ),
            JwksError::Crypto(_) => (
                "CRYPTO_ERROR",
                "An internal cryptographic error occurred".to_string(),
            ),
            JwksError::Signing(_) => (
                "SIGNING_ERROR",
                "The token could not be signed".to_string(),
            ),
            JwksError::InvalidToken(reason) => ("INVALID_TOKEN", reason.clone()),
            JwksError::Internal => ("INTERNAL_ERROR", "An internal error occurred".to_string()),
        };

        if status.is_server_error() {
            tracing::error!(target: "jwks.errors", error = %self, "Request failed");
        }

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}
