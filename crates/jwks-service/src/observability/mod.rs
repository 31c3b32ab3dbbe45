//! Observability for the JWKS service
//!
//! Tracing spans use `#[instrument(skip_all)]` with explicitly allow-listed
//! fields. Key ids are public and may be logged; private key members,
//! PKCS#8 documents and token payloads never are.

pub mod metrics;

use crate::errors::JwksError;

/// Error categories for metrics labels (bounded cardinality)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Key store failures (unavailable, corrupted)
    Storage,
    /// Key generation, export and signing failures
    Cryptographic,
    /// Rejected tokens
    Validation,
    /// Invariant violations
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Storage => "storage",
            ErrorCategory::Cryptographic => "cryptographic",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl From<&JwksError> for ErrorCategory {
    fn from(err: &JwksError) -> Self {
        match err {
            JwksError::KeyManagement(_) => ErrorCategory::Storage,
            JwksError::Crypto(_) | JwksError::Signing(_) => ErrorCategory::Cryptographic,
            JwksError::InvalidToken(_) => ErrorCategory::Validation,
            JwksError::Internal => ErrorCategory::Internal,
        }
    }
}

/// Record an error returned by a handler.
pub fn record_handler_error(operation: &str, err: &JwksError) {
    metrics::record_error(
        operation,
        ErrorCategory::from(err).as_str(),
        err.status_code().as_u16(),
    );
}
