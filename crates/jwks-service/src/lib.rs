//! JWKS Service Library
//!
//! Issues and rotates an asymmetric signing key pair, publishes the public
//! halves as a JSON Web Key Set and signs short-lived tokens with the current
//! key.
//!
//! # Modules
//!
//! - `config` - Service configuration
//! - `crypto` - Key material generation, JWK export, thumbprints, JWT signing
//! - `errors` - Error types
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `models` - Data models (key slots, key records, JWKs)
//! - `observability` - Metrics and tracing helpers
//! - `repositories` - Key store access layer
//! - `routes` - Router and application state
//! - `services` - Rotation engine and token issuance

pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
