//! HTTP request handlers.

pub mod health;
pub mod jwks_handler;
pub mod metrics;
pub mod token_handler;

pub use health::{health_check, readiness_check};
pub use jwks_handler::handle_get_jwks;
pub use metrics::metrics_handler;
pub use token_handler::{handle_generate_jwt_get, handle_generate_jwt_post};
