//! JWKS service configuration.
//!
//! Configuration is loaded from environment variables. The database URL is
//! redacted in Debug output.

use crate::crypto::SigningAlgorithm;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default SQLite URL for the key store.
pub const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:5888";

/// Default key store pool size.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Default signing key time-to-live (1 hour).
pub const DEFAULT_KEY_TTL_SECONDS: i64 = 3600;

/// Upper bound for the signing key time-to-live (1 year).
pub const MAX_KEY_TTL_SECONDS: i64 = 31_536_000;

/// Default token lifetime (2 minutes).
pub const DEFAULT_TOKEN_EXPIRY_SECONDS: i64 = 120;

/// Upper bound for the token lifetime (1 day).
pub const MAX_TOKEN_EXPIRY_SECONDS: i64 = 86_400;

/// Default `Cache-Control: max-age` for the JWKS response.
pub const DEFAULT_JWKS_MAX_AGE_SECONDS: i64 = 300;

#[derive(Clone)]
pub struct Config {
    /// SQLite connection URL for the key store.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:5888").
    pub bind_address: String,

    /// Maximum number of pooled store connections.
    pub db_max_connections: u32,

    /// Algorithm used for newly generated signing keys.
    pub signing_algorithm: SigningAlgorithm,

    /// Age after which a current or stale key is expired.
    pub key_ttl_seconds: i64,

    /// Lifetime of issued tokens.
    pub token_expiry_seconds: i64,

    /// `Cache-Control: max-age` advertised on the JWKS response.
    /// Never larger than the key TTL so verifiers pick up rotations.
    pub jwks_max_age_seconds: i64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("db_max_connections", &self.db_max_connections)
            .field("signing_algorithm", &self.signing_algorithm)
            .field("key_ttl_seconds", &self.key_ttl_seconds)
            .field("token_expiry_seconds", &self.token_expiry_seconds)
            .field("jwks_max_age_seconds", &self.jwks_max_age_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid signing algorithm: {0}")]
    InvalidSigningAlgorithm(String),

    #[error("Invalid key TTL configuration: {0}")]
    InvalidKeyTtl(String),

    #[error("Invalid token expiry configuration: {0}")]
    InvalidTokenExpiry(String),

    #[error("Invalid JWKS max-age configuration: {0}")]
    InvalidJwksMaxAge(String),

    #[error("Invalid database pool configuration: {0}")]
    InvalidPoolSize(String),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            signing_algorithm: SigningAlgorithm::default(),
            key_ttl_seconds: DEFAULT_KEY_TTL_SECONDS,
            token_expiry_seconds: DEFAULT_TOKEN_EXPIRY_SECONDS,
            jwks_max_age_seconds: DEFAULT_JWKS_MAX_AGE_SECONDS,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let db_max_connections = match vars.get("DB_MAX_CONNECTIONS") {
            Some(value_str) => {
                let value: u32 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidPoolSize(format!(
                        "DB_MAX_CONNECTIONS must be a valid integer, got '{}': {}",
                        value_str, e
                    ))
                })?;
                if value == 0 {
                    return Err(ConfigError::InvalidPoolSize(
                        "DB_MAX_CONNECTIONS must be positive".to_string(),
                    ));
                }
                value
            }
            None => DEFAULT_DB_MAX_CONNECTIONS,
        };

        let signing_algorithm = match vars.get("JWKS_SIGNING_ALGORITHM") {
            Some(value) => value
                .parse()
                .map_err(ConfigError::InvalidSigningAlgorithm)?,
            None => SigningAlgorithm::default(),
        };

        let key_ttl_seconds = parse_bounded_seconds(
            vars,
            "JWKS_KEY_TTL_SECONDS",
            DEFAULT_KEY_TTL_SECONDS,
            MAX_KEY_TTL_SECONDS,
        )
        .map_err(ConfigError::InvalidKeyTtl)?;

        let token_expiry_seconds = parse_bounded_seconds(
            vars,
            "JWKS_TOKEN_EXPIRY_SECONDS",
            DEFAULT_TOKEN_EXPIRY_SECONDS,
            MAX_TOKEN_EXPIRY_SECONDS,
        )
        .map_err(ConfigError::InvalidTokenExpiry)?;

        let jwks_max_age_seconds = parse_bounded_seconds(
            vars,
            "JWKS_MAX_AGE_SECONDS",
            DEFAULT_JWKS_MAX_AGE_SECONDS.min(key_ttl_seconds),
            key_ttl_seconds,
        )
        .map_err(ConfigError::InvalidJwksMaxAge)?;

        Ok(Config {
            database_url,
            bind_address,
            db_max_connections,
            signing_algorithm,
            key_ttl_seconds,
            token_expiry_seconds,
            jwks_max_age_seconds,
        })
    }

    /// Key TTL as a chrono duration.
    pub fn key_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.key_ttl_seconds)
    }

    /// Token lifetime as a chrono duration.
    pub fn token_expiry(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_expiry_seconds)
    }
}

/// Parse a positive number of seconds no larger than `max`.
fn parse_bounded_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: i64,
    max: i64,
) -> Result<i64, String> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: i64 = value_str.parse().map_err(|e| {
        format!(
            "{} must be a valid integer, got '{}': {}",
            name, value_str, e
        )
    })?;

    if value <= 0 {
        return Err(format!("{} must be positive, got {}", name, value));
    }

    if value > max {
        return Err(format!(
            "{} must not exceed {} seconds, got {}",
            name, max, value
        ));
    }

    Ok(value)
}
