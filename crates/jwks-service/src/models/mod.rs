use crate::crypto::SigningAlgorithm;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Storage slot of a key record.
///
/// Exactly one record per slot may exist in the key store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySlot {
    Current,
    Stale,
}

impl KeySlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySlot::Current => "current",
            KeySlot::Stale => "stale",
        }
    }
}

impl fmt::Display for KeySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeySlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current" => Ok(KeySlot::Current),
            "stale" => Ok(KeySlot::Stale),
            _ => Err(format!("Invalid key slot: {}", s)),
        }
    }
}

/// Algorithm-specific public key parameters (RFC 7517 / RFC 8037)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kty")]
pub enum KeyParams {
    /// Elliptic curve key, `crv` = "P-256" for ES256
    #[serde(rename = "EC")]
    Ec { crv: String, x: String, y: String },
    /// Octet key pair, `crv` = "Ed25519" for EdDSA
    #[serde(rename = "OKP")]
    Okp { crv: String, x: String },
}

impl KeyParams {
    pub fn kty(&self) -> &'static str {
        match self {
            KeyParams::Ec { .. } => "EC",
            KeyParams::Okp { .. } => "OKP",
        }
    }
}

/// Publishable JSON Web Key (RFC 7517)
///
/// Carries no private component and no record timestamp, so it can be
/// serialized into a JWKS response as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicJwk {
    #[serde(flatten)]
    pub params: KeyParams,
    #[serde(rename = "use")]
    pub use_: String, // Public key use, always "sig"
    pub alg: String, // Algorithm (e.g., "ES256")
    pub kid: String, // RFC 7638 thumbprint, computed once at generation
}

/// Private JSON Web Key
///
/// `d` is redacted from Debug output. Clone is manually implemented because
/// the secret wrapper requires explicit cloning.
#[derive(Serialize, Deserialize)]
pub struct PrivateJwk {
    #[serde(flatten)]
    pub params: KeyParams,
    #[serde(
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret"
    )]
    pub d: SecretString,
}

impl Clone for PrivateJwk {
    fn clone(&self) -> Self {
        Self {
            params: self.params.clone(),
            d: SecretString::from(self.d.expose_secret().to_string()),
        }
    }
}

impl fmt::Debug for PrivateJwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateJwk")
            .field("kty", &self.params.kty())
            .field("d", &"[REDACTED]")
            .finish()
    }
}

fn serialize_secret<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn deserialize_secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

/// Persisted key record (one per slot)
///
/// `timestamp` is the creation instant for `current` and the retirement
/// instant for `stale`; it is the only input to expiry decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    pub timestamp: DateTime<Utc>,
    pub public_key: PublicJwk,
    pub private_key: PrivateJwk,
}

impl KeyRecord {
    pub fn kid(&self) -> &str {
        &self.public_key.kid
    }

    /// Whether the record is older than `ttl` at `now`.
    pub fn is_expired(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.timestamp) > ttl
    }
}

/// JWKS response (RFC 7517)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<PublicJwk>,
}

/// Material needed to sign a token with the current key
#[derive(Debug, Clone)]
pub struct SigningKey {
    pub kid: String,
    pub algorithm: SigningAlgorithm,
    pub private_key: PrivateJwk,
}

/// Response of the token endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateJwtResponse {
    pub jwt: String,
}

/// Readiness probe response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
