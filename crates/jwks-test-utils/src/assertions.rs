//! Custom test assertions for expressive tests
//!
//! Provides trait-based assertions for issued tokens and published key sets.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jwks_service::crypto::verify_jwt;
use jwks_service::models::Jwks;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Registered time claims every issued token carries
#[derive(Debug, Deserialize)]
struct TimeClaims {
    pub exp: i64,
    pub iat: i64,
}

fn decode_payload(token: &str) -> Map<String, Value> {
    let payload = token
        .split('.')
        .nth(1)
        .expect("JWT must have a payload segment");
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .expect("Invalid JWT payload");
    serde_json::from_slice(&bytes).expect("Failed to parse JWT claims")
}

/// Custom assertions for issued tokens
///
/// # Example
/// ```rust,ignore
/// token
///     .assert_valid_jwt("ES256")
///     .assert_signed_by(&kid)
///     .assert_claim("sub", "alice")
///     .assert_verifies_against(&jwks);
/// ```
pub trait TokenAssertions {
    /// Assert compact JWS shape with a `JWT` type, the given algorithm, and a kid
    fn assert_valid_jwt(&self, alg: &str) -> &Self;

    /// Assert the header kid
    fn assert_signed_by(&self, kid: &str) -> &Self;

    /// Assert `exp - iat` equals the given lifetime
    fn assert_lifetime(&self, seconds: i64) -> &Self;

    /// Assert a payload claim value
    fn assert_claim(&self, name: &str, expected: impl Into<Value>) -> &Self;

    /// Assert the token verifies against the key set
    fn assert_verifies_against(&self, jwks: &Jwks) -> &Self;

    /// Assert the token is rejected by the key set
    fn assert_rejected_by(&self, jwks: &Jwks) -> &Self;
}

impl TokenAssertions for String {
    fn assert_valid_jwt(&self, alg: &str) -> &Self {
        let parts: Vec<_> = self.split('.').collect();
        assert_eq!(
            parts.len(),
            3,
            "JWT must have 3 parts (header.payload.signature), got {}",
            parts.len()
        );

        let header = jsonwebtoken::decode_header(self);
        assert!(
            header.is_ok(),
            "Failed to parse JWT header: {:?}",
            header.err()
        );

        let header = header.unwrap();
        assert_eq!(
            format!("{:?}", header.alg),
            alg,
            "Expected {} algorithm",
            alg
        );
        assert_eq!(header.typ.as_deref(), Some("JWT"), "Expected JWT type");
        assert!(header.kid.is_some(), "Expected a kid header");

        let claims: Result<TimeClaims, _> =
            serde_json::from_value(Value::Object(decode_payload(self)));
        assert!(
            claims.is_ok(),
            "JWT claims must carry numeric iat and exp: {:?}",
            claims.err()
        );

        self
    }

    fn assert_signed_by(&self, kid: &str) -> &Self {
        let header = jsonwebtoken::decode_header(self).expect("Failed to parse JWT header");

        assert_eq!(
            header.kid.as_deref(),
            Some(kid),
            "Expected kid '{}', got {:?}",
            kid,
            header.kid
        );

        self
    }

    fn assert_lifetime(&self, seconds: i64) -> &Self {
        let claims: TimeClaims = serde_json::from_value(Value::Object(decode_payload(self)))
            .expect("Failed to parse JWT time claims");

        assert_eq!(
            claims.exp - claims.iat,
            seconds,
            "Expected token lifetime of {} seconds",
            seconds
        );

        self
    }

    fn assert_claim(&self, name: &str, expected: impl Into<Value>) -> &Self {
        let claims = decode_payload(self);
        let expected = expected.into();

        assert_eq!(
            claims.get(name),
            Some(&expected),
            "Expected claim '{}' to be {}",
            name,
            expected
        );

        self
    }

    fn assert_verifies_against(&self, jwks: &Jwks) -> &Self {
        let result = verify_jwt(self, jwks);
        assert!(
            result.is_ok(),
            "Token should verify against key set {:?}: {:?}",
            kids(jwks),
            result.err()
        );

        self
    }

    fn assert_rejected_by(&self, jwks: &Jwks) -> &Self {
        assert!(
            verify_jwt(self, jwks).is_err(),
            "Token should be rejected by key set {:?}",
            kids(jwks)
        );

        self
    }
}

fn kids(jwks: &Jwks) -> Vec<&str> {
    jwks.keys.iter().map(|k| k.kid.as_str()).collect()
}

/// Custom assertions for published key sets
pub trait JwksAssertions {
    fn assert_key_count(&self, count: usize) -> &Self;

    fn assert_contains_kid(&self, kid: &str) -> &Self;

    fn assert_lacks_kid(&self, kid: &str) -> &Self;

    /// Assert the first published key (the signing key) has this kid
    fn assert_current_kid(&self, kid: &str) -> &Self;

    fn assert_unique_kids(&self) -> &Self;
}

impl JwksAssertions for Jwks {
    fn assert_key_count(&self, count: usize) -> &Self {
        assert_eq!(
            self.keys.len(),
            count,
            "Expected {} published keys, got {:?}",
            count,
            kids(self)
        );

        self
    }

    fn assert_contains_kid(&self, kid: &str) -> &Self {
        assert!(
            self.keys.iter().any(|k| k.kid == kid),
            "Key set does not contain kid '{}'. Available: {:?}",
            kid,
            kids(self)
        );

        self
    }

    fn assert_lacks_kid(&self, kid: &str) -> &Self {
        assert!(
            self.keys.iter().all(|k| k.kid != kid),
            "Key set unexpectedly contains kid '{}'",
            kid
        );

        self
    }

    fn assert_current_kid(&self, kid: &str) -> &Self {
        let first = self.keys.first().expect("Key set is empty");
        assert_eq!(first.kid, kid, "Expected current kid '{}'", kid);

        self
    }

    fn assert_unique_kids(&self) -> &Self {
        let mut seen = kids(self);
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), self.keys.len(), "Duplicate kids in key set");

        self
    }
}
