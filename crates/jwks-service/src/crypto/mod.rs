use crate::errors::JwksError;
use crate::models::{Jwks, KeyParams, PrivateJwk, PublicJwk, SigningKey};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::{
    rand::SystemRandom,
    signature::{EcdsaKeyPair, Ed25519KeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING},
};
use secrecy::{ExposeSecret, SecretBox, SecretString};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use tracing::instrument;

/// Maximum accepted JWT size in bytes.
///
/// Tokens larger than this are rejected before any base64 decoding.
const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Generic message for every verification failure.
const INVALID_TOKEN_MESSAGE: &str = "The token is invalid or expired";

/// PKCS#8 v1 layout produced by ring for P-256 keys: prefix, 32-byte scalar,
/// separator, 65-byte uncompressed public point.
const P256_PKCS8_PREFIX: [u8; 36] = [
    0x30, 0x81, 0x87, 0x02, 0x01, 0x00, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d,
    0x02, 0x01, 0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x04, 0x6d, 0x30,
    0x6b, 0x02, 0x01, 0x01, 0x04, 0x20,
];
const P256_PKCS8_MIDDLE: [u8; 5] = [0xa1, 0x44, 0x03, 0x42, 0x00];
const P256_COORDINATE_LEN: usize = 32;

/// PKCS#8 v2 layout produced by ring for Ed25519 keys: prefix, 32-byte seed,
/// separator, 32-byte public key.
const ED25519_PKCS8_PREFIX: [u8; 16] = [
    0x30, 0x53, 0x02, 0x01, 0x01, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04, 0x20,
];
const ED25519_PKCS8_MIDDLE: [u8; 5] = [0xa1, 0x23, 0x03, 0x21, 0x00];
const ED25519_KEY_LEN: usize = 32;

/// Asymmetric signing algorithm used for new keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SigningAlgorithm {
    /// ECDSA over P-256 with SHA-256
    #[default]
    Es256,
    /// Ed25519
    EdDsa,
}

impl SigningAlgorithm {
    /// JOSE `alg` header value.
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::Es256 => "ES256",
            SigningAlgorithm::EdDsa => "EdDSA",
        }
    }

    /// JWK `crv` value.
    pub fn curve(&self) -> &'static str {
        match self {
            SigningAlgorithm::Es256 => "P-256",
            SigningAlgorithm::EdDsa => "Ed25519",
        }
    }

    pub fn jwt_algorithm(&self) -> Algorithm {
        match self {
            SigningAlgorithm::Es256 => Algorithm::ES256,
            SigningAlgorithm::EdDsa => Algorithm::EdDSA,
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("ES256") {
            Ok(SigningAlgorithm::Es256)
        } else if s.eq_ignore_ascii_case("EdDSA") {
            Ok(SigningAlgorithm::EdDsa)
        } else {
            Err(format!("Unsupported signing algorithm: {}", s))
        }
    }
}

/// Opaque handle to a freshly generated key pair.
///
/// Holds the PKCS#8 document; Debug output never includes it.
pub struct KeyPairHandle {
    algorithm: SigningAlgorithm,
    pkcs8: SecretBox<Vec<u8>>,
}

impl KeyPairHandle {
    pub fn from_pkcs8(algorithm: SigningAlgorithm, pkcs8: Vec<u8>) -> Self {
        Self {
            algorithm,
            pkcs8: SecretBox::new(Box::new(pkcs8)),
        }
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    pub fn pkcs8(&self) -> &[u8] {
        self.pkcs8.expose_secret()
    }
}

impl fmt::Debug for KeyPairHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPairHandle")
            .field("algorithm", &self.algorithm)
            .field("pkcs8", &"[REDACTED]")
            .finish()
    }
}

/// Source of asymmetric key material.
///
/// Injected into the rotation engine as `Arc<dyn KeyMaterialProvider>` so
/// tests can substitute deterministic or instrumented providers.
pub trait KeyMaterialProvider: Send + Sync {
    /// Generate a new key pair for `algorithm`.
    fn generate_key_pair(&self, algorithm: SigningAlgorithm) -> Result<KeyPairHandle, JwksError>;

    /// Public parameters of the key pair.
    fn export_public(&self, handle: &KeyPairHandle) -> Result<KeyParams, JwksError>;

    /// Private JWK of the key pair, including the public parameters.
    fn export_private(&self, handle: &KeyPairHandle) -> Result<PrivateJwk, JwksError>;

    /// Deterministic key id for the public parameters.
    fn thumbprint(&self, params: &KeyParams) -> String {
        jwk_thumbprint(params)
    }
}

/// Key material provider backed by ring's CSPRNG.
#[derive(Clone)]
pub struct RingKeyMaterialProvider {
    rng: SystemRandom,
}

impl RingKeyMaterialProvider {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for RingKeyMaterialProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyMaterialProvider for RingKeyMaterialProvider {
    #[instrument(skip_all, fields(algorithm = %algorithm))]
    fn generate_key_pair(&self, algorithm: SigningAlgorithm) -> Result<KeyPairHandle, JwksError> {
        let document = match algorithm {
            SigningAlgorithm::Es256 => {
                EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &self.rng)
            }
            SigningAlgorithm::EdDsa => Ed25519KeyPair::generate_pkcs8(&self.rng),
        }
        .map_err(|e| JwksError::Crypto(format!("Keypair generation failed: {}", e)))?;

        Ok(KeyPairHandle::from_pkcs8(algorithm, document.as_ref().to_vec()))
    }

    fn export_public(&self, handle: &KeyPairHandle) -> Result<KeyParams, JwksError> {
        public_params(handle.algorithm(), handle.pkcs8())
    }

    fn export_private(&self, handle: &KeyPairHandle) -> Result<PrivateJwk, JwksError> {
        private_jwk_from_pkcs8(handle.algorithm(), handle.pkcs8())
    }
}

/// Derive the public JWK parameters from a PKCS#8 document.
pub fn public_params(algorithm: SigningAlgorithm, pkcs8: &[u8]) -> Result<KeyParams, JwksError> {
    match algorithm {
        SigningAlgorithm::Es256 => {
            let rng = SystemRandom::new();
            let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
                .map_err(|e| JwksError::Crypto(format!("Invalid P-256 key: {}", e)))?;
            let point = key_pair.public_key().as_ref();

            // Uncompressed point: 0x04 || x || y
            let x = point
                .get(1..=P256_COORDINATE_LEN)
                .ok_or_else(|| JwksError::Crypto("Truncated P-256 public key".to_string()))?;
            let y = point
                .get(P256_COORDINATE_LEN + 1..)
                .ok_or_else(|| JwksError::Crypto("Truncated P-256 public key".to_string()))?;

            Ok(KeyParams::Ec {
                crv: algorithm.curve().to_string(),
                x: URL_SAFE_NO_PAD.encode(x),
                y: URL_SAFE_NO_PAD.encode(y),
            })
        }
        SigningAlgorithm::EdDsa => {
            let key_pair = Ed25519KeyPair::from_pkcs8(pkcs8)
                .map_err(|e| JwksError::Crypto(format!("Invalid Ed25519 key: {}", e)))?;

            Ok(KeyParams::Okp {
                crv: algorithm.curve().to_string(),
                x: URL_SAFE_NO_PAD.encode(key_pair.public_key().as_ref()),
            })
        }
    }
}

/// Build the private JWK for a PKCS#8 document in ring's layout.
pub fn private_jwk_from_pkcs8(
    algorithm: SigningAlgorithm,
    pkcs8: &[u8],
) -> Result<PrivateJwk, JwksError> {
    let params = public_params(algorithm, pkcs8)?;
    let (prefix, middle): (&[u8], &[u8]) = match algorithm {
        SigningAlgorithm::Es256 => (&P256_PKCS8_PREFIX, &P256_PKCS8_MIDDLE),
        SigningAlgorithm::EdDsa => (&ED25519_PKCS8_PREFIX, &ED25519_PKCS8_MIDDLE),
    };
    let private_len = match algorithm {
        SigningAlgorithm::Es256 => P256_COORDINATE_LEN,
        SigningAlgorithm::EdDsa => ED25519_KEY_LEN,
    };

    let layout_error = || JwksError::Crypto("Unexpected PKCS#8 layout".to_string());
    let rest = pkcs8.strip_prefix(prefix).ok_or_else(layout_error)?;
    let private = rest.get(..private_len).ok_or_else(layout_error)?;
    let after = rest.get(private_len..).ok_or_else(layout_error)?;
    if !after.starts_with(middle) {
        return Err(layout_error());
    }

    Ok(PrivateJwk {
        params,
        d: SecretString::from(URL_SAFE_NO_PAD.encode(private)),
    })
}

/// Rebuild a PKCS#8 document from a private JWK.
///
/// The result is parsed by ring before it is returned, which also checks that
/// `d` matches the public parameters.
pub fn pkcs8_from_private_jwk(jwk: &PrivateJwk) -> Result<Vec<u8>, JwksError> {
    let private = decode_component(jwk.d.expose_secret(), "d")?;

    let (algorithm, der) = match &jwk.params {
        KeyParams::Ec { crv, x, y } => {
            expect_curve(crv, SigningAlgorithm::Es256)?;
            let x = decode_component(x, "x")?;
            let y = decode_component(y, "y")?;
            expect_len(&private, P256_COORDINATE_LEN, "d")?;
            expect_len(&x, P256_COORDINATE_LEN, "x")?;
            expect_len(&y, P256_COORDINATE_LEN, "y")?;

            let mut der = Vec::with_capacity(138);
            der.extend_from_slice(&P256_PKCS8_PREFIX);
            der.extend_from_slice(&private);
            der.extend_from_slice(&P256_PKCS8_MIDDLE);
            der.push(0x04);
            der.extend_from_slice(&x);
            der.extend_from_slice(&y);
            (SigningAlgorithm::Es256, der)
        }
        KeyParams::Okp { crv, x } => {
            expect_curve(crv, SigningAlgorithm::EdDsa)?;
            let x = decode_component(x, "x")?;
            expect_len(&private, ED25519_KEY_LEN, "d")?;
            expect_len(&x, ED25519_KEY_LEN, "x")?;

            let mut der = Vec::with_capacity(85);
            der.extend_from_slice(&ED25519_PKCS8_PREFIX);
            der.extend_from_slice(&private);
            der.extend_from_slice(&ED25519_PKCS8_MIDDLE);
            der.extend_from_slice(&x);
            (SigningAlgorithm::EdDsa, der)
        }
    };

    // Rejects a d that does not belong to the public parameters
    public_params(algorithm, &der)?;
    Ok(der)
}

fn decode_component(value: &str, name: &str) -> Result<Vec<u8>, JwksError> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| JwksError::Crypto(format!("Invalid JWK member {}: {}", name, e)))
}

fn expect_len(bytes: &[u8], len: usize, name: &str) -> Result<(), JwksError> {
    if bytes.len() == len {
        Ok(())
    } else {
        Err(JwksError::Crypto(format!(
            "JWK member {} has length {}, expected {}",
            name,
            bytes.len(),
            len
        )))
    }
}

fn expect_curve(crv: &str, algorithm: SigningAlgorithm) -> Result<(), JwksError> {
    if crv == algorithm.curve() {
        Ok(())
    } else {
        Err(JwksError::Crypto(format!("Unsupported curve: {}", crv)))
    }
}

/// RFC 7638 JWK thumbprint.
///
/// SHA-256 over the required members in lexicographic order with no
/// whitespace, base64url encoded without padding.
pub fn jwk_thumbprint(params: &KeyParams) -> String {
    let quote = |value: &str| serde_json::Value::String(value.to_string()).to_string();

    let canonical = match params {
        KeyParams::Ec { crv, x, y } => format!(
            r#"{{"crv":{},"kty":"EC","x":{},"y":{}}}"#,
            quote(crv),
            quote(x),
            quote(y)
        ),
        KeyParams::Okp { crv, x } => {
            format!(r#"{{"crv":{},"kty":"OKP","x":{}}}"#, quote(crv), quote(x))
        }
    };

    URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes()))
}

/// Sign `claims` with the given key.
///
/// The header carries the key's algorithm, `typ = "JWT"` and `kid`.
#[instrument(skip_all, fields(kid = %key.kid))]
pub fn sign_jwt<T: Serialize>(claims: &T, key: &SigningKey) -> Result<String, JwksError> {
    let der = pkcs8_from_private_jwk(&key.private_key)?;
    let encoding_key = match key.algorithm {
        SigningAlgorithm::Es256 => EncodingKey::from_ec_der(&der),
        SigningAlgorithm::EdDsa => EncodingKey::from_ed_der(&der),
    };

    let mut header = Header::new(key.algorithm.jwt_algorithm());
    header.typ = Some("JWT".to_string());
    header.kid = Some(key.kid.clone());

    encode(&header, claims, &encoding_key).map_err(JwksError::Signing)
}

/// Verify a token against a published key set.
///
/// The key is selected by the header `kid`; the signature and `exp` are
/// validated. Returns the token claims.
#[instrument(skip_all)]
pub fn verify_jwt(
    token: &str,
    jwks: &Jwks,
) -> Result<serde_json::Map<String, serde_json::Value>, JwksError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "jwks.crypto",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(invalid_token());
    }

    let header = decode_header(token).map_err(|e| {
        tracing::debug!(target: "jwks.crypto", error = %e, "Malformed token header");
        invalid_token()
    })?;
    let kid = header.kid.ok_or_else(|| {
        tracing::debug!(target: "jwks.crypto", "Token header has no kid");
        invalid_token()
    })?;
    let jwk = jwks.keys.iter().find(|key| key.kid == kid).ok_or_else(|| {
        tracing::debug!(target: "jwks.crypto", kid = %kid, "No published key for kid");
        invalid_token()
    })?;

    let algorithm: SigningAlgorithm = jwk.alg.parse().map_err(|e: String| {
        tracing::debug!(target: "jwks.crypto", error = %e, "Published key has unknown alg");
        invalid_token()
    })?;
    if header.alg != algorithm.jwt_algorithm() {
        tracing::debug!(target: "jwks.crypto", kid = %kid, "Token alg does not match key");
        return Err(invalid_token());
    }

    let decoding_key = decoding_key(jwk)?;
    let mut validation = Validation::new(algorithm.jwt_algorithm());
    validation.validate_exp = true;
    validation.validate_aud = false;

    let token_data = decode::<serde_json::Map<String, serde_json::Value>>(
        token,
        &decoding_key,
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(target: "jwks.crypto", error = %e, "Token verification failed");
        invalid_token()
    })?;

    Ok(token_data.claims)
}

fn decoding_key(jwk: &PublicJwk) -> Result<DecodingKey, JwksError> {
    match &jwk.params {
        KeyParams::Ec { x, y, .. } => DecodingKey::from_ec_components(x, y),
        KeyParams::Okp { x, .. } => DecodingKey::from_ed_components(x),
    }
    .map_err(|e| {
        tracing::debug!(target: "jwks.crypto", error = %e, "Invalid public key components");
        invalid_token()
    })
}

fn invalid_token() -> JwksError {
    JwksError::InvalidToken(INVALID_TOKEN_MESSAGE.to_string())
}
