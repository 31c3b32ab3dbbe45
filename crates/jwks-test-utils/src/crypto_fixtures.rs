//! Cryptographic fixtures for testing
//!
//! Provides deterministic Ed25519 key material, the RFC 8037 test vector, and
//! a counting provider that can be switched into a failing mode.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jwks_service::crypto::{
    pkcs8_from_private_jwk, KeyMaterialProvider, KeyPairHandle, RingKeyMaterialProvider,
    SigningAlgorithm,
};
use jwks_service::errors::JwksError;
use jwks_service::models::{KeyParams, PrivateJwk};
use ring::signature::{Ed25519KeyPair, KeyPair};
use secrecy::SecretString;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// RFC 8037 Appendix A.1 private key `d`.
pub const RFC8037_D: &str = "nWGxne_9WmC6hEr0kuwsxERJxWl7MmkZcDusAxyuf2A";

/// RFC 8037 Appendix A.1 public key `x`.
pub const RFC8037_X: &str = "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo";

/// RFC 8037 Appendix A.3 thumbprint of the key above.
pub const RFC8037_THUMBPRINT: &str = "kPrK_qmxVWaYVA9wwBF6Iuo3vVzz7TxHCTwXBygrS4k";

/// RFC 8037 example key as a private JWK.
pub fn rfc8037_private_jwk() -> PrivateJwk {
    PrivateJwk {
        params: KeyParams::Okp {
            crv: "Ed25519".to_string(),
            x: RFC8037_X.to_string(),
        },
        d: SecretString::from(RFC8037_D.to_string()),
    }
}

/// Deterministic Ed25519 key pair.
///
/// The same `(seed, index)` always produces the same key.
pub fn test_key_pair(seed: u8, index: u64) -> Result<KeyPairHandle, JwksError> {
    let mut hasher = Sha256::new();
    hasher.update([seed]);
    hasher.update(index.to_be_bytes());
    let seed_bytes = hasher.finalize();

    let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
        .map_err(|e| JwksError::Crypto(format!("Failed to derive test keypair: {}", e)))?;

    let jwk = PrivateJwk {
        params: KeyParams::Okp {
            crv: "Ed25519".to_string(),
            x: URL_SAFE_NO_PAD.encode(key_pair.public_key().as_ref()),
        },
        d: SecretString::from(URL_SAFE_NO_PAD.encode(seed_bytes)),
    };

    Ok(KeyPairHandle::from_pkcs8(
        SigningAlgorithm::EdDsa,
        pkcs8_from_private_jwk(&jwk)?,
    ))
}

/// Provider that yields a reproducible sequence of Ed25519 keys.
///
/// Two providers with the same seed generate identical key sequences, so
/// key ids are stable across test runs. Only EdDSA is supported.
pub struct SeededKeyMaterialProvider {
    seed: u8,
    next_index: AtomicU64,
    ring: RingKeyMaterialProvider,
}

impl SeededKeyMaterialProvider {
    pub fn new(seed: u8) -> Self {
        Self {
            seed,
            next_index: AtomicU64::new(0),
            ring: RingKeyMaterialProvider::new(),
        }
    }
}

impl KeyMaterialProvider for SeededKeyMaterialProvider {
    fn generate_key_pair(&self, algorithm: SigningAlgorithm) -> Result<KeyPairHandle, JwksError> {
        if algorithm != SigningAlgorithm::EdDsa {
            return Err(JwksError::Crypto(format!(
                "Seeded key material supports EdDSA only, got {}",
                algorithm
            )));
        }
        let index = self.next_index.fetch_add(1, Ordering::SeqCst);
        test_key_pair(self.seed, index)
    }

    fn export_public(&self, handle: &KeyPairHandle) -> Result<KeyParams, JwksError> {
        self.ring.export_public(handle)
    }

    fn export_private(&self, handle: &KeyPairHandle) -> Result<PrivateJwk, JwksError> {
        self.ring.export_private(handle)
    }
}

/// Provider wrapper that counts key generations.
///
/// `set_failing(true)` makes every generation fail with a crypto error until
/// it is switched back.
pub struct CountingKeyMaterialProvider {
    inner: Arc<dyn KeyMaterialProvider>,
    generated: AtomicUsize,
    failing: AtomicBool,
}

impl CountingKeyMaterialProvider {
    pub fn new(inner: Arc<dyn KeyMaterialProvider>) -> Self {
        Self {
            inner,
            generated: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Wraps the production ring provider.
    pub fn ring() -> Self {
        Self::new(Arc::new(RingKeyMaterialProvider::new()))
    }

    /// Number of successful generations so far.
    pub fn generated(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl KeyMaterialProvider for CountingKeyMaterialProvider {
    fn generate_key_pair(&self, algorithm: SigningAlgorithm) -> Result<KeyPairHandle, JwksError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(JwksError::Crypto("Injected key generation failure".to_string()));
        }
        let handle = self.inner.generate_key_pair(algorithm)?;
        self.generated.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    fn export_public(&self, handle: &KeyPairHandle) -> Result<KeyParams, JwksError> {
        self.inner.export_public(handle)
    }

    fn export_private(&self, handle: &KeyPairHandle) -> Result<PrivateJwk, JwksError> {
        self.inner.export_private(handle)
    }
}
