use crate::config::Config;
use crate::crypto::{KeyMaterialProvider, SigningAlgorithm};
use crate::errors::JwksError;
use crate::models::{Jwks, KeyRecord, KeySlot, PublicJwk, SigningKey};
use crate::observability::metrics::{record_key_rotation, record_stale_key_cleanup};
use crate::repositories::key_store::{CompareAndSwapOutcome, KeyStore};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::instrument;

/// Public key use published for every key.
const KEY_USE_SIGNATURE: &str = "sig";

/// Algorithm and lifetime applied to newly generated keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    pub algorithm: SigningAlgorithm,
    /// Maximum age of `current` before rotation, and of `stale` before removal.
    pub key_ttl: Duration,
}

impl RotationPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            algorithm: config.signing_algorithm,
            key_ttl: config.key_ttl(),
        }
    }
}

/// Owns the current/stale key lifecycle.
///
/// Rotation happens lazily when a caller observes that `current` is absent or
/// older than the TTL. Within a process, rotations are serialized by
/// `rotation_lock`; across processes sharing the store, the conditional
/// `swap_current` lets exactly one writer win and the others adopt its key.
pub struct RotationEngine {
    store: KeyStore,
    provider: Arc<dyn KeyMaterialProvider>,
    policy: RotationPolicy,
    rotation_lock: Mutex<()>,
}

impl RotationEngine {
    pub fn new(
        store: KeyStore,
        provider: Arc<dyn KeyMaterialProvider>,
        policy: RotationPolicy,
    ) -> Self {
        Self {
            store,
            provider,
            policy,
            rotation_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &KeyStore {
        &self.store
    }

    pub fn policy(&self) -> RotationPolicy {
        self.policy
    }

    /// Publishable key set: the current key, followed by the stale key while
    /// it is within its grace period.
    #[instrument(skip_all, name = "jwks.engine.get_public_keys")]
    pub async fn get_public_keys(&self) -> Result<Jwks, JwksError> {
        let current = self.ensure_fresh_current().await?;
        let stale = self.publishable_stale().await?;

        let mut keys = vec![current.public_key];
        if let Some(stale) = stale {
            // A concurrent rotation may have retired the key we just read
            if keys.iter().all(|key| key.kid != stale.public_key.kid) {
                keys.push(stale.public_key);
            }
        }

        Ok(Jwks { keys })
    }

    /// Signing material of the current key. Never returns an expired key.
    #[instrument(skip_all, name = "jwks.engine.get_signing_key")]
    pub async fn get_signing_key(&self) -> Result<SigningKey, JwksError> {
        let current = self.ensure_fresh_current().await?;
        let algorithm: SigningAlgorithm =
            current.public_key.alg.parse().map_err(JwksError::Crypto)?;

        Ok(SigningKey {
            kid: current.public_key.kid,
            algorithm,
            private_key: current.private_key,
        })
    }

    /// Replace `previous` with a freshly generated current key.
    ///
    /// `previous`, when present, is retired into the stale slot with its
    /// timestamp reset to the rotation instant, overwriting any earlier stale
    /// key. If another writer replaced `previous` first, nothing is written
    /// and that writer's key is returned.
    #[instrument(skip_all, name = "jwks.engine.rotate")]
    pub async fn rotate(&self, previous: Option<KeyRecord>) -> Result<KeyRecord, JwksError> {
        let _guard = self.rotation_lock.lock().await;
        self.rotate_locked(previous).await
    }

    /// Return `current`, rotating first when it is absent or expired.
    async fn ensure_fresh_current(&self) -> Result<KeyRecord, JwksError> {
        if let Some(current) = self.fresh(self.store.get(KeySlot::Current).await?) {
            return Ok(current);
        }

        let _guard = self.rotation_lock.lock().await;

        // Another task may have rotated while we waited
        match self.store.get(KeySlot::Current).await? {
            Some(current) if !self.is_expired(&current, Utc::now()) => Ok(current),
            outdated => self.rotate_locked(outdated).await,
        }
    }

    /// Stale key if still publishable; an expired one is deleted.
    async fn publishable_stale(&self) -> Result<Option<KeyRecord>, JwksError> {
        match self.store.get(KeySlot::Stale).await? {
            Some(stale) if self.is_expired(&stale, Utc::now()) => {}
            fresh_or_absent => return Ok(fresh_or_absent),
        }

        let _guard = self.rotation_lock.lock().await;

        // Re-check under the lock so a stale key written by a concurrent
        // rotation is never deleted
        match self.store.get(KeySlot::Stale).await? {
            Some(latest) if self.is_expired(&latest, Utc::now()) => {
                if self.store.delete_stale().await? {
                    record_stale_key_cleanup();
                    tracing::info!(
                        target: "jwks.engine",
                        kid = %latest.kid(),
                        retired_at = %latest.timestamp,
                        "Removed expired stale key"
                    );
                }
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn rotate_locked(&self, previous: Option<KeyRecord>) -> Result<KeyRecord, JwksError> {
        let now = Utc::now();
        let replacement = self
            .generate_record(now)
            .inspect_err(|_| record_key_rotation("error"))?;

        let expected_kid = previous.as_ref().map(|record| record.kid().to_string());
        let retired = previous.map(|mut record| {
            record.timestamp = now;
            record
        });

        let outcome = self
            .store
            .swap_current(expected_kid.as_deref(), retired.as_ref(), &replacement)
            .await
            .inspect_err(|_| record_key_rotation("error"))?;

        match outcome {
            CompareAndSwapOutcome::Updated => {
                record_key_rotation("success");
                tracing::info!(
                    target: "jwks.engine",
                    kid = %replacement.kid(),
                    previous_kid = ?expected_kid,
                    algorithm = %self.policy.algorithm,
                    "Rotated signing key"
                );
                Ok(replacement)
            }
            CompareAndSwapOutcome::Superseded => {
                record_key_rotation("superseded");
                let winner = self.store.get(KeySlot::Current).await?.ok_or_else(|| {
                    tracing::error!(
                        target: "jwks.engine",
                        "Current key vanished after a superseded rotation"
                    );
                    JwksError::Internal
                })?;
                tracing::debug!(
                    target: "jwks.engine",
                    kid = %winner.kid(),
                    "Rotation superseded, adopting current key"
                );
                Ok(winner)
            }
        }
    }

    fn generate_record(&self, now: DateTime<Utc>) -> Result<KeyRecord, JwksError> {
        let algorithm = self.policy.algorithm;
        let handle = self.provider.generate_key_pair(algorithm)?;
        let params = self.provider.export_public(&handle)?;
        let private_key = self.provider.export_private(&handle)?;
        let kid = self.provider.thumbprint(&params);

        Ok(KeyRecord {
            timestamp: now,
            public_key: PublicJwk {
                params,
                use_: KEY_USE_SIGNATURE.to_string(),
                alg: algorithm.as_str().to_string(),
                kid,
            },
            private_key,
        })
    }

    fn fresh(&self, record: Option<KeyRecord>) -> Option<KeyRecord> {
        record.filter(|record| !self.is_expired(record, Utc::now()))
    }

    fn is_expired(&self, record: &KeyRecord, now: DateTime<Utc>) -> bool {
        record.is_expired(self.policy.key_ttl, now)
    }
}
