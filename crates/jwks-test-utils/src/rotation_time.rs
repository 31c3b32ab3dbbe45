//! Time manipulation utilities for key rotation tests
//!
//! Rewrites stored key records so tests can simulate the passage of time
//! without sleeping through a key TTL.

use chrono::{DateTime, Duration, Utc};
use jwks_service::models::{KeyRecord, KeySlot};
use jwks_service::repositories::key_store::KeyStore;

/// Set the timestamp of the record stored in `slot`.
///
/// # Example
/// ```rust,ignore
/// // Make the current key ten minutes old
/// set_slot_timestamp(&store, KeySlot::Current, Utc::now() - Duration::minutes(10)).await?;
/// ```
pub async fn set_slot_timestamp(
    store: &KeyStore,
    slot: KeySlot,
    timestamp: DateTime<Utc>,
) -> Result<KeyRecord, anyhow::Error> {
    let mut record = store
        .get(slot)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No record stored in slot '{}'", slot))?;

    record.timestamp = timestamp;
    store.put(slot, &record).await?;

    Ok(record)
}

/// Move the record in `slot` back by `seconds`.
pub async fn age_slot(
    store: &KeyStore,
    slot: KeySlot,
    seconds: i64,
) -> Result<KeyRecord, anyhow::Error> {
    let record = store
        .get(slot)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No record stored in slot '{}'", slot))?;

    set_slot_timestamp(store, slot, record.timestamp - Duration::seconds(seconds)).await
}

/// Make the record in `slot` older than `ttl_seconds`.
///
/// The record lands one second past the TTL, which is the smallest age the
/// engine treats as expired.
pub async fn expire_slot(
    store: &KeyStore,
    slot: KeySlot,
    ttl_seconds: i64,
) -> Result<KeyRecord, anyhow::Error> {
    set_slot_timestamp(
        store,
        slot,
        Utc::now() - Duration::seconds(ttl_seconds + 1),
    )
    .await
}

/// Overwrite `slot` with a value that does not parse as a key record.
pub async fn corrupt_slot(store: &KeyStore, slot: KeySlot) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO jwks_keys (slot, value) VALUES (?, '{"timestamp": "not a key"}')
        ON CONFLICT(slot) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(slot.as_str())
    .execute(store.pool())
    .await?;

    Ok(())
}

/// Slots that currently hold a row, in alphabetical order.
pub async fn stored_slots(store: &KeyStore) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT slot FROM jwks_keys ORDER BY slot")
        .fetch_all(store.pool())
        .await
}
