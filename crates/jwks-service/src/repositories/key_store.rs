use crate::models::{KeyRecord, KeySlot};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Key store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Key store unavailable during {operation}{}", describe_slot(.slot))]
    Unavailable {
        operation: &'static str,
        slot: Option<KeySlot>,
        #[source]
        source: sqlx::Error,
    },

    /// The stored value is not a well-formed key record. Never repaired
    /// automatically.
    #[error("Key record in slot '{slot}' is corrupted")]
    Corrupted {
        slot: KeySlot,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode key record for slot '{slot}'")]
    Encode {
        slot: KeySlot,
        #[source]
        source: serde_json::Error,
    },
}

fn describe_slot(slot: &Option<KeySlot>) -> String {
    match slot {
        Some(slot) => format!(" (slot '{}')", slot),
        None => String::new(),
    }
}

/// Result of a conditional replacement of the `current` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareAndSwapOutcome {
    Updated,
    /// `current` changed since the caller read it; nothing was written.
    Superseded,
}

/// How long a connection waits for another writer's lock before failing.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Open the SQLite pool backing the key store.
///
/// In-memory databases live only as long as their connection, so they are
/// pinned to a single connection that is never recycled.
pub async fn connect_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool, StoreError> {
    let unavailable = |source: sqlx::Error| StoreError::Unavailable {
        operation: "connect",
        slot: None,
        source,
    };

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(unavailable)?
        .create_if_missing(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool_options = if is_in_memory(database_url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(max_connections)
    };

    pool_options.connect_with(options).await.map_err(unavailable)
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Persistent key-value store with one record per [`KeySlot`].
#[derive(Debug, Clone)]
pub struct KeyStore {
    pool: SqlitePool,
}

impl KeyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the backing table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jwks_keys (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slot TEXT NOT NULL UNIQUE CHECK (slot IN ('current', 'stale')),
                value TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|source| StoreError::Unavailable {
            operation: "ensure_schema",
            slot: None,
            source,
        })?;

        Ok(())
    }

    /// Read the record stored in `slot`.
    pub async fn get(&self, slot: KeySlot) -> Result<Option<KeyRecord>, StoreError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM jwks_keys WHERE slot = ?")
            .bind(slot.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|source| StoreError::Unavailable {
                operation: "get",
                slot: Some(slot),
                source,
            })?;

        value.map(|value| decode(slot, &value)).transpose()
    }

    /// Insert or replace the record stored in `slot`.
    pub async fn put(&self, slot: KeySlot, record: &KeyRecord) -> Result<(), StoreError> {
        let value = encode(slot, record)?;

        sqlx::query(UPSERT_SQL)
            .bind(slot.as_str())
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(|source| StoreError::Unavailable {
                operation: "put",
                slot: Some(slot),
                source,
            })?;

        Ok(())
    }

    /// Remove the stale record. Returns whether a record was removed.
    pub async fn delete_stale(&self) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM jwks_keys WHERE slot = ?")
            .bind(KeySlot::Stale.as_str())
            .execute(&self.pool)
            .await
            .map_err(|source| StoreError::Unavailable {
                operation: "delete_stale",
                slot: Some(KeySlot::Stale),
                source,
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace `current` only if it still holds the key with `expected_kid`
    /// (`None` meaning the slot is empty).
    ///
    /// On success `retired`, when given, is written to `stale` in the same
    /// transaction.
    pub async fn swap_current(
        &self,
        expected_kid: Option<&str>,
        retired: Option<&KeyRecord>,
        replacement: &KeyRecord,
    ) -> Result<CompareAndSwapOutcome, StoreError> {
        let unavailable = |operation: &'static str, slot: KeySlot| {
            move |source: sqlx::Error| StoreError::Unavailable {
                operation,
                slot: Some(slot),
                source,
            }
        };

        let replacement_value = encode(KeySlot::Current, replacement)?;
        let retired_value = retired
            .map(|record| encode(KeySlot::Stale, record))
            .transpose()?;

        // Take the write lock before reading so a concurrent writer waits
        // here instead of failing its lock upgrade after the read
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(unavailable("swap_current", KeySlot::Current))?;

        let stored = sqlx::query_scalar::<_, String>("SELECT value FROM jwks_keys WHERE slot = ?")
            .bind(KeySlot::Current.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(unavailable("swap_current", KeySlot::Current))?;
        let stored_kid = stored
            .map(|value| decode(KeySlot::Current, &value))
            .transpose()?
            .map(|record| record.public_key.kid);

        if stored_kid.as_deref() != expected_kid {
            tx.rollback()
                .await
                .map_err(unavailable("swap_current", KeySlot::Current))?;
            return Ok(CompareAndSwapOutcome::Superseded);
        }

        if let Some(value) = retired_value {
            sqlx::query(UPSERT_SQL)
                .bind(KeySlot::Stale.as_str())
                .bind(value)
                .execute(&mut *tx)
                .await
                .map_err(unavailable("swap_current", KeySlot::Stale))?;
        }

        sqlx::query(UPSERT_SQL)
            .bind(KeySlot::Current.as_str())
            .bind(replacement_value)
            .execute(&mut *tx)
            .await
            .map_err(unavailable("swap_current", KeySlot::Current))?;

        tx.commit()
            .await
            .map_err(unavailable("swap_current", KeySlot::Current))?;

        Ok(CompareAndSwapOutcome::Updated)
    }

    /// Connectivity probe.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|source| StoreError::Unavailable {
                operation: "ping",
                slot: None,
                source,
            })?;

        Ok(())
    }
}

const UPSERT_SQL: &str = r#"
    INSERT INTO jwks_keys (slot, value)
    VALUES (?, ?)
    ON CONFLICT(slot) DO UPDATE SET
        value = excluded.value,
        updated_at = CURRENT_TIMESTAMP
"#;

fn encode(slot: KeySlot, record: &KeyRecord) -> Result<String, StoreError> {
    serde_json::to_string(record).map_err(|source| StoreError::Encode { slot, source })
}

fn decode(slot: KeySlot, value: &str) -> Result<KeyRecord, StoreError> {
    serde_json::from_str(value).map_err(|source| StoreError::Corrupted { slot, source })
}

/// Fresh in-memory store with the schema applied.
#[cfg(test)]
pub(crate) async fn memory_store() -> KeyStore {
    #[allow(clippy::expect_used)]
    let pool = connect_pool("sqlite::memory:", 1)
        .await
        .expect("in-memory pool");
    let store = KeyStore::new(pool);
    #[allow(clippy::expect_used)]
    store.ensure_schema().await.expect("schema");
    store
}
