//! Fault injection tests for key store and key generation failures
//!
//! Failures must surface as generic 500 responses, never as a partial key set,
//! and must never overwrite stored state.

use jwks_service::models::KeySlot;
use jwks_test_utils::{
    corrupt_slot, expire_slot, stored_slots, test_config, test_store,
    CountingKeyMaterialProvider, JwksAssertions, TestJwksServer,
};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;

const TTL_SECONDS: i64 = 60;

async fn get_json(server: &TestJwksServer, path: &str) -> Result<(StatusCode, Value), anyhow::Error> {
    let response = server
        .client()
        .get(format!("{}{}", server.url(), path))
        .send()
        .await?;
    let status = response.status();
    Ok((status, response.json().await?))
}

fn assert_generic_error(body: &Value) {
    let text = body.to_string();
    assert!(body.get("keys").is_none(), "No partial key set on failure");
    assert!(body["error"]["code"].is_string());
    for leak in ["sqlx", "serde", "jwks_keys", "expected", "\"d\""] {
        assert!(!text.contains(leak), "Error body leaks '{}': {}", leak, text);
    }
}

#[tokio::test]
async fn test_corrupted_current_is_surfaced_not_repaired() -> Result<(), anyhow::Error> {
    let server = TestJwksServer::spawn(test_config(TTL_SECONDS)).await?;
    corrupt_slot(server.store(), KeySlot::Current).await?;

    let (status, body) = get_json(&server, "/jwks").await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "KEY_MANAGEMENT_ERROR");
    assert_generic_error(&body);

    let (status, _) = get_json(&server, "/generateJWT?sub=alice").await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // Still corrupted: nothing overwrote the slot
    assert!(server.store().get(KeySlot::Current).await.is_err());
    assert_eq!(stored_slots(server.store()).await?, vec!["current".to_string()]);

    Ok(())
}

#[tokio::test]
async fn test_corrupted_stale_fails_whole_key_set() -> Result<(), anyhow::Error> {
    let server = TestJwksServer::spawn(test_config(TTL_SECONDS)).await?;
    server.fetch_jwks().await?;
    corrupt_slot(server.store(), KeySlot::Stale).await?;

    let (status, body) = get_json(&server, "/jwks").await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_generic_error(&body);
    assert!(server.store().get(KeySlot::Stale).await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_closed_pool_fails_requests_and_readiness() -> Result<(), anyhow::Error> {
    let server = TestJwksServer::spawn(test_config(TTL_SECONDS)).await?;
    server.fetch_jwks().await?;

    server.store().pool().close().await;

    let (status, body) = get_json(&server, "/jwks").await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_generic_error(&body);

    let (status, body) = get_json(&server, "/ready").await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["database"], "unhealthy");
    assert_eq!(body["error"], "Service dependencies unavailable");

    // Liveness does not depend on the store
    let response = server
        .client()
        .get(format!("{}/health", server.url()))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_key_generation_failure_persists_nothing() -> Result<(), anyhow::Error> {
    let provider = Arc::new(CountingKeyMaterialProvider::ring());
    let server =
        TestJwksServer::spawn_with(test_store().await?, provider.clone(), test_config(TTL_SECONDS))
            .await?;

    provider.set_failing(true);
    let (status, body) = get_json(&server, "/jwks").await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "CRYPTO_ERROR");
    assert_generic_error(&body);

    let (status, body) = get_json(&server, "/ready").await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["database"], "healthy");
    assert_eq!(body["signing_key"], "unavailable");

    assert!(stored_slots(server.store()).await?.is_empty());

    provider.set_failing(false);
    server.fetch_jwks().await?.assert_key_count(1);
    assert_eq!(provider.generated(), 1);

    Ok(())
}

/// A failed rotation keeps the expired key out of the published set and
/// leaves both slots untouched.
#[tokio::test]
async fn test_failed_rotation_leaves_store_untouched() -> Result<(), anyhow::Error> {
    let provider = Arc::new(CountingKeyMaterialProvider::ring());
    let server =
        TestJwksServer::spawn_with(test_store().await?, provider.clone(), test_config(TTL_SECONDS))
            .await?;
    server.fetch_jwks().await?;
    let expired = expire_slot(server.store(), KeySlot::Current, TTL_SECONDS).await?;

    provider.set_failing(true);
    let (status, _) = get_json(&server, "/jwks").await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let current = server
        .store()
        .get(KeySlot::Current)
        .await?
        .ok_or_else(|| anyhow::anyhow!("current slot empty"))?;
    assert_eq!(current.kid(), expired.kid());
    assert_eq!(current.timestamp, expired.timestamp);
    assert!(server.store().get(KeySlot::Stale).await?.is_none());

    provider.set_failing(false);
    server
        .fetch_jwks()
        .await?
        .assert_key_count(2)
        .assert_contains_kid(expired.kid());

    Ok(())
}
