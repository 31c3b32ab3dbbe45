//! Integration tests for the published key set
//!
//! Exercises GET /jwks and GET /.well-known/jwks.json against a real server,
//! simulating key expiry by back-dating stored timestamps.

use chrono::Utc;
use jwks_service::crypto::jwk_thumbprint;
use jwks_service::models::{Jwks, KeySlot};
use jwks_test_utils::{
    age_slot, expire_slot, stored_slots, test_config, test_store, JwksAssertions,
    SeededKeyMaterialProvider, TestJwksServer,
};
use reqwest::{header, StatusCode};
use serde_json::Value;
use std::sync::Arc;

const TTL_SECONDS: i64 = 60;

/// Fresh key, expired current, expired stale, observed over HTTP.
#[tokio::test]
async fn test_rotation_scenario_with_one_second_ttl() -> Result<(), anyhow::Error> {
    let server = TestJwksServer::spawn(test_config(1)).await?;

    // Fresh key
    let first = server.fetch_jwks().await?;
    first.assert_key_count(1);
    let original_kid = first.keys[0].kid.clone();

    // Current older than TTL: rotation publishes both keys
    expire_slot(server.store(), KeySlot::Current, 1).await?;
    let rotated = server.fetch_jwks().await?;
    rotated
        .assert_key_count(2)
        .assert_contains_kid(&original_kid)
        .assert_unique_kids();
    assert_ne!(rotated.keys[0].kid, original_kid, "Current key must be new");
    assert_eq!(rotated.keys[1].kid, original_kid, "Stale key is listed second");

    // Stale older than TTL: removed from the set and from the store
    expire_slot(server.store(), KeySlot::Stale, 1).await?;
    let cleaned = server.fetch_jwks().await?;
    cleaned
        .assert_key_count(1)
        .assert_current_kid(&rotated.keys[0].kid)
        .assert_lacks_kid(&original_kid);
    assert_eq!(stored_slots(server.store()).await?, vec!["current".to_string()]);

    Ok(())
}

#[tokio::test]
async fn test_both_routes_publish_same_key_set() -> Result<(), anyhow::Error> {
    let server = TestJwksServer::spawn(test_config(TTL_SECONDS)).await?;

    let jwks = server.fetch_jwks().await?;
    let well_known: Jwks = server
        .client()
        .get(format!("{}/.well-known/jwks.json", server.url()))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    assert_eq!(jwks, well_known);

    Ok(())
}

#[tokio::test]
async fn test_jwks_response_is_cacheable_within_ttl() -> Result<(), anyhow::Error> {
    let server = TestJwksServer::spawn(test_config(30)).await?;

    let response = server.client().get(server.jwks_url()).send().await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok()),
        Some("max-age=30")
    );
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json")));

    Ok(())
}

#[tokio::test]
async fn test_repeated_fetches_reuse_current_key() -> Result<(), anyhow::Error> {
    let server = TestJwksServer::spawn(test_config(TTL_SECONDS)).await?;

    let first = server.fetch_jwks().await?;
    age_slot(server.store(), KeySlot::Current, TTL_SECONDS - 5).await?;
    let second = server.fetch_jwks().await?;

    assert_eq!(first, second, "Key within its TTL must not rotate");
    assert_eq!(stored_slots(server.store()).await?, vec!["current".to_string()]);

    Ok(())
}

/// Published keys never carry private or bookkeeping members.
#[tokio::test]
async fn test_published_keys_have_no_private_members() -> Result<(), anyhow::Error> {
    let server = TestJwksServer::spawn(test_config(TTL_SECONDS)).await?;
    server.fetch_jwks().await?;
    expire_slot(server.store(), KeySlot::Current, TTL_SECONDS).await?;

    let body: Value = server
        .client()
        .get(server.jwks_url())
        .send()
        .await?
        .json()
        .await?;

    let keys = body["keys"].as_array().cloned().unwrap_or_default();
    assert_eq!(keys.len(), 2);
    for key in keys {
        for member in ["d", "privateKey", "private_key", "timestamp"] {
            assert!(key.get(member).is_none(), "Published key exposes '{}'", member);
        }
        assert_eq!(key["use"], "sig");
        assert_eq!(key["alg"], "ES256");
        assert_eq!(key["kty"], "EC");
        assert_eq!(key["crv"], "P-256");
    }

    Ok(())
}

/// Key ids are RFC 7638 thumbprints of the published parameters.
#[tokio::test]
async fn test_kid_is_thumbprint_of_public_key() -> Result<(), anyhow::Error> {
    let server = TestJwksServer::spawn(test_config(TTL_SECONDS)).await?;
    server.fetch_jwks().await?;
    expire_slot(server.store(), KeySlot::Current, TTL_SECONDS).await?;

    let jwks = server.fetch_jwks().await?;
    for key in &jwks.keys {
        assert_eq!(key.kid, jwk_thumbprint(&key.params));
    }

    Ok(())
}

/// Servers generating the same key material publish the same kids.
#[tokio::test]
async fn test_identical_key_material_yields_identical_kids() -> Result<(), anyhow::Error> {
    let config = jwks_service::config::Config {
        signing_algorithm: jwks_service::crypto::SigningAlgorithm::EdDsa,
        ..test_config(TTL_SECONDS)
    };

    let first = TestJwksServer::spawn_with(
        test_store().await?,
        Arc::new(SeededKeyMaterialProvider::new(42)),
        config.clone(),
    )
    .await?;
    let second = TestJwksServer::spawn_with(
        test_store().await?,
        Arc::new(SeededKeyMaterialProvider::new(42)),
        config,
    )
    .await?;

    let a = first.fetch_jwks().await?;
    let b = second.fetch_jwks().await?;

    assert_eq!(a, b);
    assert_eq!(a.keys[0].alg, "EdDSA");

    Ok(())
}

/// The key returned as current is never older than the TTL.
#[tokio::test]
async fn test_current_key_is_never_expired() -> Result<(), anyhow::Error> {
    let server = TestJwksServer::spawn(test_config(TTL_SECONDS)).await?;
    server.fetch_jwks().await?;

    for _ in 0..3 {
        expire_slot(server.store(), KeySlot::Current, TTL_SECONDS).await?;
        let jwks = server.fetch_jwks().await?;

        let current = server
            .store()
            .get(KeySlot::Current)
            .await?
            .ok_or_else(|| anyhow::anyhow!("current slot empty"))?;
        jwks.assert_current_kid(current.kid());
        assert!(!current.is_expired(server.engine().policy().key_ttl, Utc::now()));
    }

    Ok(())
}

/// The stale key stays published for a full TTL after rotation.
#[tokio::test]
async fn test_stale_key_published_through_grace_period() -> Result<(), anyhow::Error> {
    let server = TestJwksServer::spawn(test_config(TTL_SECONDS)).await?;
    let original_kid = server.fetch_jwks().await?.keys[0].kid.clone();

    expire_slot(server.store(), KeySlot::Current, TTL_SECONDS).await?;
    server.fetch_jwks().await?;

    age_slot(server.store(), KeySlot::Stale, TTL_SECONDS - 5).await?;
    server
        .fetch_jwks()
        .await?
        .assert_key_count(2)
        .assert_contains_kid(&original_kid);

    age_slot(server.store(), KeySlot::Stale, 10).await?;
    server
        .fetch_jwks()
        .await?
        .assert_key_count(1)
        .assert_lacks_kid(&original_kid);

    Ok(())
}
