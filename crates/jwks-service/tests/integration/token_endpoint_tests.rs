//! Integration tests for token issuance
//!
//! Tokens issued over GET and POST /generateJWT must verify against the
//! published key set, including across a rotation.

use jwks_service::config::Config;
use jwks_service::crypto::SigningAlgorithm;
use jwks_service::models::{GenerateJwtResponse, KeySlot};
use jwks_test_utils::{
    expire_slot, test_config, JwksAssertions, TestJwksServer, TokenAssertions,
};
use reqwest::StatusCode;
use serde_json::json;

const TTL_SECONDS: i64 = 60;

#[tokio::test]
async fn test_get_issues_token_with_query_claims() -> Result<(), anyhow::Error> {
    let server = TestJwksServer::spawn(test_config(TTL_SECONDS)).await?;

    let token = server
        .generate_jwt(&[("sub", "alice"), ("tenant", "acme")])
        .await?;
    let jwks = server.fetch_jwks().await?;

    token
        .assert_valid_jwt("ES256")
        .assert_signed_by(&jwks.keys[0].kid)
        .assert_lifetime(server.config().token_expiry_seconds)
        .assert_claim("sub", "alice")
        .assert_claim("tenant", "acme")
        .assert_verifies_against(&jwks);

    Ok(())
}

#[tokio::test]
async fn test_post_issues_token_with_json_claims() -> Result<(), anyhow::Error> {
    let server = TestJwksServer::spawn(test_config(TTL_SECONDS)).await?;

    let response = server
        .client()
        .post(format!("{}/generateJWT", server.url()))
        .json(&json!({ "sub": "bob", "admin": true, "groups": ["ops", "dev"] }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: GenerateJwtResponse = response.json().await?;

    body.jwt
        .assert_valid_jwt("ES256")
        .assert_claim("sub", "bob")
        .assert_claim("admin", true)
        .assert_claim("groups", json!(["ops", "dev"]))
        .assert_verifies_against(&server.fetch_jwks().await?);

    Ok(())
}

#[tokio::test]
async fn test_caller_cannot_choose_token_lifetime() -> Result<(), anyhow::Error> {
    let config = Config {
        token_expiry_seconds: 300,
        ..test_config(TTL_SECONDS)
    };
    let server = TestJwksServer::spawn(config).await?;

    let token = server
        .generate_jwt(&[("iat", "1"), ("exp", "99999999999")])
        .await?;

    token.assert_valid_jwt("ES256").assert_lifetime(300);

    Ok(())
}

#[tokio::test]
async fn test_post_rejects_non_object_body() -> Result<(), anyhow::Error> {
    let server = TestJwksServer::spawn(test_config(TTL_SECONDS)).await?;

    let response = server
        .client()
        .post(format!("{}/generateJWT", server.url()))
        .json(&json!(["not", "claims"]))
        .send()
        .await?;

    assert!(response.status().is_client_error());

    Ok(())
}

/// Tokens signed before a rotation verify until the old key's grace period
/// ends, then are rejected.
#[tokio::test]
async fn test_token_survives_rotation_until_grace_period_ends() -> Result<(), anyhow::Error> {
    let server = TestJwksServer::spawn(test_config(TTL_SECONDS)).await?;

    let before = server.generate_jwt(&[("sub", "before")]).await?;
    let original_kid = server.fetch_jwks().await?.keys[0].kid.clone();
    before.assert_signed_by(&original_kid);

    expire_slot(server.store(), KeySlot::Current, TTL_SECONDS).await?;

    let after = server.generate_jwt(&[("sub", "after")]).await?;
    let jwks = server.fetch_jwks().await?;
    jwks.assert_key_count(2).assert_contains_kid(&original_kid);

    before.assert_verifies_against(&jwks);
    after
        .assert_signed_by(&jwks.keys[0].kid)
        .assert_verifies_against(&jwks);
    assert_ne!(jwks.keys[0].kid, original_kid);

    expire_slot(server.store(), KeySlot::Stale, TTL_SECONDS).await?;
    let jwks = server.fetch_jwks().await?;

    before.assert_rejected_by(&jwks);
    after.assert_verifies_against(&jwks);

    Ok(())
}

#[tokio::test]
async fn test_eddsa_configuration_issues_eddsa_tokens() -> Result<(), anyhow::Error> {
    let config = Config {
        signing_algorithm: SigningAlgorithm::EdDsa,
        ..test_config(TTL_SECONDS)
    };
    let server = TestJwksServer::spawn(config).await?;

    let token = server.generate_jwt(&[("sub", "carol")]).await?;
    let jwks = server.fetch_jwks().await?;

    assert_eq!(jwks.keys[0].alg, "EdDSA");
    token
        .assert_valid_jwt("EdDSA")
        .assert_verifies_against(&jwks);

    Ok(())
}
