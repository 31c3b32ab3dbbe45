//! Integration tests for the probe and metrics endpoints

use jwks_test_utils::{stored_slots, test_config, TestJwksServer};
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn test_health_endpoint_returns_ok() -> Result<(), anyhow::Error> {
    let server = TestJwksServer::spawn(test_config(60)).await?;

    let response = server
        .client()
        .get(format!("{}/health", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, "OK");

    Ok(())
}

/// Readiness generates the signing key when none exists yet.
#[tokio::test]
async fn test_ready_endpoint_provisions_signing_key() -> Result<(), anyhow::Error> {
    let server = TestJwksServer::spawn(test_config(60)).await?;
    assert!(stored_slots(server.store()).await?.is_empty());

    let response = server
        .client()
        .get(format!("{}/ready", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["database"], "healthy");
    assert_eq!(body["signing_key"], "available");
    assert!(body.get("error").is_none());

    assert_eq!(stored_slots(server.store()).await?, vec!["current".to_string()]);

    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_serves_text() -> Result<(), anyhow::Error> {
    let server = TestJwksServer::spawn(test_config(60)).await?;
    server.fetch_jwks().await?;

    let response = server
        .client()
        .get(format!("{}/metrics", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_unknown_route_is_not_found() -> Result<(), anyhow::Error> {
    let server = TestJwksServer::spawn(test_config(60)).await?;

    let response = server
        .client()
        .get(format!("{}/keys", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}
