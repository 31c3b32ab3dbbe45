//! Test server harness for E2E testing
//!
//! Provides TestJwksServer for spawning real JWKS service instances in tests.

use chrono::Utc;
use jwks_service::config::{Config, DEFAULT_DB_MAX_CONNECTIONS};
use jwks_service::crypto::{KeyMaterialProvider, RingKeyMaterialProvider};
use jwks_service::models::{GenerateJwtResponse, Jwks};
use jwks_service::repositories::key_store::{connect_pool, KeyStore};
use jwks_service::routes::{self, AppState};
use jwks_service::services::rotation_engine::{RotationEngine, RotationPolicy};
use metrics_exporter_prometheus::PrometheusBuilder;
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Fresh, isolated in-memory SQLite pool.
///
/// Every call returns a separate database.
pub async fn test_pool() -> Result<SqlitePool, anyhow::Error> {
    Ok(connect_pool("sqlite::memory:", 1).await?)
}

/// Fresh key store with its schema in place.
pub async fn test_store() -> Result<KeyStore, anyhow::Error> {
    let store = KeyStore::new(test_pool().await?);
    store.ensure_schema().await?;
    Ok(store)
}

/// Key store over a SQLite file, with its own connection pool.
///
/// Stores opened on the same path share data but not connections, so their
/// transactions contend for the file lock like separate service instances.
pub async fn test_store_at(path: &Path) -> Result<KeyStore, anyhow::Error> {
    let url = format!("sqlite://{}", path.display());
    let store = KeyStore::new(connect_pool(&url, DEFAULT_DB_MAX_CONNECTIONS).await?);
    store.ensure_schema().await?;
    Ok(store)
}

/// Unique database file path under the system temp directory.
///
/// The file is created on first connect; callers remove it when done.
pub fn temp_db_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "jwks-{}-{}-{}.db",
        label,
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ))
}

/// Service configuration suitable for tests.
///
/// Binds to a random local port and keeps the JWKS cache lifetime within the
/// key TTL.
pub fn test_config(key_ttl_seconds: i64) -> Config {
    Config {
        bind_address: "127.0.0.1:0".to_string(),
        key_ttl_seconds,
        jwks_max_age_seconds: key_ttl_seconds.min(60),
        ..Config::default()
    }
}

/// Test harness for spawning the JWKS service in E2E tests
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_jwks_e2e() -> Result<()> {
///     let server = TestJwksServer::spawn(test_config(60)).await?;
///
///     let response = reqwest::get(server.jwks_url()).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestJwksServer {
    addr: SocketAddr,
    engine: Arc<RotationEngine>,
    config: Config,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestJwksServer {
    /// Spawn a server backed by a fresh in-memory store and the ring provider.
    pub async fn spawn(config: Config) -> Result<Self, anyhow::Error> {
        let store = test_store().await?;
        Self::spawn_with(store, Arc::new(RingKeyMaterialProvider::new()), config).await
    }

    /// Spawn a server over an existing store and key material provider.
    ///
    /// The store is used as-is: no signing key is generated up front, so
    /// tests can observe first-request behavior.
    pub async fn spawn_with(
        store: KeyStore,
        provider: Arc<dyn KeyMaterialProvider>,
        config: Config,
    ) -> Result<Self, anyhow::Error> {
        let engine = Arc::new(RotationEngine::new(
            store,
            provider,
            RotationPolicy::from_config(&config),
        ));

        let state = Arc::new(AppState::new(engine.clone(), config.clone()));

        // Standalone recorder; the global one may already be installed by
        // another test in this process.
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            engine,
            config,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn jwks_url(&self) -> String {
        format!("{}/jwks", self.url())
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn engine(&self) -> &Arc<RotationEngine> {
        &self.engine
    }

    pub fn store(&self) -> &KeyStore {
        self.engine.store()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// GET /jwks, failing on any non-success status.
    pub async fn fetch_jwks(&self) -> Result<Jwks, anyhow::Error> {
        let jwks = self
            .client
            .get(self.jwks_url())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(jwks)
    }

    /// GET /generateJWT with the given query claims, returning the token.
    pub async fn generate_jwt(&self, claims: &[(&str, &str)]) -> Result<String, anyhow::Error> {
        let response: GenerateJwtResponse = self
            .client
            .get(format!("{}/generateJWT", self.url()))
            .query(claims)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.jwt)
    }
}

impl Drop for TestJwksServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
