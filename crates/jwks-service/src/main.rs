use jwks_service::config::Config;
use jwks_service::crypto::RingKeyMaterialProvider;
use jwks_service::observability::metrics::init_metrics_recorder;
use jwks_service::repositories::key_store::{connect_pool, KeyStore};
use jwks_service::routes::{self, AppState};
use jwks_service::services::rotation_engine::{RotationEngine, RotationPolicy};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jwks_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting JWKS service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        algorithm = %config.signing_algorithm,
        key_ttl_seconds = config.key_ttl_seconds,
        token_expiry_seconds = config.token_expiry_seconds,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics: {}", e);
        e
    })?;

    info!("Connecting to key store...");
    let pool = connect_pool(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| {
            error!("Failed to connect to key store: {}", e);
            e
        })?;
    let store = KeyStore::new(pool);
    store.ensure_schema().await.map_err(|e| {
        error!("Failed to initialize key store schema: {}", e);
        e
    })?;

    info!("Key store ready");

    let engine = Arc::new(RotationEngine::new(
        store,
        Arc::new(RingKeyMaterialProvider::new()),
        RotationPolicy::from_config(&config),
    ));

    // Generate or load the signing key before accepting traffic
    let signing_key = engine.get_signing_key().await.map_err(|e| {
        error!("Failed to initialize signing key: {}", e);
        e
    })?;
    info!(kid = %signing_key.kid, "Signing key initialized");

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let state = Arc::new(AppState::new(engine, config));
    let app = routes::build_routes(state, metrics_handle);

    info!("JWKS service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("JWKS service stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
