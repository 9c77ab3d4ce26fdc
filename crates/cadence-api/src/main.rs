// Cadence API server
// Decision: In-memory store when DATABASE_URL is unset (dev mode)

use std::sync::Arc;

use anyhow::{Context, Result};
use cadence_api::build_app;
use cadence_api::config::ApiConfig;
use cadence_storage::StorageBackend;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    // RUST_LOG overrides the default filter
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cadence_api=debug,cadence_core=debug,cadence_storage=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("cadence-api starting...");

    let config = ApiConfig::from_env().context("Invalid configuration")?;

    let backend =
        StorageBackend::from_url(config.database_url.as_deref(), config.db_max_connections)
            .await
            .context("Failed to initialize storage")?;
    tracing::info!(dev_mode = backend.is_dev_mode(), "Storage ready");

    if !config.api_prefix.is_empty() {
        tracing::info!(prefix = %config.api_prefix, "API prefix configured");
    }
    if config.cors_allowed_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
    } else {
        tracing::info!(origins = ?config.cors_allowed_origins, "CORS origins configured");
    }

    let app = build_app(Arc::new(backend), &config);

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("HTTP server listening on {}", config.http_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
