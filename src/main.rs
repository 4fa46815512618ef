use std::sync::Arc;

use anyhow::Context;

use registration_flow::config::ServerConfig;
use registration_flow::registration::{RegistrationService, app};
use registration_flow::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::from_env().context("Failed to read configuration")?;

    // ── Database ─────────────────────────────────────────────────────────
    let backend = match config.db_file() {
        Some(path) => LibSqlBackend::new_local(&path)
            .await
            .with_context(|| format!("Failed to open database at {}", path.display()))?,
        None => LibSqlBackend::new_memory()
            .await
            .context("Failed to open in-memory database")?,
    };
    let db: Arc<dyn Database> = Arc::new(backend);

    // ── HTTP ─────────────────────────────────────────────────────────────
    let service = Arc::new(RegistrationService::new(db));
    let app = app(service);

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.bind_addr(),
        database = %config.db_path,
        "Registration flow server started"
    );

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
