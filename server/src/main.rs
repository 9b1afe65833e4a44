// /server/src/main.rs
use std::sync::Arc;

use anyhow::{Context, Result};
use loo_server::{
    build_app,
    config::{Config, StorageBackend},
    db,
    repository::{InMemoryLooRepository, LooRepository, PgLooRepository},
    state::AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loo_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    let repo: Arc<dyn LooRepository> = match config.storage_backend {
        StorageBackend::Postgres => {
            let pool = db::connect_db(&config.database_url, config.db_max_connections)
                .await
                .context("failed to connect to PostgreSQL")?;
            Arc::new(PgLooRepository::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store, data is lost on restart");
            Arc::new(InMemoryLooRepository::new())
        }
    };
    repo.init().await.context("failed to run migrations")?;

    let addr = config.address();
    let app = build_app(AppState::new(repo, config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down");
}
