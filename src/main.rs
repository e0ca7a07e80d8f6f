//! shopbank - Main Application Entry Point
//!
//! REST API server for a banking-plus-shop application: users hold accounts,
//! deposit money, transfer it to other users and spend it on catalog products.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Open the storage backend (PostgreSQL pool + migrations, or in-memory)
//! 3. Seed the bootstrap admin and demo products when configured
//! 4. Build HTTP router with routes and middleware
//! 5. Serve until Ctrl-C / SIGTERM

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::HeaderValue;
use tracing_subscriber::EnvFilter;

use shopbank::{
    app::{self, AppState},
    config::{Config, StorageBackend},
    db,
    services::seed,
    store::{DynStore, memory::MemoryStore, postgres::PgStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    tracing::info!(backend = ?config.storage_backend, "Configuration loaded");

    let store = open_store(&config).await?;

    let mut state = AppState::from_config(store.clone(), &config);
    if let Some(origin) = &config.cors_allowed_origin {
        let origin = HeaderValue::from_str(origin)
            .context("CORS_ALLOWED_ORIGIN is not a valid header value")?;
        state = state.with_cors_origin(origin);
    }

    if let Some(admin) = config.admin_seed() {
        seed::ensure_admin(&store, &state.auth, admin).await?;
    }
    if config.seed_demo_products {
        seed::seed_demo_products(&store).await?;
    }

    let _sweeper = state.limits.spawn_sweeper();
    let app = app::router(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Peer addresses feed the per-client rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn open_store(config: &Config) -> anyhow::Result<DynStore> {
    match config.storage_backend {
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;

            let pool = db::create_pool(url, config.db_max_connections).await?;
            tracing::info!("Database pool created");

            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations complete");

            Ok(Arc::new(PgStore::new(pool, config.lock_timeout())))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on exit");
            Ok(Arc::new(MemoryStore::new(config.lock_timeout())))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received");
}
