//! kino-catalog - Movie catalog service
//!
//! Serves composed movie views, ingestion, user roles and reviews over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kino_common::events::EventBus;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kino_catalog::config::ServiceConfig;
use kino_catalog::db::settings::CatalogSettings;
use kino_catalog::services::{HttpImageSource, ImageStore, SqliteImageStore};
use kino_catalog::AppState;

/// Command-line arguments for kino-catalog
#[derive(Parser, Debug)]
#[command(name = "kino-catalog")]
#[command(about = "Movie catalog service")]
#[command(version)]
struct Args {
    /// Root folder holding the catalog database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "KINO_BIND")]
    bind: Option<String>,

    /// Base URL of a remote images service
    #[arg(long, env = "KINO_IMAGES_URL")]
    images_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = kino_common::config::load_default_toml_config()
        .context("Failed to load config file")?;

    let config = ServiceConfig::resolve(
        args.root_folder.as_deref(),
        args.bind.as_deref(),
        args.images_url.as_deref(),
        &toml_config,
    )
    .context("Failed to initialize root folder")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.default_log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting kino-catalog");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let db = kino_common::db::init_database(&config.database_path)
        .await
        .context("Failed to open database")?;
    let settings = CatalogSettings::load(&db)
        .await
        .context("Failed to load settings")?;

    let event_bus = EventBus::new(settings.event_bus_capacity);

    let images: Arc<dyn ImageStore> = match &config.images_service_url {
        Some(url) => {
            info!("Images collaborator: {}", url);
            Arc::new(
                HttpImageSource::new(url.clone(), settings.collaborator_timeout())
                    .context("Failed to build images client")?,
            )
        }
        None => {
            info!("Images collaborator: local table");
            Arc::new(SqliteImageStore::new(db.clone(), settings.max_lock_wait_ms))
        }
    };

    let state = AppState::new(db.clone(), event_bus, settings, images);
    let app = kino_catalog::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;
    info!("Listening on http://{}", config.bind_address);
    info!("Health check: http://{}/health", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
