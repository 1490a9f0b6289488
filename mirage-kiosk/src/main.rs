//! mirage-kiosk - Photo installation kiosk service
//!
//! Serves the visitor flow, the image generation endpoint and the result
//! pages for the second-device QR path.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use mirage_common::config::TomlConfig;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mirage_kiosk::config::{Args, KioskConfig};
use mirage_kiosk::services::{GeminiClient, VariationGenerator};
use mirage_kiosk::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (toml_config, config_warnings) = TomlConfig::load(args.config.as_deref());
    let config = KioskConfig::resolve(&args, toml_config);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("mirage_kiosk={level},mirage_common={level},tower_http=info", level = config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    for warning in &config_warnings {
        warn!("{}", warning);
    }

    info!(
        "Starting mirage-kiosk v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Root folder: {}", config.root_folder.display());
    info!("Database: {}", config.database_path.display());

    let db_pool = mirage_common::db::init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    info!("Database connection established");

    let generator = match config.api_key() {
        Some(key) => {
            let client = GeminiClient::new(key.to_string(), &config.generation)
                .context("Failed to create Gemini client")?;
            info!("Image generation via Gemini model {}", client.model());

            let generator = VariationGenerator::new(
                Arc::new(client),
                Duration::from_millis(config.generation.pacing_ms),
            )
            .with_throttle_retries(config.generation.throttle_retries);
            Some(Arc::new(generator))
        }
        None => {
            warn!("No Gemini API key configured; image generation requests will fail");
            None
        }
    };

    let state = AppState::new(db_pool, generator, config.flow.clone());

    let tab_ttl = Duration::from_secs(config.flow.tab_ttl_secs);
    let sweep_every = tab_ttl.clamp(Duration::from_secs(1), Duration::from_secs(60));
    state.tabs.spawn_sweeper(tab_ttl, sweep_every);
    info!("Idle tabs expire after {:?}", tab_ttl);
    let app = mirage_kiosk::build_router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_addr))?;
    info!("Listening on http://{}", config.listen_addr);
    info!("Health check: http://{}/health", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
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
                warn!("Failed to install terminate handler: {}", e);
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
