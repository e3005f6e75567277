//! MaxCheckin check-in service (mxc-checkin) - Main entry point
//!
//! Serves the kiosk, back-office, calling-panel and CRM webhook HTTP API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use mxc_checkin::crm::BitrixClient;
use mxc_checkin::db::settings;
use mxc_checkin::{build_router, AppState};
use mxc_common::config::{AppConfig, CliOverrides, ConfigResolver};
use mxc_common::db::init_database;
use mxc_screensaver::{Mulberry32, Screensaver, TransitionPicker, UsageMetrics};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for mxc-checkin
#[derive(Parser, Debug)]
#[command(name = "mxc-checkin")]
#[command(about = "Check-in service for the MaxCheckin kiosk")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "MXC_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:5780
    #[arg(short, long)]
    bind: Option<String>,

    /// SQLite database file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Bitrix24 inbound webhook base URL
    #[arg(long)]
    bitrix_webhook_url: Option<String>,
}

impl From<Args> for CliOverrides {
    fn from(args: Args) -> Self {
        Self {
            config_path: args.config,
            bind: args.bind,
            database: args.database,
            bitrix_webhook_url: args.bitrix_webhook_url,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let resolver = ConfigResolver::new(args.into());
    let toml = resolver.load_toml();
    let config = resolver.resolve_with(&toml);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("mxc_checkin={0},mxc_common={0},tower_http=info", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting MaxCheckin check-in service v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );
    info!("Database: {}", config.database_path.display());

    let db = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let state = build_state(db, &config).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;
    info!("Listening on http://{}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn build_state(db: sqlx::SqlitePool, config: &AppConfig) -> Result<AppState> {
    let webhook_url =
        settings::resolve_bitrix_webhook_url(&db, config.bitrix_webhook_url.as_deref()).await?;
    if webhook_url.is_none() {
        warn!("Bitrix24 webhook URL not configured; lead lookups will fail until it is set");
    }

    let bitrix = Arc::new(
        BitrixClient::new(webhook_url, Duration::from_secs(config.bitrix_timeout_secs))
            .context("Failed to create Bitrix24 client")?,
    );

    let screensaver_config = settings::load_screensaver_config(&db).await?;
    let metrics = match UsageMetrics::load(&config.metrics_path) {
        Ok(metrics) => metrics,
        Err(e) => {
            warn!(
                "Discarding unreadable screensaver metrics {}: {}",
                config.metrics_path.display(),
                e
            );
            UsageMetrics::default()
        }
    };
    let screensaver = Screensaver::new(
        screensaver_config,
        TransitionPicker::new(Mulberry32::from_clock()),
        metrics,
    );

    let crm = bitrix.clone();
    Ok(AppState::new(db, crm, config.scan_cooldown_ms)
        .with_bitrix(bitrix)
        .with_screensaver(screensaver, Some(config.metrics_path.clone())))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
