//! MaxCheckin scanner bridge (mxc-scan) - Main entry point

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mxc_common::config::DEFAULT_SCAN_COOLDOWN_MS;
use mxc_common::ScanDebouncer;
use mxc_scan::{open_device, run_bridge, CheckinClient, ScanReader};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Command-line arguments for mxc-scan
#[derive(Parser, Debug)]
#[command(name = "mxc-scan")]
#[command(about = "USB barcode scanner bridge for the MaxCheckin kiosk")]
#[command(version)]
struct Args {
    /// Base URL of the check-in service
    #[arg(short, long, default_value = "http://127.0.0.1:5780", env = "MXC_SERVER")]
    server: String,

    /// Scanner character device (e.g. /dev/ttyACM0); stdin when omitted
    #[arg(short, long, env = "MXC_SCAN_DEVICE")]
    device: Option<PathBuf>,

    /// Drop repeats of the same code within this window
    #[arg(long, default_value_t = DEFAULT_SCAN_COOLDOWN_MS, env = "MXC_SCAN_COOLDOWN_MS")]
    cooldown_ms: u64,

    /// Kiosk user the scans are attributed to
    #[arg(short, long, env = "MXC_USER_ID")]
    user_id: Uuid,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mxc_scan=info,mxc_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("Starting MaxCheckin scanner bridge v{}", env!("CARGO_PKG_VERSION"));

    let client = CheckinClient::new(&args.server, args.user_id)
        .context("Failed to create HTTP client")?;
    info!("Forwarding scans to {}", client.scan_url());

    let mut debouncer = ScanDebouncer::from_millis(args.cooldown_ms);

    let stats = match &args.device {
        Some(path) => {
            let mut reader = open_device(path)
                .await
                .with_context(|| format!("Failed to open scanner {}", path.display()))?;
            run_bridge(&mut reader, &mut debouncer, &client).await?
        }
        None => {
            info!("No device given, reading scans from stdin");
            let mut reader = ScanReader::new(BufReader::new(tokio::io::stdin()));
            run_bridge(&mut reader, &mut debouncer, &client).await?
        }
    };

    info!(
        "Scanner bridge stopped: {} forwarded, {} suppressed, {} failed",
        stats.forwarded, stats.suppressed, stats.failed
    );
    Ok(())
}
