//! mxc-scan library - USB barcode scanner bridge
//!
//! Reads Enter-terminated codes from the scanner (a character device in
//! serial/CDC mode, or stdin when the scanner types into a terminal),
//! drops repeats inside the cooldown window and forwards the rest to the
//! check-in service.

pub mod client;
pub mod reader;

use std::time::Instant;

use mxc_common::ScanDebouncer;
use thiserror::Error;
use tokio::io::AsyncBufRead;

pub use client::{CheckinClient, ScanReply};
pub use reader::{open_device, ScanReader};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Scanner I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Check-in service returned {status}: {message}")]
    Server { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Counters for one bridge run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub forwarded: u64,
    pub suppressed: u64,
    pub failed: u64,
}

/// Forward every code from `reader` until end of input.
///
/// A failed post is logged and counted; the bridge keeps reading.
pub async fn run_bridge<R>(
    reader: &mut ScanReader<R>,
    debouncer: &mut ScanDebouncer,
    client: &CheckinClient,
) -> Result<BridgeStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = BridgeStats::default();

    while let Some(code) = reader.next_code().await? {
        if !debouncer.accept(&code, Instant::now()) {
            tracing::debug!(code = %code, "Repeat scan inside cooldown, dropped");
            stats.suppressed += 1;
            continue;
        }

        match client.post_scan(&code).await {
            Ok(reply) => {
                tracing::info!(code = %code, outcome = %reply.outcome, state = ?reply.state, "Scan forwarded");
                stats.forwarded += 1;
            }
            Err(e) => {
                tracing::warn!(code = %code, error = %e, "Failed to forward scan");
                stats.failed += 1;
            }
        }
    }

    tracing::info!(?stats, "Scanner input closed");
    Ok(stats)
}
