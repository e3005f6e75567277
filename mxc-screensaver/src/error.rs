//! Error types for mxc-screensaver

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScreensaverError>;

#[derive(Debug, Error)]
pub enum ScreensaverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metrics file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
