//! Scanner input
//!
//! Scanners terminate each code with Enter; some send `\r\n`, some only
//! `\r`. Blank lines are noise from a double trigger and are skipped.

use std::path::Path;

use mxc_common::retry::{retry_with, RetryPolicy};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Longest code accepted; anything longer is a stuck key or garbage
pub const MAX_CODE_LEN: usize = 512;

pub struct ScanReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> ScanReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(64),
        }
    }

    /// Next non-empty code, or `None` at end of input
    pub async fn next_code(&mut self) -> std::io::Result<Option<String>> {
        loop {
            self.buf.clear();
            let line = read_until_enter(&mut self.inner, &mut self.buf).await?;
            if line.consumed == 0 {
                return Ok(None);
            }
            if line.overflowed {
                tracing::warn!(len = line.consumed, "Discarding oversized scan");
                continue;
            }

            let text = String::from_utf8_lossy(&self.buf);
            let code = text.trim();
            if code.is_empty() {
                continue;
            }
            if code.len() > MAX_CODE_LEN {
                tracing::warn!(len = code.len(), "Discarding oversized scan");
                continue;
            }
            return Ok(Some(code.to_string()));
        }
    }
}

struct LineRead {
    consumed: usize,
    /// More than `MAX_CODE_LEN` bytes arrived before Enter; `out` holds only the head
    overflowed: bool,
}

/// Read up to and including the next `\n` or `\r`.
///
/// At most `MAX_CODE_LEN + 1` bytes are kept in `out`; the rest of an
/// oversized line is consumed and dropped.
async fn read_until_enter<R: AsyncBufRead + Unpin>(reader: &mut R, out: &mut Vec<u8>) -> std::io::Result<LineRead> {
    let mut consumed = 0;
    let mut overflowed = false;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(LineRead { consumed, overflowed });
        }
        let (chunk, done) = match available.iter().position(|b| *b == b'\n' || *b == b'\r') {
            Some(i) => (i + 1, true),
            None => (available.len(), false),
        };

        let room = (MAX_CODE_LEN + 1).saturating_sub(out.len());
        if chunk > room {
            overflowed = true;
        }
        out.extend_from_slice(&available[..chunk.min(room)]);
        reader.consume(chunk);
        consumed += chunk;

        if done {
            return Ok(LineRead { consumed, overflowed });
        }
    }
}

/// Open the scanner device, retrying while it is not ready yet
/// (500, 1000 and 1500 ms before each attempt).
pub async fn open_device(path: &Path) -> std::io::Result<ScanReader<BufReader<File>>> {
    let file = retry_with(
        "open scanner",
        RetryPolicy::SCANNER_INIT,
        |_: &std::io::Error| true,
        || File::open(path),
    )
    .await?;
    tracing::info!(device = %path.display(), "Scanner opened");
    Ok(ScanReader::new(BufReader::new(file)))
}
