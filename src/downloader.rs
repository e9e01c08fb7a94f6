//! Streaming downloads of package binaries and icons

use crate::client::request_error;
use crate::Result;
use reqwest::blocking::Client;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

/// Progress callback for transfers
///
/// Called with:
/// - `message`: What is being transferred (e.g., "Spotify.ipa")
/// - `current`: Bytes (or chunks) done so far
/// - `total`: Total bytes (or chunks), 0 when unknown
pub type ProgressCallback = Arc<dyn Fn(&str, u64, u64) + Send + Sync>;

/// Size of each read from the response body
pub const READ_BUFFER_SIZE: usize = 8192;

/// Stream `url` into `destination`
///
/// Returns `Ok(false)` when the server answers with a non-success status;
/// nothing is written in that case. Transport and IO failures are errors.
/// The caller owns cleanup of partially written files.
pub fn download(
    client: &Client,
    url: &str,
    destination: &Path,
    progress: Option<&ProgressCallback>,
) -> Result<bool> {
    let mut response = client
        .get(url)
        .send()
        .map_err(|e| request_error("Download", e))?;

    let status = response.status();
    if !status.is_success() {
        eprintln!("  ✗ Failed to download {}: HTTP {}", url, status.as_u16());
        return Ok(false);
    }

    let label = destination
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| url.to_string());
    let total = response.content_length().unwrap_or(0);

    let mut file = BufWriter::new(File::create(destination)?);
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    let mut written = 0u64;

    loop {
        let read = response.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])?;
        written += read as u64;

        if let Some(cb) = progress {
            cb(&label, written, total);
        }
    }

    file.flush()?;

    // Without a content length the callback never saw completion
    if let Some(cb) = progress {
        if total == 0 {
            cb(&label, written, written);
        }
    }

    Ok(true)
}
