//! HTTP fetch and decompression collaborators.

use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, warn};

/// HTTP client wrapper for upstream open-data servers.
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Create a fetcher with the given request timeout.
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Fetch a URL.
    ///
    /// `Ok(None)` means the server answered with a non-success status (the
    /// file is not published); transport failures are errors.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Option<Bytes>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request failed: {}", url))?;

        if !response.status().is_success() {
            debug!(url = %url, status = %response.status(), "File not available");
            return Ok(None);
        }

        let data = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read body: {}", url))?;

        debug!(url = %url, size = data.len(), "Fetched file");
        Ok(Some(data))
    }
}

/// Decompress a bz2 payload.
pub fn decompress_bz2(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = bzip2::read::BzDecoder::new(data);
    let mut out = Vec::new();

    if let Err(e) = decoder.read_to_end(&mut out) {
        warn!(error = %e, compressed_size = data.len(), "bz2 decompression failed");
        return Err(e).context("Failed to decompress bz2 payload");
    }

    Ok(out)
}
