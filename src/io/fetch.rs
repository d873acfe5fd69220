//! Remote payload download.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::AppError;

/// Largest payload accepted from a remote URL.
pub const MAX_DOWNLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Blocking HTTP client for fetching input spreadsheets.
pub struct FileFetcher {
    client: Client,
    max_bytes: usize,
}

impl FileFetcher {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::new(4, format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            max_bytes: MAX_DOWNLOAD_BYTES,
        })
    }

    /// Override the download size cap.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Download `url` and return the body bytes.
    ///
    /// At most `max_bytes + 1` bytes are ever buffered.
    pub fn fetch(&self, url: &str) -> Result<Vec<u8>, AppError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| AppError::new(2, format!("Invalid file URL '{url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::new(
                2,
                format!("Unsupported URL scheme '{}' (expected http or https).", parsed.scheme()),
            ));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .map_err(|e| AppError::new(4, format!("Failed to download '{url}': {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::new(
                4,
                format!("Download of '{url}' failed with HTTP {status}."),
            ));
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes as u64 {
                return Err(self.too_large(declared));
            }
        }

        let mut body = Vec::new();
        let mut limited = response.take(self.max_bytes as u64 + 1);
        limited
            .read_to_end(&mut body)
            .map_err(|e| AppError::new(4, format!("Failed to read body of '{url}': {e}")))?;
        if body.len() > self.max_bytes {
            return Err(self.too_large(body.len() as u64));
        }

        tracing::info!(url, bytes = body.len(), "input downloaded");
        Ok(body)
    }

    fn too_large(&self, seen: u64) -> AppError {
        AppError::new(
            2,
            format!("Downloaded file exceeds the limit of {} bytes (got at least {seen}).", self.max_bytes),
        )
    }
}
