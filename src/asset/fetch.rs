//! Fetching asset payloads from URLs and local paths.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::error::ApiError;
use crate::provider::{build_http_client, map_http_error, map_status};

/// Source of raw asset bytes.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, ApiError>;
}

/// `http(s)://` references go over the network; anything else is read from disk.
pub struct HttpAssetFetcher {
    client: Client,
    max_bytes: u64,
}

impl HttpAssetFetcher {
    pub fn new(request_timeout: Duration, max_bytes: u64) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_http_client(request_timeout)?,
            max_bytes,
        })
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = self.client.get(url).send().await.map_err(map_http_error)?;
        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(match status {
                StatusCode::NOT_FOUND | StatusCode::GONE => {
                    ApiError::AssetUnavailable(format!("{}: {}", status, url))
                }
                _ => map_status(status, detail),
            });
        }
        if let Some(len) = response.content_length() {
            self.check_size(len)?;
        }
        let bytes = response.bytes().await.map_err(map_http_error)?;
        self.check_size(bytes.len() as u64)?;
        Ok(bytes.to_vec())
    }

    async fn fetch_local(&self, path: &Path) -> Result<Vec<u8>, ApiError> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| local_error(path, e))?;
        self.check_size(metadata.len())?;
        tokio::fs::read(path).await.map_err(|e| local_error(path, e))
    }

    fn check_size(&self, len: u64) -> Result<(), ApiError> {
        if len > self.max_bytes {
            return Err(ApiError::InvalidAsset(format!(
                "payload of {} bytes exceeds limit of {} bytes",
                len, self.max_bytes
            )));
        }
        Ok(())
    }
}

fn local_error(path: &Path, err: std::io::Error) -> ApiError {
    match err.kind() {
        IoErrorKind::NotFound | IoErrorKind::PermissionDenied => {
            ApiError::AssetUnavailable(format!("{}: {}", path.display(), err))
        }
        _ => ApiError::Transport(format!("reading {}: {}", path.display(), err)),
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, ApiError> {
        debug!(reference, "fetching asset");
        if reference.starts_with("http://") || reference.starts_with("https://") {
            self.fetch_remote(reference).await
        } else {
            let path = reference.strip_prefix("file://").unwrap_or(reference);
            self.fetch_local(Path::new(path)).await
        }
    }
}
