//! Generation Service Client
//!
//! The remote service that turns photos or video into body and garment meshes.
//! [`GenerationService`] is the seam the orchestrator talks to;
//! [`HttpGenerationService`] is the production implementation over HTTP(S).

mod wire;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::error::ApiError;
use crate::generation::task::{StatusReport, TaskKind};

/// Input media and options for one generation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationPayload {
    /// Image or video locators (URLs or upload ids), in capture order.
    pub media: Vec<String>,
    /// Free-form options forwarded to the service (height hint, garment type, ...).
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl GenerationPayload {
    pub fn new(media: Vec<String>) -> Self {
        Self {
            media,
            options: Map::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Check the payload shape against what `kind` expects.
    ///
    /// Body-from-images takes one or more images; every other kind takes
    /// exactly one item.
    pub fn validate_for(&self, kind: TaskKind) -> Result<(), ApiError> {
        if self.media.iter().any(|m| m.trim().is_empty()) {
            return Err(ApiError::InvalidRequest(
                "media entries must not be empty".to_string(),
            ));
        }
        match (kind, self.media.len()) {
            (_, 0) => Err(ApiError::InvalidRequest(format!(
                "{} requires at least one media item",
                kind
            ))),
            (TaskKind::BodyFromImages, _) | (_, 1) => Ok(()),
            (_, n) => Err(ApiError::InvalidRequest(format!(
                "{} takes exactly one media item (got {})",
                kind, n
            ))),
        }
    }
}

/// Acknowledgement of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTicket {
    pub task_id: String,
}

/// Remote generation service.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Submit a job; returns the id assigned by the service.
    async fn submit(
        &self,
        kind: TaskKind,
        payload: &GenerationPayload,
    ) -> Result<TaskTicket, ApiError>;

    /// Current status of a job.
    async fn status(&self, task_id: &str) -> Result<StatusReport, ApiError>;

    fn service_name(&self) -> &str;
}

/// Connection settings for [`HttpGenerationService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token. Usually supplied via `ATELIER__SERVICE__API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Whole-request timeout enforced by the HTTP client (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8600".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ApiError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ApiError::ConfigError(format!(
                "service.base_url must be an http(s) URL (got '{}')",
                self.base_url
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ApiError::ConfigError(
                "service.request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// Helper function to map reqwest errors to ApiError
pub(crate) fn map_http_error(error: reqwest::Error) -> ApiError {
    if let Some(status) = error.status() {
        map_status(status, error.to_string())
    } else if error.is_timeout() {
        ApiError::Transport(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        ApiError::Transport(format!("Connection error: {}", error))
    } else if error.is_decode() || error.is_body() {
        ApiError::Transport(format!("Malformed response: {}", error))
    } else if error.is_builder() {
        ApiError::InvalidRequest(format!("Invalid request: {}", error))
    } else {
        ApiError::Transport(format!("HTTP error: {}", error))
    }
}

/// Classify a non-success HTTP status.
pub(crate) fn map_status(status: StatusCode, detail: String) -> ApiError {
    match status.as_u16() {
        401 | 403 => ApiError::Unauthorized(format!("{}: {}", status, detail)),
        408 | 429 => ApiError::Transport(format!("{}: {}", status, detail)),
        500..=599 => ApiError::Transport(format!("{}: {}", status, detail)),
        _ => ApiError::Rejected(format!("{}: {}", status, detail)),
    }
}

pub(crate) const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn build_http_client(request_timeout: Duration) -> Result<Client, ApiError> {
    Client::builder()
        .connect_timeout(HTTP_CONNECT_TIMEOUT.min(request_timeout))
        .timeout(request_timeout)
        .build()
        .map_err(|e| ApiError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a non-success response into an error, keeping the body text for context.
pub(crate) async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(map_status(status, error_text))
}

/// HTTP client for the generation service
pub struct HttpGenerationService {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpGenerationService {
    pub fn new(config: &ServiceConfig) -> Result<Self, ApiError> {
        config.validate()?;
        let client = build_http_client(Duration::from_millis(config.request_timeout_ms))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    async fn submit(
        &self,
        kind: TaskKind,
        payload: &GenerationPayload,
    ) -> Result<TaskTicket, ApiError> {
        let url = format!("{}/v1/generations/{}", self.base_url, kind.slug());
        let body = wire::SubmitRequest {
            media: &payload.media,
            options: &payload.options,
        };
        debug!(url = %url, kind = %kind, media = payload.media.len(), "submitting generation");

        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(map_http_error)?;
        let response = check_status(response).await?;

        let parsed: wire::SubmitResponse = response.json().await.map_err(map_http_error)?;
        parsed.into_ticket()
    }

    async fn status(&self, task_id: &str) -> Result<StatusReport, ApiError> {
        let url = format!("{}/v1/generations/{}", self.base_url, task_id);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(map_http_error)?;
        let response = check_status(response).await?;

        let parsed: wire::StatusResponse = response.json().await.map_err(map_http_error)?;
        parsed.into_report()
    }

    fn service_name(&self) -> &str {
        "http"
    }
}
