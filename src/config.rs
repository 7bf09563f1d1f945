//! Configuration System
//!
//! Layered configuration for the service client, the retry policies of each
//! call site, the orchestrator, the asset loader, telemetry and logging.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::asset::LoaderConfig;
use crate::error::ApiError;
use crate::generation::OrchestratorConfig;
use crate::logging::LoggingConfig;
use crate::provider::ServiceConfig;
use crate::retry::RetryConfig;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use merge::merge_policy::{ENV_PREFIX, ENV_SEPARATOR};
pub use sources::workspace_file::ENV_NAME_VAR;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtelierConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One retry policy per call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default)]
    pub submit: RetryConfig,

    #[serde(default)]
    pub poll: RetryConfig,

    #[serde(default = "default_fetch_retry")]
    pub fetch: RetryConfig,
}

fn default_fetch_retry() -> RetryConfig {
    RetryConfig {
        base_delay_ms: 250,
        max_delay_ms: 5_000,
        ..RetryConfig::default()
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            submit: RetryConfig::default(),
            poll: RetryConfig::default(),
            fetch: default_fetch_retry(),
        }
    }
}

/// Telemetry journal settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Persist telemetry events to the sled journal
    #[serde(default)]
    pub journal: bool,

    /// Journal directory. Defaults to the platform data directory.
    #[serde(default)]
    pub journal_path: Option<PathBuf>,

    /// Oldest events beyond this count are pruned when the journal opens
    #[serde(default = "default_max_events")]
    pub max_events: usize,
}

fn default_max_events() -> usize {
    10_000
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            journal: false,
            journal_path: None,
            max_events: default_max_events(),
        }
    }
}

impl TelemetryConfig {
    /// Configured journal path, or `<data dir>/telemetry` for this platform.
    pub fn resolved_journal_path(&self) -> Result<PathBuf, ApiError> {
        if let Some(path) = &self.journal_path {
            return Ok(path.clone());
        }
        directories::ProjectDirs::from("dev", "atelier", "atelier")
            .map(|dirs| dirs.data_dir().join("telemetry"))
            .ok_or_else(|| {
                ApiError::ConfigError(
                    "cannot determine a data directory; set telemetry.journal_path".to_string(),
                )
            })
    }
}

/// One invalid setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub section: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.section, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl AtelierConfig {
    /// Validate the entire configuration, collecting every problem.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let checks: [(&'static str, Result<(), ApiError>); 6] = [
            ("service", self.service.validate()),
            ("retry.submit", self.retry.submit.validate()),
            ("retry.poll", self.retry.poll.validate()),
            ("retry.fetch", self.retry.fetch.validate()),
            ("orchestrator", self.orchestrator.validate()),
            ("loader", self.loader.validate()),
        ];

        let errors: Vec<ValidationError> = checks
            .into_iter()
            .filter_map(|(section, result)| {
                result.err().map(|err| ValidationError {
                    section,
                    message: match err {
                        ApiError::ConfigError(message) => message,
                        other => other.to_string(),
                    },
                })
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Effective configuration as TOML, with the API key masked.
    pub fn to_toml(&self) -> Result<String, ApiError> {
        let mut shown = self.clone();
        if shown.service.api_key.is_some() {
            shown.service.api_key = Some("********".to_string());
        }
        toml::to_string_pretty(&shown)
            .map_err(|e| ApiError::ConfigError(format!("Failed to render configuration: {}", e)))
    }
}
