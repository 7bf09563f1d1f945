//! CLI route: single route table and run context.

use futures::StreamExt;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::api::Atelier;
use crate::asset::AssetChain;
use crate::cli::parse::{Commands, ConfigCommands};
use crate::cli::presentation::{
    format_events, format_resolution, format_status_report, format_task,
};
use crate::config::{AtelierConfig, ConfigLoader};
use crate::error::ApiError;
use crate::generation::{TaskKind, TaskView};
use crate::provider::GenerationPayload;
use crate::telemetry::TelemetryJournal;

/// Runtime context for CLI execution: workspace, config path and loaded config.
pub struct RunContext {
    workspace_root: PathBuf,
    config_path: Option<PathBuf>,
    config: AtelierConfig,
}

impl RunContext {
    /// Load configuration for the workspace. Validation happens when a command
    /// needs the runtime, so `config validate` can report every problem.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Ok(Self {
            workspace_root,
            config_path,
            config,
        })
    }

    pub fn config(&self) -> &AtelierConfig {
        &self.config
    }

    fn atelier(&self) -> Result<Atelier, ApiError> {
        let config =
            ConfigLoader::load_validated(&self.workspace_root, self.config_path.as_deref())?;
        Atelier::from_config(&config)
    }

    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Generate {
                kind,
                media,
                payload,
                options,
                wait,
                resolve,
                format,
            } => {
                let payload = build_payload(payload.as_deref(), media, options)?;
                self.handle_generate(*kind, &payload, *wait, *resolve, format)
                    .await
            }
            Commands::Status { task_id, format } => {
                let atelier = self.atelier()?;
                let report = atelier.task_status(task_id).await?;
                format_status_report(task_id, &report, format)
            }
            Commands::Resolve {
                references,
                shape,
                format,
            } => {
                let atelier = self.atelier()?;
                let chain = AssetChain::from_references(references.iter().cloned(), *shape);
                let resolution = atelier.loader().resolve(&chain).await;
                format_resolution(&resolution, format)
            }
            Commands::Config { command } => self.handle_config(command),
            Commands::Journal { limit, format } => {
                let path = self.config.telemetry.resolved_journal_path()?;
                if !path.exists() {
                    return Ok(format!("No telemetry journal at {}.", path.display()));
                }
                let journal = TelemetryJournal::open(&path)?;
                let events = journal.read_recent(*limit)?;
                format_events(&events, format)
            }
        }
    }

    async fn handle_generate(
        &self,
        kind: TaskKind,
        payload: &GenerationPayload,
        wait: bool,
        resolve: bool,
        format: &str,
    ) -> Result<String, ApiError> {
        let atelier = self.atelier()?;
        let handle = atelier.submit_generation(kind, payload).await?;
        info!(task_id = %handle.id(), kind = %kind, "task submitted from CLI");

        if !wait {
            return format_task(&handle.snapshot(), format);
        }

        let mut updates = Box::pin(handle.updates());
        while let Some(task) = updates.next().await {
            if let TaskView::Working { status, progress } = task.view() {
                eprintln!("{} {} {}%", task.id, status, progress);
            }
        }

        let task = handle.snapshot();
        let mut out = format_task(&task, format)?;
        if resolve {
            if let Some(resolution) = atelier.resolve_task_result(&task).await {
                debug!(selected = resolution.selected, "generated asset resolved");
                out.push('\n');
                out.push_str(&format_resolution(&resolution, format)?);
            }
        }
        Ok(out)
    }

    fn handle_config(&self, command: &ConfigCommands) -> Result<String, ApiError> {
        match command {
            ConfigCommands::Show => self.config.to_toml(),
            ConfigCommands::Validate => match self.config.validate() {
                Ok(()) => Ok("Configuration is valid.".to_string()),
                Err(errors) => {
                    let lines: Vec<String> =
                        errors.iter().map(|e| format!("  - {}", e)).collect();
                    Err(ApiError::ConfigError(format!(
                        "{} problem(s):\n{}",
                        errors.len(),
                        lines.join("\n")
                    )))
                }
            },
        }
    }
}

/// Assemble a payload from an optional JSON file plus `--media` and
/// `--option key=value` flags. Flags are applied on top of the file.
pub fn build_payload(
    file: Option<&Path>,
    media: &[String],
    options: &[String],
) -> Result<GenerationPayload, ApiError> {
    let mut payload = match file {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                ApiError::InvalidRequest(format!("cannot read payload {}: {}", path.display(), e))
            })?;
            serde_json::from_str(&raw).map_err(|e| {
                ApiError::InvalidRequest(format!("invalid payload {}: {}", path.display(), e))
            })?
        }
        None => GenerationPayload::default(),
    };

    payload.media.extend(media.iter().cloned());
    for option in options {
        let (key, value) = option.split_once('=').ok_or_else(|| {
            ApiError::InvalidRequest(format!("option '{}' must be KEY=VALUE", option))
        })?;
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        payload.options.insert(key.trim().to_string(), value);
    }
    Ok(payload)
}
