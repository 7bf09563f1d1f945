//! Configuration loader: assembles sources in merge order and deserializes.

use config::{ConfigError, File};
use std::path::{Path, PathBuf};

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::AtelierConfig;
use crate::error::ApiError;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for `workspace_root`.
    ///
    /// Sources, lowest precedence first: built-in defaults,
    /// `~/.config/atelier/config.toml`, `config/config.toml`,
    /// `config/{ATELIER_ENV}.toml`, `ATELIER__*` environment variables.
    pub fn load(workspace_root: &Path) -> Result<AtelierConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        builder
            .add_source(merge_policy::environment())
            .build()?
            .try_deserialize()
    }

    /// Load a single file on top of the defaults. Environment overrides still apply.
    pub fn load_from_file(path: &Path) -> Result<AtelierConfig, ConfigError> {
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .add_source(merge_policy::environment())
            .build()?
            .try_deserialize()
    }

    /// Load and validate; the form the binary and the facade use.
    pub fn load_validated(
        workspace_root: &Path,
        explicit_file: Option<&Path>,
    ) -> Result<AtelierConfig, ApiError> {
        let config = match explicit_file {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load(workspace_root)?,
        };
        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(config)
    }

    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}
