//! CLI parse: clap types for Atelier. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::asset::PlaceholderShape;
use crate::generation::TaskKind;

/// Atelier CLI - AI-generated avatar and garment assets
#[derive(Parser, Debug)]
#[command(name = "atelier")]
#[command(about = "Submit 3D generation jobs and resolve their assets with graceful fallback")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (config/ is read from here)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a generation job
    Generate {
        /// body-from-images, body-from-video, clothing-from-image, clothing-from-video
        kind: TaskKind,
        /// Image or video locator; repeat for several images
        #[arg(long = "media")]
        media: Vec<String>,
        /// JSON file with a full payload ({"media": [...], "options": {...}})
        #[arg(long)]
        payload: Option<PathBuf>,
        /// Extra option as key=value; values that parse as JSON are sent as JSON
        #[arg(long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,
        /// Poll until the task is terminal, printing progress
        #[arg(long)]
        wait: bool,
        /// After a successful wait, resolve the generated asset
        #[arg(long, requires = "wait")]
        resolve: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Query a task once
    Status {
        task_id: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Resolve asset references to a displayable model
    Resolve {
        /// Candidate references in preference order (URLs or paths)
        #[arg(required = true)]
        references: Vec<String>,
        /// Placeholder shown when every reference fails
        #[arg(long, default_value = "generic")]
        shape: PlaceholderShape,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Show recent telemetry events from the journal
    Journal {
        /// Number of most recent events
        #[arg(long, default_value = "50")]
        limit: usize,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Validate configuration and report every problem
    Validate,
}
