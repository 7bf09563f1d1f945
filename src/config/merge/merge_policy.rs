//! Merge rules: defaults, override order, conflict handling.
//!
//! Later sources win key by key: defaults, then the global file, then the
//! workspace files, then `ATELIER__*` environment variables.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

pub const ENV_PREFIX: &str = "ATELIER";
pub const ENV_SEPARATOR: &str = "__";

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("service.base_url", "http://127.0.0.1:8600")?
        .set_default("orchestrator.poll_interval_ms", 3_000)?
        .set_default("orchestrator.supersede_same_kind", true)
}

/// Environment source, e.g. `ATELIER__RETRY__POLL__MAX_ATTEMPTS=5`.
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}
