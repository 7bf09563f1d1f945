//! Layered configuration from workspace files and the environment.

use std::path::Path;
use std::sync::Mutex;

use tempfile::TempDir;

use atelier::config::{ConfigLoader, ENV_NAME_VAR};
use atelier::error::ApiError;

// Tests here mutate process-wide environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

struct EnvVarGuard {
    key: &'static str,
    original: Option<String>,
}

impl EnvVarGuard {
    fn set(key: &'static str, value: impl AsRef<std::ffi::OsStr>) -> Self {
        let original = std::env::var(key).ok();
        std::env::set_var(key, value);
        Self { key, original }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        match &self.original {
            Some(value) => std::env::set_var(self.key, value),
            None => std::env::remove_var(self.key),
        }
    }
}

fn write_workspace_file(root: &Path, name: &str, contents: &str) {
    let dir = root.join("config");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), contents).unwrap();
}

#[test]
fn test_environment_specific_file_overrides_base_file() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().unwrap();
    let _home = EnvVarGuard::set("HOME", temp_dir.path());
    let _env = EnvVarGuard::set(ENV_NAME_VAR, "staging");

    write_workspace_file(
        temp_dir.path(),
        "config.toml",
        "[orchestrator]\npoll_interval_ms = 5000\n\n[loader]\nfetch_timeout_ms = 10000\n",
    );
    write_workspace_file(
        temp_dir.path(),
        "staging.toml",
        "[orchestrator]\npoll_interval_ms = 1500\nmax_unreachable_ms = 120000\n",
    );
    write_workspace_file(
        temp_dir.path(),
        "production.toml",
        "[orchestrator]\npoll_interval_ms = 9000\n",
    );

    let config = ConfigLoader::load(temp_dir.path()).unwrap();
    assert_eq!(config.orchestrator.poll_interval_ms, 1500);
    assert_eq!(config.orchestrator.max_unreachable_ms, Some(120_000));
    assert_eq!(config.loader.fetch_timeout_ms, 10_000);
    assert!(config.orchestrator.supersede_same_kind);
}

#[test]
fn test_api_key_comes_from_the_environment() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().unwrap();
    let _home = EnvVarGuard::set("HOME", temp_dir.path());
    let _key = EnvVarGuard::set("ATELIER__SERVICE__API_KEY", "sk-test");

    let config = ConfigLoader::load(temp_dir.path()).unwrap();
    assert_eq!(config.service.api_key.as_deref(), Some("sk-test"));
    assert!(!config.to_toml().unwrap().contains("sk-test"));
}

#[test]
fn test_validation_reports_every_bad_section() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().unwrap();
    let _home = EnvVarGuard::set("HOME", temp_dir.path());
    write_workspace_file(
        temp_dir.path(),
        "config.toml",
        "[retry.poll]\nmax_attempts = 0\n\n[loader]\nmax_payload_bytes = 0\n",
    );

    let err = ConfigLoader::load_validated(temp_dir.path(), None).unwrap_err();
    match err {
        ApiError::ConfigError(message) => {
            assert!(message.contains("retry.poll"));
            assert!(message.contains("loader"));
        }
        other => panic!("expected a configuration error, got {:?}", other),
    }
}
