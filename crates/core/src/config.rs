//! Config loading: a TOML file layered under environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::item::Limits;

pub const ENV_DB: &str = "TASKBOARD_DB";
pub const ENV_LOG: &str = "TASKBOARD_LOG";
pub const ENV_RETRY_ATTEMPTS: &str = "TASKBOARD_RETRY_ATTEMPTS";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub limits: Limits,
    pub logging: LoggingConfig,
    pub view: ViewConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file. `None` keeps the board in memory.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string, e.g. `"info,taskboard_engine=debug"`.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// How the view encodes a drop destination in the move request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetEncoding {
    /// Send the index computed from the local working copy.
    #[default]
    Index,
    /// Send the sibling id and let the engine resolve it against the
    /// authoritative order.
    Sibling,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Reconciliation attempts after a retryable failure.
    pub retry_attempts: u32,
    pub target_encoding: TargetEncoding,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            target_encoding: TargetEncoding::default(),
        }
    }
}

pub fn parse(contents: &str) -> Result<Config, CoreError> {
    toml::from_str(contents).map_err(|e| CoreError::Config(e.to_string()))
}

pub fn load(path: &Path) -> Result<Config, CoreError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| CoreError::Config(format!("failed to read {}: {e}", path.display())))?;
    let mut config = parse(&contents)
        .map_err(|e| CoreError::Config(format!("failed to parse {}: {e}", path.display())))?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Like [`load`], but a missing or broken file falls back to defaults.
pub fn load_or_default(path: Option<&Path>) -> Config {
    let loaded = match path {
        Some(path) if path.exists() => load(path),
        _ => {
            let mut config = Config::default();
            apply_env_overrides(&mut config);
            Ok(config)
        }
    };
    loaded.unwrap_or_else(|e| {
        tracing::warn!("config load failed, using defaults: {e}");
        let mut config = Config::default();
        apply_env_overrides(&mut config);
        config
    })
}

pub fn write_config(path: &Path, config: &Config) -> Result<(), CoreError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .map_err(|e| CoreError::Config(format!("failed to create {}: {e}", dir.display())))?;
    }
    let contents = toml::to_string_pretty(config)
        .map_err(|e| CoreError::Config(format!("failed to render config: {e}")))?;
    fs::write(path, contents)
        .map_err(|e| CoreError::Config(format!("failed to write {}: {e}", path.display())))
}

pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides(config, |key| std::env::var(key).ok());
}

/// Applies overrides from `lookup`; blank or unparsable values are ignored.
pub fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(raw) = lookup(ENV_DB) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            config.storage.path = Some(PathBuf::from(trimmed));
        }
    }

    if let Some(raw) = lookup(ENV_LOG) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            config.logging.filter = trimmed.to_string();
        }
    }

    if let Some(raw) = lookup(ENV_RETRY_ATTEMPTS) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            match trimmed.parse::<u32>() {
                Ok(value) => config.view.retry_attempts = value,
                Err(err) => {
                    tracing::warn!("invalid {ENV_RETRY_ATTEMPTS}, ignoring: {err}");
                }
            }
        }
    }
}
