//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::duration::parse_duration;
use crate::config::schema::WorkerConfig;
use crate::config::validation::ValidationError;

/// Environment variable naming an optional TOML config file.
pub const CONFIG_PATH_ENV: &str = "UNIT_WORKER_CONFIG";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A configuration plus the non-fatal problems found while assembling it.
///
/// Loading happens before logging is initialized, so warnings are handed back
/// to the caller instead of being logged here.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub config: WorkerConfig,
    pub warnings: Vec<String>,
}

/// Load configuration: defaults, then the optional TOML file, then the process
/// environment.
///
/// The result is not validated; callers run [`validate_config`] once logging
/// is available so failures can be reported.
///
/// [`validate_config`]: crate::config::validate_config
pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let from_env = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
    let path = path.map(Path::to_path_buf).or(from_env);

    let config = match path {
        Some(path) => load_file(&path)?,
        None => WorkerConfig::default(),
    };

    Ok(apply_env(config, |key| std::env::var(key).ok()))
}

/// Parse a TOML config file.
pub fn load_file(path: &Path) -> Result<WorkerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Overlay environment variables on top of `config`.
///
/// Empty variables count as unset. Values that fail to parse keep the current
/// setting and produce a warning.
pub fn apply_env<F>(mut config: WorkerConfig, lookup: F) -> LoadedConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut warnings = Vec::new();
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(addr) = var("HTTP_ADDR") {
        config.listener.bind_address = addr;
    }

    let durations = [
        ("HTTP_READ_TIMEOUT", &mut config.timeouts.read),
        ("HTTP_WRITE_TIMEOUT", &mut config.timeouts.write),
        ("SHUTDOWN_TIMEOUT", &mut config.timeouts.shutdown),
        ("REQUEST_TIMEOUT", &mut config.timeouts.request),
    ];
    for (key, slot) in durations {
        if let Some(raw) = var(key) {
            match parse_duration(&raw) {
                Ok(d) => *slot = d,
                Err(e) => warnings.push(format!("{key}: {e}; keeping {slot:?}")),
            }
        }
    }

    if let Some(raw) = var("MAX_BODY_BYTES") {
        match raw.trim().parse() {
            Ok(n) => config.limits.max_body_bytes = n,
            Err(e) => warnings.push(format!(
                "MAX_BODY_BYTES: {e}; keeping {}",
                config.limits.max_body_bytes
            )),
        }
    }

    if let Some(level) = var("LOG_LEVEL") {
        config.observability.log_level = level;
    }

    if let Some(raw) = var("LOG_FORMAT") {
        match raw.parse() {
            Ok(format) => config.observability.log_format = format,
            Err(e) => warnings.push(format!(
                "LOG_FORMAT: {e}; keeping {}",
                config.observability.log_format
            )),
        }
    }

    if let Some(addr) = var("METRICS_ADDR") {
        config.observability.metrics_address = Some(addr);
    }

    LoadedConfig { config, warnings }
}
