//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Map the configured log level to a filter
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` wins over the configured level

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Normalize a configured level. Unknown values fall back to `info`.
pub fn level_from_str(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}

/// Default filter directive for a configured level.
pub fn filter_directive(level: &str) -> String {
    let level = level_from_str(level);
    format!("unit_worker={level},tower_http={level}")
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(&config.log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    let _ = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_mapping() {
        assert_eq!(level_from_str("debug"), "debug");
        assert_eq!(level_from_str("WARNING"), "warn");
        assert_eq!(level_from_str("warn"), "warn");
        assert_eq!(level_from_str("error"), "error");
        assert_eq!(level_from_str("verbose"), "info");
        assert_eq!(level_from_str(""), "info");
    }

    #[test]
    fn directive_covers_crate_and_tower_http() {
        assert_eq!(filter_directive("error"), "unit_worker=error,tower_http=error");
    }
}
