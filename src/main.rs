//! Unit-of-work worker (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────────┐
//!                    │                        WORKER                            │
//!                    │                                                          │
//!  Client Request    │  ┌──────────┐   ┌────────────┐   ┌─────────────────────┐ │
//!  ──────────────────┼─▶│ dispatch │──▶│ lifecycle  │──▶│ deadline binder     │ │
//!                    │  │ (router) │   │ start evt  │   │ min(ambient, now+T) │ │
//!                    │  └──────────┘   └────────────┘   └─────────┬───────────┘ │
//!                    │                                            ▼             │
//!  Client Response   │  ┌──────────┐   ┌────────────┐   ┌─────────────────────┐ │
//!  ◀─────────────────┼──│ response │◀──│ classifier │◀──│ executor            │ │
//!                    │  │ + end evt│   │            │   │ (Processor)         │ │
//!                    │  └──────────┘   └────────────┘   └─────────────────────┘ │
//!                    │                                                          │
//!                    │  signals ──▶ shutdown coordinator ──▶ drain + stop       │
//!                    └──────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use unit_worker::config::{load_config, validate_config, ObservabilityConfig};
use unit_worker::lifecycle::launch;
use unit_worker::observability::logging;

#[derive(Parser)]
#[command(name = "unit-worker")]
#[command(about = "HTTP worker with a liveness probe and one unit-of-work endpoint", long_about = None)]
struct Cli {
    /// TOML configuration file; falls back to $UNIT_WORKER_CONFIG.
    /// Environment variables override values from the file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Real environment variables take precedence over .env entries.
    let _ = dotenvy::dotenv();

    let loaded = match load_config(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            logging::init(&ObservabilityConfig::default());
            tracing::error!(error = %e, "invalid config");
            return ExitCode::FAILURE;
        }
    };
    let config = loaded.config;

    logging::init(&config.observability);
    for warning in &loaded.warnings {
        tracing::warn!(%warning, "Ignoring malformed setting");
    }

    if let Err(errors) = validate_config(&config) {
        for e in &errors {
            tracing::error!(error = %e, "invalid config");
        }
        return ExitCode::FAILURE;
    }

    if cli.check {
        tracing::info!("Configuration is valid");
        return ExitCode::SUCCESS;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "unit-worker starting");

    match launch(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "fatal error");
            ExitCode::FAILURE
        }
    }
}
