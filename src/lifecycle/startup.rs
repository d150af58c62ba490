//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Start the metrics exporter when configured
//! - Bind the listener and hand it to the HTTP server
//! - Wire signals, server task and shutdown coordinator together
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last (traffic only when ready)

use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{validate_config, ConfigError, ListenerConfig, ObservabilityConfig, WorkerConfig};
use crate::http::HttpServer;
use crate::lifecycle::shutdown::{ShutdownCoordinator, ShutdownError};
use crate::lifecycle::signals::spawn_signal_listener;
use crate::observability::metrics;

/// Errors that stop the worker before it serves traffic.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(String),
}

/// Any error that ends the process with a non-zero exit code.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error(transparent)]
    Startup(#[from] StartupError),

    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// Bind the configured listen address, resolving hostnames.
pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, StartupError> {
    let addr = config.listen_address();
    TcpListener::bind(addr.as_str())
        .await
        .map_err(|source| StartupError::Bind {
            addr: config.bind_address.clone(),
            source,
        })
}

/// Start the Prometheus exporter if an address is configured.
pub fn start_metrics(config: &ObservabilityConfig) -> Result<(), StartupError> {
    let Some(raw) = &config.metrics_address else {
        tracing::debug!("Metrics exporter disabled");
        return Ok(());
    };
    let addr: SocketAddr = raw
        .parse()
        .map_err(|e| StartupError::Metrics(format!("{raw:?}: {e}")))?;
    metrics::init_metrics(addr).map_err(|e| StartupError::Metrics(e.to_string()))
}

/// Run the worker until it has shut down.
pub async fn launch(config: WorkerConfig) -> Result<(), FatalError> {
    validate_config(&config).map_err(|errors| StartupError::from(ConfigError::Validation(errors)))?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_ms = config.timeouts.request.as_millis() as u64,
        shutdown_timeout_ms = config.timeouts.shutdown.as_millis() as u64,
        "Configuration loaded"
    );

    start_metrics(&config.observability)?;
    let listener = bind(&config.listener).await?;
    let server = HttpServer::new(&config);

    serve(&config, listener, server).await
}

/// Serve on an already-bound listener until a termination signal has been
/// handled by the shutdown coordinator.
pub async fn serve(
    config: &WorkerConfig,
    listener: TcpListener,
    server: HttpServer,
) -> Result<(), FatalError> {
    let (coordinator, shutdown) = ShutdownCoordinator::new(config.timeouts.shutdown);
    let coordinator = coordinator.with_in_flight(server.in_flight());

    let signals = spawn_signal_listener(shutdown.clone()).map_err(StartupError::Signals)?;
    let server_task = tokio::spawn(server.run(listener, shutdown));

    let result = coordinator.supervise(server_task).await;
    signals.abort();
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_reports_address_on_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ListenerConfig {
            bind_address: taken.local_addr().unwrap().to_string(),
        };

        let err = bind(&config).await.unwrap_err();
        assert!(matches!(err, StartupError::Bind { .. }));
        assert!(err.to_string().contains(&config.bind_address));
    }

    #[tokio::test]
    async fn bind_resolves_hostnames() {
        let config = ListenerConfig {
            bind_address: "localhost:0".into(),
        };

        let listener = bind(&config).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }

    #[tokio::test]
    async fn launch_rejects_invalid_config() {
        let mut config = WorkerConfig::default();
        config.listener.bind_address = String::new();

        let err = launch(config).await.unwrap_err();
        assert!(matches!(
            err,
            FatalError::Startup(StartupError::Config(ConfigError::Validation(_)))
        ));
    }

    #[test]
    fn metrics_disabled_by_default() {
        assert!(start_metrics(&ObservabilityConfig::default()).is_ok());
    }
}
