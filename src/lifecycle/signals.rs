//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGTERM and SIGINT
//! - Forward every termination signal to the shutdown coordinator
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - The listener is a plain forwarder; deduplication is the coordinator's job
//! - Handlers are installed before the listener binds, so a failure is fatal

use std::fmt;
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::{Shutdown, ShutdownReason};

/// Termination signals the worker reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// SIGTERM.
    Terminate,
    /// SIGINT / Ctrl+C.
    Interrupt,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationSignal::Terminate => f.write_str("SIGTERM"),
            TerminationSignal::Interrupt => f.write_str("SIGINT"),
        }
    }
}

/// Install signal handlers and spawn the task forwarding them to `shutdown`.
///
/// The task ends once the coordinator stops accepting requests.
#[cfg(unix)]
pub fn spawn_signal_listener(shutdown: Shutdown) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    Ok(tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = terminate.recv() => TerminationSignal::Terminate,
                Some(()) = interrupt.recv() => TerminationSignal::Interrupt,
                else => break,
            };
            tracing::info!(signal = %received, "shutdown signal received");
            if !shutdown.request(ShutdownReason::Signal(received)) {
                break;
            }
        }
    }))
}

/// Install signal handlers and spawn the task forwarding them to `shutdown`.
#[cfg(not(unix))]
pub fn spawn_signal_listener(shutdown: Shutdown) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!(signal = %TerminationSignal::Interrupt, "shutdown signal received");
            if !shutdown.request(ShutdownReason::Signal(TerminationSignal::Interrupt)) {
                break;
            }
        }
    }))
}
