//! Shutdown coordination.
//!
//! ```text
//! Running ──request──▶ ShutdownRequested ──▶ Draining ──all done──▶ Stopped
//!                                               │
//!                                               └──grace expired──▶ Stopped (error)
//! ```
//!
//! [`Shutdown`] is the cheap, clonable side: anything may request termination
//! or watch the phase. [`ShutdownCoordinator`] is the single consumer of those
//! requests; it owns the server task and joins it.

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};

use crate::lifecycle::inflight::InFlightTracker;
use crate::lifecycle::signals::TerminationSignal;

/// Phase of the shutdown state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Accepting new connections.
    Running,
    /// A termination request has been accepted.
    ShutdownRequested,
    /// No new connections; in-flight requests are finishing.
    Draining,
    /// The server has stopped (cleanly or not).
    Stopped,
}

/// What asked for the shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(TerminationSignal),
    /// Requested programmatically through [`Shutdown::trigger`].
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(signal) => write!(f, "{signal}"),
            ShutdownReason::Requested => f.write_str("requested"),
        }
    }
}

/// Fatal shutdown outcomes.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("shutdown grace period of {grace:?} exceeded with {in_flight} request(s) in flight")]
    GraceExceeded { grace: Duration, in_flight: u64 },

    #[error("server failed: {0}")]
    Serve(#[source] std::io::Error),

    #[error("server task failed: {0}")]
    Task(#[from] JoinError),

    #[error("server stopped without a shutdown request")]
    UnexpectedStop,
}

/// Handle for requesting and observing shutdown.
#[derive(Debug, Clone)]
pub struct Shutdown {
    requests: mpsc::UnboundedSender<ShutdownReason>,
    phase: watch::Receiver<ShutdownPhase>,
}

impl Shutdown {
    /// Request a shutdown. Returns `false` once the coordinator is gone.
    pub fn request(&self, reason: ShutdownReason) -> bool {
        self.requests.send(reason).is_ok()
    }

    /// Request a shutdown without an OS signal.
    pub fn trigger(&self) {
        let _ = self.request(ShutdownReason::Requested);
    }

    pub fn phase(&self) -> ShutdownPhase {
        *self.phase.borrow()
    }

    /// Subscribe to phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<ShutdownPhase> {
        self.phase.clone()
    }

    /// Resolve once the dispatcher must stop accepting connections.
    pub async fn draining(self) {
        let mut phase = self.phase;
        let _ = phase
            .wait_for(|phase| *phase != ShutdownPhase::Running)
            .await;
    }
}

/// Single consumer of shutdown requests; drives the state machine.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    requests: mpsc::UnboundedReceiver<ShutdownReason>,
    phase: watch::Sender<ShutdownPhase>,
    grace: Duration,
    in_flight: InFlightTracker,
}

impl ShutdownCoordinator {
    /// Create a coordinator with the given drain grace period.
    pub fn new(grace: Duration) -> (Self, Shutdown) {
        let (requests_tx, requests) = mpsc::unbounded_channel();
        let (phase, phase_rx) = watch::channel(ShutdownPhase::Running);
        let coordinator = Self {
            requests,
            phase,
            grace,
            in_flight: InFlightTracker::new(),
        };
        let handle = Shutdown {
            requests: requests_tx,
            phase: phase_rx,
        };
        (coordinator, handle)
    }

    /// Report drain progress from this tracker.
    pub fn with_in_flight(mut self, tracker: InFlightTracker) -> Self {
        self.in_flight = tracker;
        self
    }

    /// Supervise the server task until it stops.
    ///
    /// The first shutdown request moves the machine to `Draining`; any later
    /// request is logged and ignored. If the server has not finished within
    /// the grace period it is aborted and `GraceExceeded` is returned.
    pub async fn supervise(
        mut self,
        mut server: JoinHandle<std::io::Result<()>>,
    ) -> Result<(), ShutdownError> {
        let reason = tokio::select! {
            Some(reason) = self.requests.recv() => reason,
            joined = &mut server => {
                self.phase.send_replace(ShutdownPhase::Stopped);
                tracing::error!("Server stopped while running");
                return match joined? {
                    Ok(()) => Err(ShutdownError::UnexpectedStop),
                    Err(e) => Err(ShutdownError::Serve(e)),
                };
            }
        };

        self.phase.send_replace(ShutdownPhase::ShutdownRequested);
        tracing::info!(reason = %reason, "Shutdown requested");

        self.phase.send_replace(ShutdownPhase::Draining);
        tracing::info!(
            grace_ms = self.grace.as_millis() as u64,
            in_flight = self.in_flight.active_count(),
            "Draining in-flight requests"
        );

        let grace = tokio::time::sleep(self.grace);
        tokio::pin!(grace);

        let joined = loop {
            tokio::select! {
                joined = &mut server => break joined,
                _ = &mut grace => {
                    let in_flight = self.in_flight.active_count();
                    server.abort();
                    self.phase.send_replace(ShutdownPhase::Stopped);
                    tracing::error!(in_flight, "Shutdown grace period exceeded, forcing termination");
                    return Err(ShutdownError::GraceExceeded {
                        grace: self.grace,
                        in_flight,
                    });
                }
                Some(reason) = self.requests.recv() => {
                    tracing::debug!(reason = %reason, "Already draining, ignoring shutdown request");
                }
            }
        };

        self.phase.send_replace(ShutdownPhase::Stopped);
        match joined? {
            Ok(()) => {
                tracing::info!(
                    in_flight = self.in_flight.active_count(),
                    "Server stopped gracefully"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Server shutdown error");
                Err(ShutdownError::Serve(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A stand-in server that stops `linger` after the drain begins.
    fn fake_server(shutdown: Shutdown, linger: Duration) -> JoinHandle<std::io::Result<()>> {
        tokio::spawn(async move {
            shutdown.draining().await;
            tokio::time::sleep(linger).await;
            Ok(())
        })
    }

    #[tokio::test]
    async fn walks_every_phase_on_clean_drain() {
        let (coordinator, shutdown) = ShutdownCoordinator::new(Duration::from_secs(5));
        let mut phases = shutdown.subscribe();
        let server = fake_server(shutdown.clone(), Duration::from_millis(20));
        assert_eq!(shutdown.phase(), ShutdownPhase::Running);

        let supervisor = tokio::spawn(coordinator.supervise(server));
        shutdown.trigger();

        let mut seen = Vec::new();
        while phases.changed().await.is_ok() {
            let phase = *phases.borrow_and_update();
            seen.push(phase);
            if phase == ShutdownPhase::Stopped {
                break;
            }
        }

        assert!(supervisor.await.unwrap().is_ok());
        assert_eq!(seen.last(), Some(&ShutdownPhase::Stopped));
        assert!(seen.contains(&ShutdownPhase::Draining));
    }

    #[tokio::test]
    async fn grace_expiry_is_an_error() {
        let (coordinator, shutdown) = ShutdownCoordinator::new(Duration::from_millis(50));
        let server = fake_server(shutdown.clone(), Duration::from_secs(30));

        shutdown.trigger();
        let err = coordinator.supervise(server).await.unwrap_err();

        assert!(matches!(err, ShutdownError::GraceExceeded { .. }));
        assert_eq!(shutdown.phase(), ShutdownPhase::Stopped);
    }

    #[tokio::test]
    async fn repeated_requests_do_not_restart_drain() {
        let (coordinator, shutdown) = ShutdownCoordinator::new(Duration::from_millis(300));
        let server = fake_server(shutdown.clone(), Duration::from_millis(100));

        for _ in 0..5 {
            shutdown.trigger();
        }
        let supervisor = tokio::spawn(coordinator.supervise(server));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.request(ShutdownReason::Signal(TerminationSignal::Interrupt));

        assert!(supervisor.await.unwrap().is_ok());
        assert_eq!(shutdown.phase(), ShutdownPhase::Stopped);
    }

    #[tokio::test]
    async fn server_failure_before_shutdown_is_reported() {
        let (coordinator, _shutdown) = ShutdownCoordinator::new(Duration::from_secs(1));
        let server = tokio::spawn(async {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "accept loop died"))
        });

        let err = coordinator.supervise(server).await.unwrap_err();
        assert!(matches!(err, ShutdownError::Serve(_)));
    }

    /// Log sink shared between a test subscriber and the assertions.
    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn line_containing(&self, needle: &str) -> Option<String> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .find(|line| line.contains(needle))
                .map(str::to_string)
        }
    }

    #[tokio::test]
    async fn drain_start_and_clean_stop_report_in_flight() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let tracker = InFlightTracker::new();
        let (coordinator, shutdown) = ShutdownCoordinator::new(Duration::from_secs(5));
        let coordinator = coordinator.with_in_flight(tracker.clone());

        let request = tracker.track();
        let server = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                shutdown.draining().await;
                tokio::time::sleep(Duration::from_millis(20)).await;
                drop(request);
                Ok(())
            }
        });

        shutdown.trigger();
        assert!(coordinator.supervise(server).await.is_ok());

        let draining = logs.line_containing("Draining in-flight requests").unwrap();
        assert!(draining.contains(r#""in_flight":1"#), "{draining}");
        let stopped = logs.line_containing("Server stopped gracefully").unwrap();
        assert!(stopped.contains(r#""in_flight":0"#), "{stopped}");
    }

    #[tokio::test]
    async fn request_after_coordinator_gone_reports_false() {
        let (coordinator, shutdown) = ShutdownCoordinator::new(Duration::from_secs(1));
        drop(coordinator);
        assert!(!shutdown.request(ShutdownReason::Requested));
    }
}
