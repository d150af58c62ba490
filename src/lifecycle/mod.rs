//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Metrics → Bind → Serve
//!
//! Shutdown (shutdown.rs):
//!     Request received → Stop accepting → Drain in-flight → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown request
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then observability, then listener
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: forced exit after deadline

pub mod inflight;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use inflight::{InFlightGuard, InFlightTracker};
pub use shutdown::{Shutdown, ShutdownCoordinator, ShutdownError, ShutdownPhase, ShutdownReason};
pub use signals::TerminationSignal;
pub use startup::{launch, FatalError, StartupError};
