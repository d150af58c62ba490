//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request pipeline produces:
//!     → events.rs (start/end lifecycle events per request)
//!     → logging.rs (structured log records)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON by default)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows into every lifecycle record
//! - Metrics are cheap (atomic operations) and off unless configured

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{LifecycleObserver, RequestInfo, RequestTimer, TracingObserver};
