//! Unit-of-work HTTP worker.
//!
//! A small service exposing a liveness probe and one unit-of-work endpoint.
//! Each `/process` request is bound to a deadline, executed under a
//! cancellable scope, observed via start/end lifecycle events and classified
//! into exactly one outcome. A shutdown coordinator stops accepting new work
//! on SIGTERM/SIGINT and drains in-flight requests within a grace period.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;

pub use config::WorkerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::{ProcessService, Processor};
