//! Request lifecycle events.
//!
//! Every request that enters the pipeline produces one `start` event before
//! any work and one `end` event after its status is final. The end event is
//! emitted from [`RequestTimer`]'s `Drop`, so it fires on every exit path,
//! including a handler future dropped mid-flight.

use axum::http::StatusCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::observability::metrics;

/// Identity of one inbound call, as seen by observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    pub method: String,
    pub path: String,
    pub request_id: String,
}

/// Receiver of request lifecycle events.
pub trait LifecycleObserver: Send + Sync + 'static {
    fn on_start(&self, info: &RequestInfo);

    fn on_end(&self, info: &RequestInfo, status: StatusCode, elapsed: Duration);
}

/// Emits lifecycle events as log records and request metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl LifecycleObserver for TracingObserver {
    fn on_start(&self, info: &RequestInfo) {
        tracing::info!(
            method = %info.method,
            path = %info.path,
            request_id = %info.request_id,
            "request start"
        );
    }

    fn on_end(&self, info: &RequestInfo, status: StatusCode, elapsed: Duration) {
        tracing::info!(
            method = %info.method,
            path = %info.path,
            request_id = %info.request_id,
            status = status.as_u16(),
            duration_ms = elapsed.as_millis() as u64,
            "request end"
        );
        metrics::record_request(&info.method, &info.path, status.as_u16(), elapsed);
    }
}

/// Scoped "request timing" resource.
///
/// Creating it emits `on_start`; dropping it emits `on_end` with the status
/// recorded by [`finish`](Self::finish). A timer dropped before `finish`
/// reports 500.
pub struct RequestTimer {
    observer: Arc<dyn LifecycleObserver>,
    info: RequestInfo,
    started: Instant,
    status: Option<StatusCode>,
}

impl RequestTimer {
    pub fn start(observer: Arc<dyn LifecycleObserver>, info: RequestInfo) -> Self {
        observer.on_start(&info);
        Self {
            observer,
            info,
            started: Instant::now(),
            status: None,
        }
    }

    /// Record the final status. The last call wins.
    pub fn finish(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    pub fn info(&self) -> &RequestInfo {
        &self.info
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let status = self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.observer
            .on_end(&self.info, status, self.started.elapsed());
    }
}
