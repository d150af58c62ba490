//! Unit-of-work executor.
//!
//! # Responsibilities
//! - Define the `Processor` capability the dispatcher depends on
//! - Provide the production processor (`ProcessService`)
//! - Count completed executions
//!
//! # Design Decisions
//! - No networking knowledge: input in, result or error out
//! - Checks cancellation once at entry; the work itself never suspends
//! - The counter lives inside the service, not in a global

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::observability::metrics;
use crate::pipeline::scope::{CancelCause, Scope};

/// Payload used when a request carries none.
pub const DEFAULT_PAYLOAD: &str = "hello";

/// Prefix applied by the transform behaviour.
pub const TRANSFORM_PREFIX: &str = "processed:";

/// Input for one unit of work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProcessInput {
    pub payload: String,
    /// Return the payload untouched instead of transforming it.
    pub echo: bool,
}

impl ProcessInput {
    pub fn new(payload: impl Into<String>, echo: bool) -> Self {
        Self {
            payload: payload.into(),
            echo,
        }
    }

    /// Replace an empty payload with [`DEFAULT_PAYLOAD`].
    pub fn with_defaults(mut self) -> Self {
        if self.payload.is_empty() {
            self.payload = DEFAULT_PAYLOAD.to_string();
        }
        self
    }
}

/// Result of one successful unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResult {
    pub result: String,
    /// Completion time, seconds since the Unix epoch.
    pub processed_at_unix: i64,
}

/// Failure of a unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("execution cancelled: {0}")]
    Cancelled(CancelCause),

    #[error("processing failed: {0}")]
    Failed(String),
}

/// Anything that can execute a unit of work under a cancellation scope.
///
/// The HTTP layer depends only on this trait, so tests can swap in doubles.
pub trait Processor: Send + Sync + 'static {
    fn process(
        &self,
        scope: &Scope,
        input: ProcessInput,
    ) -> impl Future<Output = Result<ProcessResult, ProcessError>> + Send;
}

/// Process-wide count of completed executions. Increment-only.
#[derive(Debug, Default)]
pub struct ExecutionCounter(AtomicU64);

impl ExecutionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically add one and return the new total.
    pub fn increment(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Current total. Eventually consistent with in-flight responses.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Production processor: echo the payload or prefix it with `processed:`.
#[derive(Debug, Default)]
pub struct ProcessService {
    executions: ExecutionCounter,
}

impl ProcessService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of executions performed so far.
    pub fn executions(&self) -> u64 {
        self.executions.get()
    }

    /// Run the work synchronously.
    pub fn execute(&self, scope: &Scope, input: ProcessInput) -> Result<ProcessResult, ProcessError> {
        if let Some(cause) = scope.cause() {
            return Err(ProcessError::Cancelled(cause));
        }

        let result = if input.echo {
            input.payload
        } else {
            format!("{TRANSFORM_PREFIX}{}", input.payload)
        };
        let processed_at_unix = unix_now();

        let total = self.executions.increment();
        metrics::record_execution();
        tracing::trace!(executions = total, "Unit of work completed");

        Ok(ProcessResult {
            result,
            processed_at_unix,
        })
    }
}

impl Processor for ProcessService {
    fn process(
        &self,
        scope: &Scope,
        input: ProcessInput,
    ) -> impl Future<Output = Result<ProcessResult, ProcessError>> + Send {
        std::future::ready(self.execute(scope, input))
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::scope::ScopeHandle;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn transform_prefixes_payload() {
        let service = ProcessService::new();
        let out = service
            .execute(&Scope::background(), ProcessInput::new("abc", false))
            .unwrap();
        assert_eq!(out.result, "processed:abc");
        assert!(out.processed_at_unix > 0);
    }

    #[test]
    fn echo_returns_payload_verbatim() {
        let service = ProcessService::new();
        for payload in ["abc", "processed:x", " spaced ", "ünïcødé"] {
            let out = service
                .execute(&Scope::background(), ProcessInput::new(payload, true))
                .unwrap();
            assert_eq!(out.result, payload);
        }
    }

    #[test]
    fn empty_payload_gets_default() {
        let input = ProcessInput::default().with_defaults();
        assert_eq!(input.payload, DEFAULT_PAYLOAD);
        assert!(!input.echo);

        let kept = ProcessInput::new("x", true).with_defaults();
        assert_eq!(kept.payload, "x");
    }

    #[test]
    fn cancelled_scope_does_no_work() {
        let service = ProcessService::new();
        let handle = ScopeHandle::root(None);
        handle.cancel();

        let err = service
            .execute(&handle, ProcessInput::new("abc", false))
            .unwrap_err();
        assert_eq!(err, ProcessError::Cancelled(CancelCause::Cancelled));
        assert_eq!(service.executions(), 0);
    }

    #[test]
    fn expired_deadline_does_no_work() {
        let service = ProcessService::new();
        let bound = ScopeHandle::bind(&Scope::background(), Duration::ZERO);
        let err = service
            .execute(&bound, ProcessInput::new("abc", false))
            .unwrap_err();
        assert_eq!(err, ProcessError::Cancelled(CancelCause::DeadlineExceeded));
        assert_eq!(service.executions(), 0);
    }

    #[test]
    fn repeated_input_gives_same_result_with_fresh_timestamp() {
        let service = ProcessService::new();
        let first = service
            .execute(&Scope::background(), ProcessInput::new("abc", false))
            .unwrap();
        let second = service
            .execute(&Scope::background(), ProcessInput::new("abc", false))
            .unwrap();
        assert_eq!(first.result, second.result);
        assert!(second.processed_at_unix >= first.processed_at_unix);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn counter_has_no_lost_updates() {
        let service = Arc::new(ProcessService::new());
        let tasks = 32;
        let per_task = 250;

        let handles: Vec<_> = (0..tasks)
            .map(|i| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    let scope = Scope::background();
                    for _ in 0..per_task {
                        service
                            .process(&scope, ProcessInput::new(format!("t{i}"), false))
                            .await
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(service.executions(), tasks * per_task);
    }

    #[test]
    fn increment_returns_new_total() {
        let counter = ExecutionCounter::new();
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.get(), 2);
    }
}
