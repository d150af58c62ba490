//! Outcome classification.
//!
//! Maps what the executor returned, plus the bound scope's state, to exactly
//! one outcome. Cancellation state is consulted only when the executor failed,
//! so work that completed before the deadline is never invalidated afterwards.

use axum::http::StatusCode;

use crate::pipeline::executor::{ProcessError, ProcessResult};
use crate::pipeline::scope::Scope;

/// Final classification of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(ProcessResult),
    /// The request body could not be read or decoded.
    BadInput,
    /// The bound scope was cancelled or its deadline passed.
    Timeout,
    /// The executor failed for a reason unrelated to cancellation.
    InternalError,
}

impl Outcome {
    /// Classify an executor result against the scope it ran under.
    pub fn classify(result: Result<ProcessResult, ProcessError>, scope: &Scope) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(_) if scope.is_cancelled() => Outcome::Timeout,
            Err(ProcessError::Cancelled(_)) => Outcome::Timeout,
            Err(ProcessError::Failed(_)) => Outcome::InternalError,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Outcome::Success(_) => StatusCode::OK,
            Outcome::BadInput => StatusCode::BAD_REQUEST,
            Outcome::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Outcome::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Value of the `error` field for failures; `None` on success.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Outcome::Success(_) => None,
            Outcome::BadInput => Some("invalid json"),
            Outcome::Timeout => Some("timeout"),
            Outcome::InternalError => Some("internal"),
        }
    }
}
