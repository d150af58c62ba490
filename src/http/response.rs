//! Response bodies.
//!
//! # Design Decisions
//! - Every response is JSON
//! - Error bodies carry a single `error` field and never internal details

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::pipeline::Outcome;

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthBody {
    pub status: String,
}

impl HealthBody {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Body of every failed `/process` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Outcome::Success(result) => (status, Json(result)).into_response(),
            failure => {
                let error = failure.error_code().unwrap_or("internal").to_string();
                (status, Json(ErrorBody { error })).into_response()
            }
        }
    }
}
