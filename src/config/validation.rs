//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the listen address before anything binds it
//! - Validate value ranges (shutdown grace > 0, body limit > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: WorkerConfig → Result<(), Vec<ValidationError>>
//! - A zero request timeout is legal: every unit of work then times out

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::WorkerConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listen address (HTTP_ADDR) must be non-empty")]
    EmptyBindAddress,

    #[error("listen address {0:?} must have the form host:port")]
    InvalidBindAddress(String),

    #[error("shutdown timeout must be greater than zero")]
    ZeroShutdownTimeout,

    #[error("max_body_bytes must be greater than zero")]
    ZeroBodyLimit,

    #[error("metrics address {0:?} is not a valid socket address")]
    InvalidMetricsAddress(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &WorkerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let bind = config.listener.bind_address.trim();
    if bind.is_empty() {
        errors.push(ValidationError::EmptyBindAddress);
    } else if config.listener.port().is_none() {
        errors.push(ValidationError::InvalidBindAddress(bind.to_string()));
    }

    if config.timeouts.shutdown.is_zero() {
        errors.push(ValidationError::ZeroShutdownTimeout);
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidMetricsAddress(addr.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
