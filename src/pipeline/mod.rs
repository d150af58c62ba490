//! Request execution pipeline.
//!
//! # Data Flow
//! ```text
//! ambient scope (request middleware)
//!     → scope.rs (deadline binder: min(ambient, now + request timeout))
//!     → executor.rs (Processor::process under the bound scope)
//!     → outcome.rs (Success | BadInput | Timeout | InternalError)
//! ```
//!
//! # Design Decisions
//! - The pipeline knows nothing about sockets; the HTTP layer drives it
//! - Bound scopes are released on every exit path by dropping their handle
//! - Exactly one outcome per request

pub mod executor;
pub mod outcome;
pub mod scope;

pub use executor::{
    ExecutionCounter, ProcessError, ProcessInput, ProcessResult, ProcessService, Processor,
};
pub use outcome::Outcome;
pub use scope::{CancelCause, Scope, ScopeHandle};
