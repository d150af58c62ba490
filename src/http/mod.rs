//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, method + path dispatch)
//!     → request.rs (correlation id, ambient scope)
//!     → [pipeline: bind deadline → execute → classify]
//!     → response.rs (JSON bodies)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestContext, DEFAULT_REQUEST_ID, X_REQUEST_ID};
pub use response::{ErrorBody, HealthBody};
pub use server::{build_router, AppState, HttpServer};
