//! Request context and the ambient scope middleware.
//!
//! # Responsibilities
//! - Extract the correlation id (`X-Request-ID`, default `none`)
//! - Give every pipeline request an ambient cancellation scope
//! - Assemble the per-request context owned by the handling flow
//!
//! # Design Decisions
//! - The ambient scope expires after the write timeout and is cancelled when
//!   the request future is dropped (client gone)
//! - A scope already present in the request extensions is respected, so an
//!   outer layer can tighten the ambient deadline

use axum::{
    body::Body,
    extract::State,
    http::{request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::time::Duration;

use crate::observability::RequestInfo;
use crate::pipeline::{Scope, ScopeHandle};

/// Correlation header.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Correlation id used when the caller supplies none.
pub const DEFAULT_REQUEST_ID: &str = "none";

/// Read the correlation id from request headers.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_REQUEST_ID)
        .to_string()
}

/// Everything the pipeline knows about one inbound call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub info: RequestInfo,
    /// Ambient scope; the deadline binder derives from it.
    pub scope: Scope,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            info: RequestInfo {
                method: parts.method.to_string(),
                path: parts.uri.path().to_string(),
                request_id: request_id(&parts.headers),
            },
            scope: parts
                .extensions
                .get::<Scope>()
                .cloned()
                .unwrap_or_default(),
        }
    }
}

/// Middleware installing the ambient scope for the rest of the request.
///
/// The handle lives on this future's stack: when the response is produced, or
/// when the connection drops the future, the scope is released.
pub async fn ambient_scope(
    State(write_timeout): State<Duration>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let ambient = match request.extensions().get::<Scope>() {
        Some(outer) => ScopeHandle::bind(outer, write_timeout),
        None => ScopeHandle::root(Some(write_timeout)),
    };
    request.extensions_mut().insert(ambient.scope().clone());

    next.run(request).await
}
