//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - `GET /health`: liveness, outside the pipeline
//! - `GET|POST /process`: decode, bind deadline, execute, classify
//! - Serve until the shutdown coordinator starts draining

use axum::{
    body::Body,
    extract::State,
    http::{header, Method, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::WorkerConfig;
use crate::http::request::{ambient_scope, RequestContext};
use crate::http::response::HealthBody;
use crate::lifecycle::{InFlightTracker, Shutdown};
use crate::observability::{LifecycleObserver, RequestTimer, TracingObserver};
use crate::pipeline::{
    Outcome, ProcessError, ProcessInput, ProcessService, Processor, ScopeHandle,
};

/// Application state injected into handlers.
pub struct AppState<P> {
    pub processor: Arc<P>,
    pub observer: Arc<dyn LifecycleObserver>,
    pub in_flight: InFlightTracker,
    /// Deadline bound to every unit of work.
    pub request_timeout: Duration,
    pub read_timeout: Duration,
    pub max_body_bytes: usize,
}

impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            processor: Arc::clone(&self.processor),
            observer: Arc::clone(&self.observer),
            in_flight: self.in_flight.clone(),
            request_timeout: self.request_timeout,
            read_timeout: self.read_timeout,
            max_body_bytes: self.max_body_bytes,
        }
    }
}

impl<P: Processor> AppState<P> {
    pub fn new(config: &WorkerConfig, processor: Arc<P>, observer: Arc<dyn LifecycleObserver>) -> Self {
        Self {
            processor,
            observer,
            in_flight: InFlightTracker::new(),
            request_timeout: config.timeouts.request,
            read_timeout: config.timeouts.read,
            max_body_bytes: config.limits.max_body_bytes,
        }
    }
}

/// Build the Axum router with all middleware layers.
///
/// Only `/process` gets the ambient scope; `/health` bypasses the pipeline.
/// Axum answers HEAD with the GET handler, so HEAD is rejected explicitly.
pub fn build_router<P: Processor>(state: AppState<P>, write_timeout: Duration) -> Router {
    let process = Router::new()
        .route(
            "/process",
            only_allowed(
                get(process_handler::<P>).post(process_handler::<P>),
                "GET, POST",
            ),
        )
        .route_layer(middleware::from_fn_with_state(write_timeout, ambient_scope));

    Router::new()
        .route("/health", only_allowed(get(health_handler), "GET"))
        .merge(process)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// HTTP server for the worker.
pub struct HttpServer {
    router: Router,
    in_flight: InFlightTracker,
}

impl HttpServer {
    /// Create a server running the production processor.
    pub fn new(config: &WorkerConfig) -> Self {
        Self::with_processor(
            config,
            Arc::new(ProcessService::new()),
            Arc::new(TracingObserver),
        )
    }

    /// Create a server around any processor and observer.
    pub fn with_processor<P: Processor>(
        config: &WorkerConfig,
        processor: Arc<P>,
        observer: Arc<dyn LifecycleObserver>,
    ) -> Self {
        let state = AppState::new(config, processor, observer);
        let in_flight = state.in_flight.clone();
        Self {
            router: build_router(state, config.timeouts.write),
            in_flight,
        }
    }

    /// Tracker of requests currently inside the pipeline.
    pub fn in_flight(&self) -> InFlightTracker {
        self.in_flight.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` leaves `Running`, then wait for open connections to finish.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.draining().await;
                tracing::info!("No longer accepting connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Answer HEAD and every unrouted method with 405 and the given `Allow` list.
fn only_allowed<S>(methods: MethodRouter<S>, allow: &'static str) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    let reject = move || async move {
        (StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, allow)]).into_response()
    };
    methods.head(reject).fallback(reject)
}

/// Liveness probe. No business logic, no lifecycle events.
async fn health_handler() -> Json<HealthBody> {
    Json(HealthBody::ok())
}

/// Pipeline entry point for `GET|POST /process`.
async fn process_handler<P: Processor>(
    State(state): State<AppState<P>>,
    request: Request<Body>,
) -> Response {
    let (parts, body) = request.into_parts();
    let ctx = RequestContext::from_parts(&parts);

    let _in_flight = state.in_flight.track();
    let mut timer = RequestTimer::start(Arc::clone(&state.observer), ctx.info.clone());

    let outcome = execute(&state, &ctx, &parts.method, body).await;
    timer.finish(outcome.status());
    outcome.into_response()
}

/// Decode, bind the deadline, run the unit of work and classify the result.
async fn execute<P: Processor>(
    state: &AppState<P>,
    ctx: &RequestContext,
    method: &Method,
    body: Body,
) -> Outcome {
    let request_id = &ctx.info.request_id;

    let input = match read_input(method, body, state.read_timeout, state.max_body_bytes).await {
        Ok(input) => input,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "decode request body");
            return Outcome::BadInput;
        }
    };

    let bound = ScopeHandle::bind(&ctx.scope, state.request_timeout);
    let result = tokio::select! {
        biased;
        result = state.processor.process(bound.scope(), input) => result,
        cause = bound.cancelled() => Err(ProcessError::Cancelled(cause)),
    };

    let failure = result.as_ref().err().map(ToString::to_string);
    let outcome = Outcome::classify(result, bound.scope());
    if let Some(e) = failure {
        match outcome {
            Outcome::Timeout => tracing::error!(
                request_id = %request_id,
                error = %e,
                cause = ?bound.cause(),
                "request cancelled or timeout"
            ),
            _ => tracing::error!(request_id = %request_id, error = %e, "process failed"),
        }
    }
    outcome
}

/// Why a request body could not become a [`ProcessInput`].
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read body: {0}")]
    Read(#[from] axum::Error),

    #[error("timed out reading body after {0:?}")]
    ReadTimeout(Duration),

    #[error("invalid json: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Turn the request into pipeline input. `GET` carries no body.
///
/// Only the first JSON value is decoded; trailing data is ignored. An empty
/// body or a literal `null` yields the default input.
async fn read_input(
    method: &Method,
    body: Body,
    read_timeout: Duration,
    max_body_bytes: usize,
) -> Result<ProcessInput, InputError> {
    if *method != Method::POST {
        return Ok(ProcessInput::default().with_defaults());
    }

    let bytes = tokio::time::timeout(read_timeout, axum::body::to_bytes(body, max_body_bytes))
        .await
        .map_err(|_| InputError::ReadTimeout(read_timeout))??;

    let input = serde_json::Deserializer::from_slice(&bytes)
        .into_iter::<Option<ProcessInput>>()
        .next()
        .transpose()?
        .flatten()
        .unwrap_or_default();
    Ok(input.with_defaults())
}
