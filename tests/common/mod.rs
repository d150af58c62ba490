//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use unit_worker::config::WorkerConfig;
use unit_worker::http::HttpServer;
use unit_worker::lifecycle::{Shutdown, ShutdownCoordinator, ShutdownError};
use unit_worker::observability::TracingObserver;
use unit_worker::pipeline::{
    ProcessError, ProcessInput, ProcessResult, ProcessService, Processor, Scope,
};

/// A worker running on an ephemeral local port.
pub struct TestWorker {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub supervisor: JoinHandle<Result<(), ShutdownError>>,
}

impl TestWorker {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a worker around `processor`, supervised by a shutdown coordinator
/// that tests drive through `TestWorker::shutdown`.
pub async fn spawn_worker<P: Processor>(config: WorkerConfig, processor: Arc<P>) -> TestWorker {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::with_processor(&config, processor, Arc::new(TracingObserver));
    let (coordinator, shutdown) = ShutdownCoordinator::new(config.timeouts.shutdown);
    let coordinator = coordinator.with_in_flight(server.in_flight());

    let server_task = tokio::spawn(server.run(listener, shutdown.clone()));
    let supervisor = tokio::spawn(coordinator.supervise(server_task));

    TestWorker {
        addr,
        shutdown,
        supervisor,
    }
}

/// Start a worker running the production processor.
#[allow(dead_code)]
pub async fn spawn_default_worker(config: WorkerConfig) -> (TestWorker, Arc<ProcessService>) {
    let service = Arc::new(ProcessService::new());
    let worker = spawn_worker(config, Arc::clone(&service)).await;
    (worker, service)
}

/// Processor that sleeps before delegating to `ProcessService`.
#[allow(dead_code)]
pub struct SlowProcessor {
    pub delay: Duration,
    pub inner: ProcessService,
    pub started: AtomicU64,
}

#[allow(dead_code)]
impl SlowProcessor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: ProcessService::new(),
            started: AtomicU64::new(0),
        }
    }

    pub fn started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }
}

impl Processor for SlowProcessor {
    fn process(
        &self,
        scope: &Scope,
        input: ProcessInput,
    ) -> impl Future<Output = Result<ProcessResult, ProcessError>> + Send {
        self.started.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay;
        let scope = scope.clone();
        async move {
            tokio::time::sleep(delay).await;
            self.inner.execute(&scope, input)
        }
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
