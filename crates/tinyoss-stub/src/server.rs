//! Stub server lifecycle: bind, serve, shut down.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use crate::router::StubOperation;
use crate::service::StubService;
use crate::state::StubState;

/// Stub server settings.
#[derive(Debug, Clone, TypedBuilder)]
pub struct StubConfig {
    /// Largest listing page the server returns.
    #[builder(default = 1000)]
    pub max_keys: usize,
    /// Domain for virtual-hosted addressing (`{bucket}.{domain}`).
    #[builder(default = "localhost".to_owned(), setter(into))]
    pub domain: String,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A running in-memory S3 endpoint on a loopback port.
///
/// The server stops when [`StubServer::shutdown`] is awaited or the handle is
/// dropped.
#[derive(Debug)]
pub struct StubServer {
    addr: SocketAddr,
    service: StubService,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl StubServer {
    /// Bind `127.0.0.1:0` and start serving on a background task.
    pub async fn start(config: StubConfig) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind stub listener")?;
        let addr = listener
            .local_addr()
            .context("failed to read stub listener address")?;

        let service = StubService::new(&config.domain, config.max_keys);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(serve(listener, service.clone(), shutdown_rx));

        info!(%addr, domain = %config.domain, max_keys = config.max_keys, "stub server listening");

        Ok(Self {
            addr,
            service,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// Base URL of the server, e.g. `http://127.0.0.1:40123`.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Bound socket address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Backing storage, for direct inspection in tests.
    #[must_use]
    pub fn state(&self) -> &StubState {
        self.service.state()
    }

    /// Current server time.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.service.clock().now()
    }

    /// Move the server clock forward, e.g. past a presigned URL's expiry.
    pub fn advance_clock(&self, by: TimeDelta) {
        self.service.clock().advance(by);
        debug!(by_secs = by.num_seconds(), "stub clock advanced");
    }

    /// Requests received so far for `operation`.
    #[must_use]
    pub fn request_count(&self, operation: StubOperation) -> usize {
        self.service.request_count(operation)
    }

    /// Reset every request counter to zero.
    pub fn reset_request_counts(&self) {
        self.service.reset_request_counts();
    }

    /// Stop accepting connections and wait for in-flight requests to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "stub server task failed");
            }
        }
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn serve(listener: TcpListener, service: StubService, shutdown: oneshot::Receiver<()>) {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let conn = http.serve_connection(TokioIo::new(stream), service.clone());
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        debug!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            _ = &mut shutdown => {
                debug!("stub server shutting down");
                break;
            }
        }
    }

    graceful.shutdown().await;
    debug!("stub server stopped");
}
