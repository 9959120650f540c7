//! Channel server - accept loop and route wiring.
//!
//! The accept loop drives hyper directly instead of `axum::serve` so that a
//! connection can be dropped mid-request: every request carries the
//! connection's [`Tripwire`], and a tripped wire wins the race against the
//! connection future before any response bytes are written.

use crate::domain::{AgentConfig, ServerError};
use crate::handlers::{execute, files, health, AppState};
use crate::middleware::{AuthLayer, ChannelMetrics, TracingLayer, Tripwire};
use crate::sessions::LiveSessions;
use axum::{
    body::Body,
    extract::{ConnectInfo, DefaultBodyLimit},
    http::Request,
    response::Response,
    routing::{get, post},
    Router,
};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use shared_crypto::EnvelopeVerifier;
use shared_types::{ROUTE_EXECUTE, ROUTE_HEALTH, ROUTE_MOVE, ROUTE_UPLOAD};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tower::{Service, ServiceBuilder, ServiceExt};
use tracing::{debug, info, warn};

/// Headers must arrive within this window.
const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Back-off after a failed accept (e.g. fd exhaustion).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Channel server state
pub struct ChannelServer {
    config: AgentConfig,
    verifier: EnvelopeVerifier,
    metrics: Arc<ChannelMetrics>,
    sessions: LiveSessions,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ChannelServer {
    /// Create a new channel server. Fails if the configuration or the key
    /// material is invalid.
    pub fn new(config: AgentConfig) -> Result<Self, ServerError> {
        config.validate()?;
        let verifier = EnvelopeVerifier::new(config.envelope_keys()?);

        Ok(Self {
            config,
            verifier,
            metrics: Arc::new(ChannelMetrics::new()),
            sessions: LiveSessions::new(),
            shutdown_tx: None,
        })
    }

    /// Bind the configured address. Port 0 picks a free port; read it back
    /// with `local_addr()`.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.config.http_addr();
        TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Bind and serve until [`shutdown`](Self::shutdown) is called.
    pub async fn start(&mut self) -> Result<(), ServerError> {
        if self.shutdown_tx.is_some() {
            return Err(ServerError::AlreadyStarted);
        }
        let listener = self.bind().await?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        self.serve(listener, async {
            let _ = shutdown_rx.await;
        })
        .await
    }

    /// Trigger shutdown of a server running via [`start`](Self::start)
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Accept connections on `listener` until `shutdown` resolves, then
    /// cancel every live session.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Internal(format!("listener address: {e}")))?;
        let service = ServiceBuilder::new()
            .layer(TracingLayer::new(Arc::clone(&self.metrics)))
            .layer(AuthLayer::new(
                self.verifier.clone(),
                Arc::clone(&self.metrics),
            ))
            .service(self.build_router());

        info!(addr = %local_addr, "channel server listening");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Received shutdown signal");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tokio::spawn(serve_connection(stream, peer, service.clone()));
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                }
            }
        }

        let cancelled = self.sessions.cancel_all();
        info!(cancelled, "channel server stopped");
        Ok(())
    }

    /// Get metrics
    pub fn metrics(&self) -> Arc<ChannelMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Sessions currently streaming
    pub fn sessions(&self) -> LiveSessions {
        self.sessions.clone()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn build_router(&self) -> Router {
        let state = AppState {
            session: Arc::new(self.config.session.to_session_config()),
            temp_root: Arc::new(self.config.placement.temp_root.clone()),
            metrics: Arc::clone(&self.metrics),
            sessions: self.sessions.clone(),
        };

        Router::new()
            .route(ROUTE_EXECUTE, post(execute::execute_stream))
            .route(
                ROUTE_UPLOAD,
                post(files::upload_to_path_replace)
                    .layer(DefaultBodyLimit::max(self.config.placement.max_upload_size)),
            )
            .route(ROUTE_MOVE, post(files::move_file))
            .route(ROUTE_HEALTH, get(health))
            .with_state(state)
    }
}

/// Serve one connection. Returns as soon as the request tripwire fires, which
/// drops the socket with nothing written.
async fn serve_connection<S>(stream: TcpStream, peer: SocketAddr, service: S)
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send,
{
    let tripwire = Tripwire::new();
    let request_tripwire = tripwire.clone();
    let hyper_service = hyper::service::service_fn(move |req: Request<Incoming>| {
        let mut req = req.map(Body::new);
        req.extensions_mut().insert(request_tripwire.clone());
        req.extensions_mut().insert(ConnectInfo(peer));
        service.clone().oneshot(req)
    });

    let conn = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(HEADER_READ_TIMEOUT)
        .serve_connection(TokioIo::new(stream), hyper_service);

    tokio::select! {
        result = conn => {
            if let Err(e) = result {
                debug!(%peer, error = %e, "connection ended with error");
            }
        }
        _ = tripwire.tripped() => {
            debug!(%peer, "connection dropped without response");
        }
    }
}
