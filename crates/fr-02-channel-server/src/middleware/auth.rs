//! Envelope authentication middleware.
//!
//! Fail-closed: a request whose envelope does not verify never reaches a
//! handler and never gets a response. The service trips the connection's
//! [`Tripwire`] and parks; the accept loop then drops the socket before hyper
//! writes a single byte. The reason is logged at debug level only.

use axum::{body::Body, http::Request, response::Response};
use shared_crypto::EnvelopeVerifier;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::Notify;
use tower::{Layer, Service};
use tracing::{debug, error};

use super::metrics::ChannelMetrics;

/// Per-connection kill switch, inserted into every request's extensions by
/// the accept loop.
#[derive(Clone, Default)]
pub struct Tripwire(Arc<Notify>);

impl Tripwire {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the owning connection to close without a response.
    pub fn trip(&self) {
        self.0.notify_one();
    }

    /// Resolves once `trip()` was called, even if it happened first.
    pub async fn tripped(&self) {
        self.0.notified().await;
    }
}

/// Authentication layer
#[derive(Clone)]
pub struct AuthLayer {
    verifier: Arc<EnvelopeVerifier>,
    metrics: Arc<ChannelMetrics>,
}

impl AuthLayer {
    pub fn new(verifier: EnvelopeVerifier, metrics: Arc<ChannelMetrics>) -> Self {
        Self {
            verifier: Arc::new(verifier),
            metrics,
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            verifier: Arc::clone(&self.verifier),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    verifier: Arc<EnvelopeVerifier>,
    metrics: Arc<ChannelMetrics>,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let verifier = Arc::clone(&self.verifier);
        let metrics = Arc::clone(&self.metrics);
        // Keep the instance that was polled ready.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let verdict = verifier.verify_headers(|name| req.headers().get(name)?.to_str().ok());
            match verdict {
                Ok(()) => inner.call(req).await,
                Err(reason) => {
                    debug!(%reason, path = %req.uri().path(), "envelope rejected");
                    metrics.record_auth_rejection();
                    match req.extensions().get::<Tripwire>() {
                        Some(tripwire) => tripwire.trip(),
                        None => error!("rejected request has no tripwire; leaving it unanswered"),
                    }
                    std::future::pending().await
                }
            }
        })
    }
}
