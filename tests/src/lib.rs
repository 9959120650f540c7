//! # Fleet Relay Test Suite
//!
//! End-to-end tests against a real agent on a loopback port.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── lib.rs            # TestAgent harness, keys, raw HTTP helpers
//! └── integration/
//!     ├── channel.rs    # auth gate, streaming, cancellation, heartbeats
//!     ├── placement.rs  # upload-and-replace, move
//!     └── driver.rs     # flow runs against a live agent
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p fleet-tests
//!
//! # Including the full-length heartbeat scenario
//! cargo test -p fleet-tests -- --include-ignored
//! ```

use fr_02_channel_server::{AgentConfig, ChannelMetrics, ChannelServer};
use fr_03_channel_client::ChannelClient;
use shared_crypto::{AuthEnvelope, EnvelopeKeys, EnvelopeSigner};
use shared_types::StreamEvent;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub mod integration;

// =============================================================================
// KEYS
// =============================================================================

pub const AES_KEY: &str = "*1'Z;XLCZ(*^#^@*()212oawePJ[,23]";
pub const HMAC_KEY: &str = "tesw-dadad0-pm2-pp9";
pub const SHARED_SECRET: &str = "meiyoumima";

/// Agent config on an ephemeral loopback port with the test keys.
pub fn agent_config() -> AgentConfig {
    let mut config = AgentConfig::default();
    config.http.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.http.port = 0;
    config.auth.aes_key = AES_KEY.into();
    config.auth.hmac_key = HMAC_KEY.into();
    config.auth.shared_secret = SHARED_SECRET.into();
    config
}

pub fn signer() -> EnvelopeSigner {
    signer_with(AES_KEY, HMAC_KEY, SHARED_SECRET)
}

pub fn signer_with(aes_key: &str, hmac_key: &str, secret: &str) -> EnvelopeSigner {
    let keys = EnvelopeKeys::new(aes_key.as_bytes(), hmac_key.as_bytes(), secret.as_bytes())
        .expect("test keys are valid");
    EnvelopeSigner::new(keys)
}

// =============================================================================
// AGENT HARNESS
// =============================================================================

/// A channel server running in the background.
pub struct TestAgent {
    pub addr: SocketAddr,
    pub metrics: Arc<ChannelMetrics>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TestAgent {
    pub async fn start() -> Self {
        Self::start_with(agent_config()).await
    }

    pub async fn start_with(config: AgentConfig) -> Self {
        let server = ChannelServer::new(config).expect("valid agent config");
        let listener = server.bind().await.expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let metrics = server.metrics();
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _ = server
                .serve(listener, async {
                    let _ = rx.await;
                })
                .await;
        });
        Self {
            addr,
            metrics,
            shutdown: Some(tx),
            task,
        }
    }

    /// `host:port` as a client would be configured.
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn client(&self, command: &str) -> ChannelClient {
        ChannelClient::for_command(&self.address(), signer(), command).expect("client")
    }

    /// Stop accepting and cancel live sessions.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.task).await;
    }
}

impl Drop for TestAgent {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Drain the client's event stream until the agent ends it.
pub async fn collect_events(client: &ChannelClient, limit: Duration) -> Vec<StreamEvent> {
    use futures::StreamExt;

    let events = client.events().expect("connected client");
    tokio::time::timeout(limit, events.collect::<Vec<_>>())
        .await
        .expect("stream ended in time")
}

/// Raw HTTP/1.1 request with `envelope` as headers and an empty body.
pub fn raw_request(method: &str, path: &str, envelope: &AuthEnvelope) -> String {
    let mut request = format!(
        "{method} {path} HTTP/1.1\r\nHost: agent\r\nConnection: close\r\nContent-Length: 0\r\n"
    );
    for (name, value) in envelope.headers() {
        request.push_str(&format!("{name}: {value}\r\n"));
    }
    request.push_str("\r\n");
    request
}

/// Send `request` and read whatever comes back until EOF or reset.
pub async fn raw_exchange(addr: SocketAddr, request: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream
        .write_all(request.as_bytes())
        .await
        .expect("write request");
    let mut received = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut received))
        .await
        .expect("agent closed the connection");
    received
}

/// Poll `check` every 5ms until it holds or `limit` passes.
pub async fn wait_until<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
