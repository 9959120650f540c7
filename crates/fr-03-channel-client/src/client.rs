//! Channel client for one agent.

use parking_lot::Mutex;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use shared_crypto::EnvelopeSigner;
use shared_types::{
    ApiResult, MoveFileRequest, StreamEvent, EVENT_STREAM, FIELD_COMMAND, FIELD_FILE,
    FIELD_TO_FILE_PATH, ROUTE_EXECUTE, ROUTE_MOVE, ROUTE_UPLOAD,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::form::{file_part, FormSpec};
use crate::stream::{ReadTask, Shared};

/// Resumption hint header.
pub const LAST_EVENT_ID: &str = "Last-Event-ID";

/// `host:port` or a full URL, without a trailing slash.
pub fn normalize_base_url(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

/// Client for one agent.
///
/// Holds at most one open event stream at a time. Every request carries a
/// freshly sealed envelope.
pub struct ChannelClient {
    http: Client,
    base_url: String,
    signer: EnvelopeSigner,
    config: ClientConfig,
    form: FormSpec,
    shared: Arc<Mutex<Shared>>,
}

impl ChannelClient {
    /// Create a client for `address` (`host:port` or URL).
    pub fn new(address: &str, signer: EnvelopeSigner) -> Result<Self, ClientError> {
        Self::with_config(address, signer, ClientConfig::default())
    }

    pub fn with_config(
        address: &str,
        signer: EnvelopeSigner,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: normalize_base_url(address),
            signer,
            config,
            form: FormSpec::new(),
            shared: Arc::new(Mutex::new(Shared::default())),
        })
    }

    /// Shorthand for a client that will run `command`.
    pub fn for_command(
        address: &str,
        signer: EnvelopeSigner,
        command: &str,
    ) -> Result<Self, ClientError> {
        Ok(Self::new(address, signer)?.form_param(FIELD_COMMAND, command))
    }

    /// Add a form field sent with the stream request.
    pub fn form_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.field(key, value);
        self
    }

    /// Add a file part sent with the stream request, streamed from disk.
    pub fn file_param(mut self, form_field: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.form.file(form_field, path);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock().connected
    }

    pub fn last_event_id(&self) -> Option<String> {
        self.shared.lock().last_event_id.clone()
    }

    pub fn set_last_event_id(&self, id: impl Into<String>) {
        self.shared.lock().last_event_id = Some(id.into());
    }

    // =========================================================================
    // EVENT STREAM
    // =========================================================================

    /// Open the event stream.
    ///
    /// # Errors
    ///
    /// - `AlreadyConnected` if a stream is open
    /// - `ConnectionClosed` if the agent dropped the connection without a
    ///   response (bad envelope) or cannot be reached
    /// - `Status` / `ContentType` if the response is not a 200 event stream
    pub async fn connect(&self) -> Result<(), ClientError> {
        let (generation, last_event_id) = {
            let mut shared = self.shared.lock();
            if shared.connected {
                return Err(ClientError::AlreadyConnected);
            }
            // Claimed; a concurrent connect now fails and an older read task
            // can no longer close this slot.
            shared.connected = true;
            shared.generation += 1;
            (shared.generation, shared.last_event_id.clone())
        };

        match self.open(last_event_id).await {
            Ok(response) => {
                self.start_reading(response, generation);
                Ok(())
            }
            Err(e) => {
                let mut shared = self.shared.lock();
                if shared.generation == generation {
                    shared.connected = false;
                }
                Err(e)
            }
        }
    }

    async fn open(&self, last_event_id: Option<String>) -> Result<Response, ClientError> {
        let url = format!("{}{}", self.base_url, ROUTE_EXECUTE);
        let mut request = self
            .http
            .post(&url)
            .header(ACCEPT, EVENT_STREAM)
            .header(CACHE_CONTROL, "no-cache")
            .multipart(self.form.build().await?);
        if let Some(id) = last_event_id {
            request = request.header(LAST_EVENT_ID, id);
        }

        let response = self
            .sealed(request)?
            .send()
            .await
            .map_err(ClientError::from_send)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ClientError::Status(status.as_u16()));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with(EVENT_STREAM) {
            return Err(ClientError::ContentType(content_type.to_string()));
        }

        info!(%url, "event stream open");
        Ok(response)
    }

    fn start_reading(&self, response: Response, generation: u64) {
        let (events_tx, events_rx) = mpsc::channel(self.config.event_capacity);
        let (errors_tx, errors_rx) = mpsc::channel(self.config.error_capacity);
        let (done_tx, done_rx) = oneshot::channel();

        {
            let mut shared = self.shared.lock();
            if shared.generation != generation {
                // Closed and claimed again while the request was in flight.
                debug!("superseded connection; dropping response");
                return;
            }
            shared.done = Some(done_tx);
            shared.events = Some(events_rx);
            shared.errors = Some(errors_rx);
            if !shared.connected {
                // close() ran while the request was in flight.
                shared.close_pending();
            }
        }

        let task = ReadTask {
            shared: Arc::clone(&self.shared),
            events: events_tx,
            errors: errors_tx,
            done: done_rx,
            enqueue_timeout: self.config.enqueue_timeout,
            generation,
        };
        tokio::spawn(task.run(response));
    }

    /// Events of the current connection. Ends when the stream ends or the
    /// client is closed.
    pub fn events(&self) -> Result<ReceiverStream<StreamEvent>, ClientError> {
        self.shared
            .lock()
            .events
            .take()
            .map(ReceiverStream::new)
            .ok_or(ClientError::NotConnected)
    }

    /// Decode and read errors of the current connection.
    pub fn errors(&self) -> Result<ReceiverStream<ClientError>, ClientError> {
        self.shared
            .lock()
            .errors
            .take()
            .map(ReceiverStream::new)
            .ok_or(ClientError::NotConnected)
    }

    /// Stop reading and release the connection. Safe to call any number of
    /// times.
    pub fn close(&self) {
        if self.shared.lock().close() {
            debug!(base_url = %self.base_url, "channel closed");
        }
    }

    /// Close and connect again, sending the last delivered event id.
    pub async fn reconnect(&self) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        self.close();
        self.connect().await
    }

    // =========================================================================
    // FILE PLACEMENT
    // =========================================================================

    /// Upload `local_path` to `to_file_path` on the agent, replacing what is
    /// there.
    pub async fn upload(
        &self,
        local_path: &Path,
        to_file_path: &str,
    ) -> Result<ApiResult, ClientError> {
        let form = reqwest::multipart::Form::new()
            .text(FIELD_TO_FILE_PATH, to_file_path.to_string())
            .part(FIELD_FILE, file_part(local_path).await?);
        let request = self
            .http
            .post(format!("{}{}", self.base_url, ROUTE_UPLOAD))
            .multipart(form);
        self.call(request).await
    }

    /// Move a file on the agent.
    pub async fn move_file(&self, source: &str, target: &str) -> Result<ApiResult, ClientError> {
        let request = self
            .http
            .post(format!("{}{}", self.base_url, ROUTE_MOVE))
            .json(&MoveFileRequest {
                source: source.to_string(),
                target: target.to_string(),
            });
        self.call(request).await
    }

    async fn call(&self, request: RequestBuilder) -> Result<ApiResult, ClientError> {
        let response = self
            .sealed(request)?
            .send()
            .await
            .map_err(ClientError::from_send)?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ClientError::Status(status.as_u16()));
        }
        Ok(response.json().await?)
    }

    fn sealed(&self, mut request: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        for (name, value) in self.signer.seal()?.headers() {
            request = request.header(name, value);
        }
        Ok(request)
    }
}

impl Drop for ChannelClient {
    fn drop(&mut self) {
        self.shared.lock().close();
    }
}

impl std::fmt::Debug for ChannelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelClient")
            .field("base_url", &self.base_url)
            .field("connected", &self.is_connected())
            .finish()
    }
}
