//! Response body read loop.
//!
//! One task per connection owns the body and is the only writer to the event
//! and error queues. It stops at end of body, on a read error, or when the
//! done signal fires; in every case the response is dropped on exit, which
//! releases the connection.

use futures::StreamExt;
use parking_lot::Mutex;
use shared_types::{FrameDecoder, FrameError, StreamEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::ClientError;

/// Connection bookkeeping shared by the client handle and its read task.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub connected: bool,
    /// Bumped each time a connect claims the slot.
    pub generation: u64,
    /// Fired exactly once per connection.
    pub done: Option<oneshot::Sender<()>>,
    pub last_event_id: Option<String>,
    pub events: Option<mpsc::Receiver<StreamEvent>>,
    pub errors: Option<mpsc::Receiver<ClientError>>,
}

impl Shared {
    /// Returns whether this call did the closing.
    pub fn close(&mut self) -> bool {
        if !self.connected {
            return false;
        }
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
        self.connected = false;
        true
    }

    /// Fire the done signal of a connection that was closed while its
    /// request was still in flight.
    pub fn close_pending(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }

    /// End-of-body close from the read task of `generation`. A newer
    /// connection is left alone.
    pub fn release(&mut self, generation: u64) -> bool {
        self.generation == generation && self.close()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Closed,
}

pub(crate) struct ReadTask {
    pub shared: Arc<Mutex<Shared>>,
    pub events: mpsc::Sender<StreamEvent>,
    pub errors: mpsc::Sender<ClientError>,
    pub done: oneshot::Receiver<()>,
    pub enqueue_timeout: Duration,
    pub generation: u64,
}

impl ReadTask {
    pub async fn run(mut self, response: reqwest::Response) {
        let mut body = response.bytes_stream();
        let mut decoder = FrameDecoder::new();

        loop {
            let (items, ended) = tokio::select! {
                biased;
                _ = &mut self.done => {
                    debug!("close requested; dropping response");
                    return;
                }
                chunk = body.next() => match chunk {
                    Some(Ok(bytes)) => (decoder.feed(&bytes), false),
                    Some(Err(e)) => {
                        self.report(ClientError::Read(e.to_string()));
                        break;
                    }
                    None => (decoder.finish(), true),
                }
            };
            if self.deliver_all(items).await == Flow::Closed {
                return;
            }
            if ended {
                debug!("event stream ended");
                break;
            }
        }

        self.shared.lock().release(self.generation);
    }

    async fn deliver_all(&mut self, items: Vec<Result<StreamEvent, FrameError>>) -> Flow {
        for item in items {
            if self.deliver(item).await == Flow::Closed {
                debug!("close requested during delivery; dropping response");
                return Flow::Closed;
            }
        }
        Flow::Continue
    }

    /// Queue one decoded item. A full event queue is waited on for at most
    /// `enqueue_timeout`, and the wait ends early when the done signal fires.
    async fn deliver(&mut self, item: Result<StreamEvent, FrameError>) -> Flow {
        let event = match item {
            Ok(event) => event,
            Err(e) => {
                self.report(e.into());
                return Flow::Continue;
            }
        };
        let id = event.id.clone();
        let sent = tokio::select! {
            biased;
            _ = &mut self.done => return Flow::Closed,
            sent = self.events.send_timeout(event, self.enqueue_timeout) => sent,
        };
        match sent {
            Ok(()) => {
                if let Some(id) = id {
                    self.shared.lock().last_event_id = Some(id);
                }
            }
            Err(mpsc::error::SendTimeoutError::Timeout(event)) => {
                warn!(kind = %event.kind, "event queue full; dropping event");
            }
            Err(mpsc::error::SendTimeoutError::Closed(_)) => {
                debug!("event consumer gone");
            }
        }
        Flow::Continue
    }

    fn report(&self, err: ClientError) {
        if let Err(e) = self.errors.try_send(err) {
            warn!(error = %e, "error queue full; dropping error");
        }
    }
}
