//! # Output Queue
//!
//! Bounded FIFO shared by the two pipe readers (producers) and the
//! supervisor, drained by the session's consumer.
//!
//! Closing is tracked by one atomic flag: the first `finish()` wins and
//! drops the sender, every later `finish()`/`close()` is a no-op.

use parking_lot::Mutex;
use shared_types::StreamEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct OutputQueue {
    sender: Mutex<Option<mpsc::Sender<StreamEvent>>>,
    terminated: AtomicBool,
}

impl OutputQueue {
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let queue = Arc::new(Self {
            sender: Mutex::new(Some(tx)),
            terminated: AtomicBool::new(false),
        });
        (queue, rx)
    }

    /// Enqueue a non-terminal event, waiting for room.
    ///
    /// Returns `false` once the queue is closed or the consumer is gone.
    pub async fn push(&self, event: StreamEvent) -> bool {
        // Never hold the lock across the await.
        let sender = match self.sender.lock().as_ref() {
            Some(sender) => sender.clone(),
            None => return false,
        };
        sender.send(event).await.is_ok()
    }

    /// Enqueue the terminal event and close the queue.
    ///
    /// Only the first call delivers its event.
    pub async fn finish(&self, event: StreamEvent) -> bool {
        if self
            .terminated
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let Some(sender) = self.sender.lock().take() else {
            return false;
        };
        sender.send(event).await.is_ok()
    }

    /// Close without a terminal event.
    pub fn close(&self) {
        self.terminated.store(true, Ordering::Release);
        self.sender.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}
