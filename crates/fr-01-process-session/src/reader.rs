//! Raw-chunk pipe readers.
//!
//! Each reader forwards whatever the pipe yields, without waiting for a
//! newline. Chunks are decoded as UTF-8; a multi-byte sequence cut by a read
//! boundary is carried into the next chunk instead of being mangled.

use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::queue::OutputQueue;
use crate::state::CancelReason;
use shared_types::StreamEvent;

pub(crate) const READ_CHUNK: usize = 4096;

/// Incremental UTF-8 decoder over raw chunks.
#[derive(Debug, Default)]
pub struct Utf8Chunker {
    pending: Vec<u8>,
}

impl Utf8Chunker {
    /// Decode `bytes`, holding back an incomplete trailing sequence.
    /// Invalid bytes become U+FFFD.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let keep = incomplete_tail_len(&self.pending);
        let split = self.pending.len() - keep;
        let text = String::from_utf8_lossy(&self.pending[..split]).into_owned();
        self.pending.drain(..split);
        text
    }

    /// Flush whatever is left at EOF.
    pub fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

/// Length of a truncated multi-byte sequence at the end of `bytes`.
fn incomplete_tail_len(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(3) {
        let byte = bytes[len - back];
        if byte & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        let needed = if byte & 0b1110_0000 == 0b1100_0000 {
            2
        } else if byte & 0b1111_0000 == 0b1110_0000 {
            3
        } else if byte & 0b1111_1000 == 0b1111_0000 {
            4
        } else {
            1
        };
        return if needed > back { back } else { 0 };
    }
    0
}

/// Read `pipe` until EOF, an error, or cancellation, pushing every
/// non-empty chunk as a `data` event.
pub(crate) async fn pump<R>(
    mut pipe: R,
    label: &'static str,
    queue: Arc<OutputQueue>,
    mut cancel: watch::Receiver<Option<CancelReason>>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    let mut chunker = Utf8Chunker::default();

    loop {
        if cancel.borrow().is_some() {
            return;
        }
        let read = tokio::select! {
            read = pipe.read(&mut buf) => read,
            _ = cancel.changed() => return,
        };
        match read {
            Ok(0) => {
                let tail = chunker.finish();
                if !tail.is_empty() {
                    push_unless_cancelled(&queue, StreamEvent::data(tail), &mut cancel).await;
                }
                debug!(pipe = label, "eof");
                return;
            }
            Ok(n) => {
                let text = chunker.push(&buf[..n]);
                if text.is_empty() {
                    continue;
                }
                if !push_unless_cancelled(&queue, StreamEvent::data(text), &mut cancel).await {
                    return;
                }
            }
            Err(e) => {
                warn!(pipe = label, error = %e, "pipe read failed");
                let event = StreamEvent::error(format!("{label} read failed: {e}"));
                push_unless_cancelled(&queue, event, &mut cancel).await;
                return;
            }
        }
    }
}

/// A full queue never blocks a producer past cancellation.
async fn push_unless_cancelled(
    queue: &OutputQueue,
    event: StreamEvent,
    cancel: &mut watch::Receiver<Option<CancelReason>>,
) -> bool {
    if cancel.borrow().is_some() {
        return false;
    }
    tokio::select! {
        pushed = queue.push(event) => pushed,
        _ = cancel.changed() => false,
    }
}
