//! # Frame Codec
//!
//! Server-sent-events style framing over a plain HTTP response body.
//!
//! ```text
//! event: data\n
//! data: first line\n
//! data: second line\n
//! \n
//! ```
//!
//! The encoder writes one `data:` line per `\n`-separated line of the payload;
//! the decoder joins them back with `\n`, so every payload round-trips exactly
//! (trailing newlines and empty payloads included).
//!
//! The decoder is a line scanner: it buffers partial lines across reads and
//! dispatches on a blank line. Malformed input yields a [`FrameError`] for
//! that frame only; decoding carries on with the next line.

use bytes::{BufMut, Bytes, BytesMut};
use std::time::Duration;

use crate::errors::FrameError;
use crate::event::{EventKind, StreamEvent};

/// Longest line the decoder buffers before giving up on it.
pub const MAX_LINE_LEN: usize = 1024 * 1024;

/// Encode one event as a complete frame.
pub fn encode(event: &StreamEvent) -> Bytes {
    let mut buf = BytesMut::with_capacity(event.payload.len() + 32);

    if let Some(id) = &event.id {
        // ids are single-line by construction
        buf.put_slice(b"id: ");
        buf.put_slice(id.replace(['\n', '\r'], "").as_bytes());
        buf.put_u8(b'\n');
    }

    buf.put_slice(b"event: ");
    buf.put_slice(event.kind.as_str().as_bytes());
    buf.put_u8(b'\n');

    for line in event.payload.split('\n') {
        buf.put_slice(b"data: ");
        buf.put_slice(line.as_bytes());
        buf.put_u8(b'\n');
    }

    buf.put_u8(b'\n');
    buf.freeze()
}

/// Fields collected since the last dispatch.
#[derive(Debug, Default)]
struct PendingFrame {
    kind: Option<String>,
    data: String,
    has_data: bool,
    id: Option<String>,
}

/// Incremental decoder.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    line: Vec<u8>,
    /// Skipping the rest of an oversized line.
    discarding: bool,
    pending: PendingFrame,
    last_event_id: Option<String>,
    retry: Option<Duration>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last `id:` seen on a dispatched frame.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Reconnection delay requested by the server, if any.
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    /// Feed a chunk of bytes, returning every frame completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<StreamEvent, FrameError>> {
        let mut out = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            rest = &tail[1..];

            if self.discarding {
                self.discarding = false;
                self.line.clear();
                continue;
            }

            self.line.extend_from_slice(head);
            if self.line.len() > MAX_LINE_LEN {
                self.line.clear();
                out.push(Err(FrameError::LineTooLong {
                    limit: MAX_LINE_LEN,
                }));
                continue;
            }

            let line = std::mem::take(&mut self.line);
            self.process_line(&line, &mut out);
        }

        if !rest.is_empty() && !self.discarding {
            self.line.extend_from_slice(rest);
            if self.line.len() > MAX_LINE_LEN {
                self.line.clear();
                self.discarding = true;
                out.push(Err(FrameError::LineTooLong {
                    limit: MAX_LINE_LEN,
                }));
            }
        }

        out
    }

    /// Flush at end of input: a trailing unterminated line is processed and a
    /// frame that has data but no blank line is dispatched.
    pub fn finish(&mut self) -> Vec<Result<StreamEvent, FrameError>> {
        let mut out = Vec::new();
        if !self.discarding && !self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            self.process_line(&line, &mut out);
        }
        self.line.clear();
        self.discarding = false;
        if let Some(frame) = self.dispatch() {
            out.push(frame);
        }
        out
    }

    fn process_line(&mut self, line: &[u8], out: &mut Vec<Result<StreamEvent, FrameError>>) {
        if line.is_empty() {
            if let Some(frame) = self.dispatch() {
                out.push(frame);
            }
            return;
        }
        if line[0] == b':' {
            return;
        }

        let Ok(text) = std::str::from_utf8(line) else {
            out.push(Err(FrameError::InvalidUtf8 { len: line.len() }));
            return;
        };
        let Some((field, value)) = text.split_once(':') else {
            out.push(Err(FrameError::MalformedLine(text.to_string())));
            return;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);

        match field {
            "event" => self.pending.kind = Some(value.to_string()),
            "data" => {
                if self.pending.has_data {
                    self.pending.data.push('\n');
                }
                self.pending.data.push_str(value);
                self.pending.has_data = true;
            }
            "id" => {
                if !value.contains('\0') {
                    self.pending.id = Some(value.to_string());
                }
            }
            "retry" => {
                if let Ok(ms) = value.trim().parse::<u64>() {
                    self.retry = Some(Duration::from_millis(ms));
                }
            }
            // unknown fields are ignored
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<Result<StreamEvent, FrameError>> {
        let pending = std::mem::take(&mut self.pending);
        if let Some(id) = &pending.id {
            self.last_event_id = Some(id.clone());
        }
        if !pending.has_data {
            return None;
        }

        let kind = match pending.kind.as_deref() {
            None | Some("") => EventKind::Data,
            Some(name) => match name.parse::<EventKind>() {
                Ok(kind) => kind,
                Err(e) => return Some(Err(e)),
            },
        };

        Some(Ok(StreamEvent {
            kind,
            payload: pending.data,
            id: pending.id,
        }))
    }
}
