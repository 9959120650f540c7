//! Console output for a flow run.
//!
//! Progress and command output go to stdout, failures to stderr. Heartbeats
//! are never shown.

use shared_types::{EventKind, StreamEvent};
use std::io::Write;

/// Text lines to show for one event.
///
/// A `data` payload is split on newlines and blank lines are dropped. Chunks
/// are not line-aligned, so a partial line shows up as a line of its own.
pub fn event_lines(event: &StreamEvent) -> Vec<String> {
    match event.kind {
        EventKind::Heartbeat => Vec::new(),
        EventKind::Data => event
            .payload
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect(),
        EventKind::End => vec![format!("finished: {}", event.payload)],
        EventKind::Error => vec![format!("error: {}", event.payload)],
    }
}

/// Where a flow run writes.
pub struct Console<O: Write, E: Write> {
    out: O,
    err: E,
}

impl Console<std::io::Stdout, std::io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdout(), std::io::stderr())
    }
}

impl<O: Write, E: Write> Console<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }

    /// Section header.
    pub fn step(&mut self, message: &str) {
        let _ = writeln!(self.out, "\n===== {message} =====");
    }

    pub fn info(&mut self, message: &str) {
        let _ = writeln!(self.out, "{message}");
    }

    pub fn success(&mut self, message: &str) {
        let _ = writeln!(self.out, "ok: {message}");
    }

    pub fn failure(&mut self, message: &str) {
        let _ = writeln!(self.err, "FAILED: {message}");
    }

    /// Show an event, prefixing each line with `origin`.
    pub fn event(&mut self, origin: &str, event: &StreamEvent) {
        for line in event_lines(event) {
            let _ = match event.kind {
                EventKind::Error => writeln!(self.err, "[{origin}] {line}"),
                _ => writeln!(self.out, "[{origin}] {line}"),
            };
        }
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}
