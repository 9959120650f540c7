//! # Stream Events
//!
//! The unit carried by the channel. A session produces `data` events as its
//! process writes, `heartbeat` events on a timer, and exactly one `end`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::FrameError;

/// Payload of every heartbeat.
pub const HEARTBEAT_PAYLOAD: &str = "1";

/// `end` payload of a command that exited 0.
pub const SUCCESS_SUMMARY: &str = "completed, exit 0";

/// Event kinds on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Keep-alive tick, payload `1`.
    Heartbeat,
    /// A chunk of process output.
    Data,
    /// Terminal status summary.
    End,
    /// Non-terminal failure report (e.g. a pipe read error).
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Heartbeat => "heartbeat",
            EventKind::Data => "data",
            EventKind::End => "end",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "heartbeat" => Ok(EventKind::Heartbeat),
            "data" => Ok(EventKind::Data),
            "end" => Ok(EventKind::End),
            "error" => Ok(EventKind::Error),
            other => Err(FrameError::UnknownKind(other.to_string())),
        }
    }
}

/// One event of a session's stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub kind: EventKind,
    pub payload: String,
    /// Resumption hint, only present when the sender wrote an `id:` line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl StreamEvent {
    pub fn new(kind: EventKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
            id: None,
        }
    }

    pub fn heartbeat() -> Self {
        Self::new(EventKind::Heartbeat, HEARTBEAT_PAYLOAD)
    }

    pub fn data(payload: impl Into<String>) -> Self {
        Self::new(EventKind::Data, payload)
    }

    pub fn end(payload: impl Into<String>) -> Self {
        Self::new(EventKind::End, payload)
    }

    pub fn error(payload: impl Into<String>) -> Self {
        Self::new(EventKind::Error, payload)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// `end` closes a session's stream; nothing follows it.
    pub fn is_terminal(&self) -> bool {
        self.kind == EventKind::End
    }

    /// The `end` of a command that exited 0.
    pub fn is_success(&self) -> bool {
        self.is_terminal() && self.payload == SUCCESS_SUMMARY
    }
}
