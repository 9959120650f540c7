//! Session lifecycle.
//!
//! ```text
//! [IDLE] ──spawn──→ [RUNNING] ──both pipes EOF + exit──→ [COMPLETED]
//!                       │
//!                       ├──deadline / cancel / disconnect──→ [CANCELLED]
//!                       │
//!                       └──wait error──→ [FAILED]
//! ```
//!
//! Terminal states are final: once reached, further transitions are ignored.

use std::fmt;
use tokio::sync::watch;

/// Why a session was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Absolute deadline expired
    Deadline,
    /// Explicit `cancel()` (operator interrupt, shutdown)
    Caller,
    /// The consumer went away (client disconnected)
    Disconnected,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Deadline => f.write_str("deadline exceeded"),
            CancelReason::Caller => f.write_str("cancelled by caller"),
            CancelReason::Disconnected => f.write_str("client disconnected"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running { pid: Option<u32> },
    /// `code` is `None` when the process was ended by a signal
    Completed { code: Option<i32>, summary: String },
    Cancelled { reason: CancelReason },
    Failed { message: String },
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed { .. }
                | SessionState::Cancelled { .. }
                | SessionState::Failed { .. }
        )
    }

    /// Payload of the `end` event for a terminal state.
    pub fn end_payload(&self) -> Option<String> {
        match self {
            SessionState::Completed { summary, .. } => Some(summary.clone()),
            SessionState::Cancelled { reason } => Some(format!("cancelled: {reason}")),
            SessionState::Failed { message } => Some(format!("failed: {message}")),
            _ => None,
        }
    }
}

/// Apply a transition unless the session already ended.
///
/// Returns `true` if the state changed.
pub(crate) fn advance(state: &watch::Sender<SessionState>, next: SessionState) -> bool {
    state.send_if_modified(|current| {
        if current.is_terminal() {
            return false;
        }
        *current = next;
        true
    })
}
