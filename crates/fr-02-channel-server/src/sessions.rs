//! Registry of live sessions, so shutdown can cancel them.

use fr_01_process_session::{CancelHandle, CancelReason, ProcessSession};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::middleware::ChannelMetrics;

#[derive(Clone, Default)]
pub struct LiveSessions {
    inner: Arc<Mutex<HashMap<Uuid, CancelHandle>>>,
}

impl LiveSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session` until it reaches a terminal state.
    pub fn track(&self, session: &ProcessSession, metrics: Arc<ChannelMetrics>) {
        let id = session.id();
        self.inner.lock().insert(id, session.cancel_handle());
        metrics.record_session_started();

        let registry = Arc::clone(&self.inner);
        let mut state = session.state_watch();
        tokio::spawn(async move {
            let outcome = state
                .wait_for(|s| s.is_terminal())
                .await
                .map(|s| s.clone());
            registry.lock().remove(&id);
            metrics.record_session_ended();
            debug!(session = %id, ?outcome, "session released");
        });
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel every live session.
    pub fn cancel_all(&self) -> usize {
        let handles: Vec<CancelHandle> = self.inner.lock().values().cloned().collect();
        for handle in &handles {
            handle.cancel(CancelReason::Caller);
        }
        handles.len()
    }
}
