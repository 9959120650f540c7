//! Client tuning.

use std::time::Duration;

/// Decoded-event queue capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Error queue capacity
pub const DEFAULT_ERROR_CAPACITY: usize = 10;

/// How long the read task waits on a full event queue before dropping
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connect_timeout: Duration,
    /// Whole-request limit; must outlast the agent's session deadline.
    pub request_timeout: Duration,
    pub event_capacity: usize,
    pub error_capacity: usize,
    pub enqueue_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(11 * 60),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            error_capacity: DEFAULT_ERROR_CAPACITY,
            enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
        }
    }
}
