//! Session tuning knobs.

use std::time::Duration;

/// Default heartbeat interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
/// Default absolute session deadline.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(10 * 60);
/// Default output queue capacity (events).
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
/// Default wait between interrupt and forced kill.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Period of `heartbeat` events, independent of process activity
    pub heartbeat_interval: Duration,
    /// Measured from spawn; expiry cancels the session
    pub deadline: Duration,
    /// Bounded output queue size
    pub queue_capacity: usize,
    /// How long an interrupted process may take to exit before it is killed
    pub kill_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            deadline: DEFAULT_DEADLINE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}
