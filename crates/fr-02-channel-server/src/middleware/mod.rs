//! Middleware stack for the channel server.
//!
//! Layer order: Request → Tracing → Auth → Router
//!
//! Tracing sits outside Auth so rejected requests still get a span and a
//! request count; nothing after Auth ever sees an unauthenticated request.

pub mod auth;
pub mod metrics;
pub mod tracing;

pub use self::auth::{AuthLayer, Tripwire};
pub use self::metrics::{ChannelMetrics, MetricsSnapshot};
pub use self::tracing::TracingLayer;
