//! Cross-crate scenarios against a live agent.

pub mod channel;
pub mod driver;
pub mod placement;
