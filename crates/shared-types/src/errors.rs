//! # Error Types
//!
//! Decode errors surfaced by the frame codec.

use thiserror::Error;

/// A malformed frame. Decoding continues after any of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// `event:` named something other than heartbeat/data/end/error.
    #[error("unknown event kind: {0}")]
    UnknownKind(String),

    /// A non-empty, non-comment line without a `:` separator.
    #[error("malformed line: {0}")]
    MalformedLine(String),

    /// A line that is not valid UTF-8.
    #[error("line is not valid UTF-8 ({len} bytes)")]
    InvalidUtf8 { len: usize },

    /// A single line grew past the decoder's limit before its newline.
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}
