//! Client errors.

use shared_crypto::CryptoError;
use shared_types::FrameError;
use std::error::Error as StdError;
use std::io;
use thiserror::Error;

/// Errors that can occur when talking to an agent.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The agent answered with something other than 200
    #[error("unexpected status: {0}")]
    Status(u16),

    /// The agent answered 200 but not with an event stream
    #[error("not an event stream, content type: {0:?}")]
    ContentType(String),

    /// The connection ended before any response. This is what an
    /// authentication failure looks like, and also an unreachable agent.
    #[error("connection closed before a response: {0}")]
    ConnectionClosed(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// `connect()` while a stream is already open
    #[error("client is already connected")]
    AlreadyConnected,

    /// `reconnect()`, `events()` or `errors()` with nothing to act on
    #[error("client is not connected")]
    NotConnected,

    /// Sealing the request envelope failed
    #[error("envelope error: {0}")]
    Envelope(#[from] CryptoError),

    /// Opening a local file part failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A malformed frame; the stream keeps going
    #[error("decode error: {0}")]
    Decode(#[from] FrameError),

    /// Reading the response body failed; the stream ends
    #[error("read error: {0}")]
    Read(String),
}

impl ClientError {
    /// Sort a transport error: anything that ended before the agent said a
    /// word becomes `ConnectionClosed`.
    pub(crate) fn from_send(err: reqwest::Error) -> Self {
        if err.is_connect() || closed_early(&err) {
            ClientError::ConnectionClosed(err.to_string())
        } else {
            ClientError::Http(err)
        }
    }
}

fn closed_early(err: &(dyn StdError + 'static)) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<io::Error>() {
            if matches!(
                io.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        if let Some(hyper_err) = cause.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() {
                return true;
            }
        }
        source = cause.source();
    }
    false
}
