//! # Wire Vocabulary
//!
//! Routes, form fields and JSON bodies shared by the agent and its callers.

use serde::{Deserialize, Serialize};

/// Default agent port.
pub const DEFAULT_PORT: u16 = 31000;

/// Streaming command execution (multipart field `command`).
pub const ROUTE_EXECUTE: &str = "/i/cmd/executeCmdSse";
/// Upload-and-replace (multipart `file` + `toFilePath`).
pub const ROUTE_UPLOAD: &str = "/i/file/uploadToPathReplace";
/// Move a file on the agent host (JSON [`MoveFileRequest`]).
pub const ROUTE_MOVE: &str = "/i/file/moveFile";
/// Liveness probe.
pub const ROUTE_HEALTH: &str = "/health";

/// Media type of the streaming response.
pub const EVENT_STREAM: &str = "text/event-stream";

pub const FIELD_COMMAND: &str = "command";
pub const FIELD_FILE: &str = "file";
pub const FIELD_TO_FILE_PATH: &str = "toFilePath";

/// Result body of the non-streaming routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResult {
    pub code: u16,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub message: String,
}

impl ApiResult {
    pub const OK: u16 = 200;
    pub const BAD_REQUEST: u16 = 400;
    pub const FAILED: u16 = 500;

    pub fn success() -> Self {
        Self {
            code: Self::OK,
            data: String::new(),
            message: "ok".to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: Self::BAD_REQUEST,
            data: String::new(),
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            code: Self::FAILED,
            data: String::new(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Self::OK
    }
}

/// Body of [`ROUTE_MOVE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveFileRequest {
    pub source: String,
    pub target: String,
}
