//! Route handlers.
//!
//! | Route | Handler | Body |
//! |-------|---------|------|
//! | `POST /i/cmd/executeCmdSse` | [`execute::execute_stream`] | event stream |
//! | `POST /i/file/uploadToPathReplace` | [`files::upload_to_path_replace`] | [`ApiResult`] |
//! | `POST /i/file/moveFile` | [`files::move_file`] | [`ApiResult`] |
//! | `GET /health` | [`health`] | JSON |
//!
//! [`ApiResult`]: shared_types::ApiResult

pub mod execute;
pub mod files;

use axum::{extract::State, Json};
use fr_01_process_session::SessionConfig;
use std::path::PathBuf;
use std::sync::Arc;

use crate::middleware::ChannelMetrics;
use crate::sessions::LiveSessions;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionConfig>,
    pub temp_root: Arc<PathBuf>,
    pub metrics: Arc<ChannelMetrics>,
    pub sessions: LiveSessions,
}

/// Liveness plus counters.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "live_sessions": state.sessions.len(),
        "metrics": state.metrics.to_json(),
    }))
}
