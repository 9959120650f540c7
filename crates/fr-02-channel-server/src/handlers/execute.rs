//! Streaming command execution.

use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, Multipart, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use fr_01_process_session::ProcessSession;
use futures::StreamExt;
use shared_types::{encode, ApiResult, EVENT_STREAM, FIELD_COMMAND};
use std::convert::Infallible;
use tracing::{debug, error, info};

use super::AppState;

/// Run the `command` form field and stream its events, one body chunk per
/// frame.
///
/// Spawn failures fail the request before any frame. Dropping the response
/// body (client gone) cancels the session.
pub async fn execute_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let command = match read_command(multipart).await {
        Ok(command) => command,
        Err(message) => return bad_request(message),
    };
    if command.trim().is_empty() {
        return bad_request("command is empty".to_string());
    }
    if let Some(last_id) = headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
    {
        debug!(last_id, "resumption hint received; output is not replayed");
    }

    let session = match ProcessSession::spawn(&command, &state.session) {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "spawn failed");
            state.metrics.record_spawn_failure();
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResult::failed(e.to_string())),
            )
                .into_response();
        }
    };
    info!(session = %session.id(), pid = ?session.pid(), %command, "executing");
    state.sessions.track(&session, state.metrics.clone());

    let frames = session
        .into_stream()
        .map(|event| Ok::<_, Infallible>(encode(&event)));

    let mut response = Response::new(Body::from_stream(frames));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(EVENT_STREAM));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

async fn read_command(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, String> {
    let mut multipart = multipart.map_err(|e| e.body_text())?;
    let mut command = String::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| e.body_text())? {
        if field.name() == Some(FIELD_COMMAND) {
            command = field.text().await.map_err(|e| e.body_text())?;
        }
    }
    Ok(command)
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ApiResult::bad_request(message))).into_response()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::middleware::ChannelMetrics;
    use crate::sessions::LiveSessions;
    use axum::{http::Request, routing::post, Router};
    use fr_01_process_session::SessionConfig;
    use shared_types::{EventKind, FrameDecoder, StreamEvent};
    use std::path::PathBuf;
    use std::sync::Arc;
    use tower::ServiceExt;

    pub(crate) const BOUNDARY: &str = "fleet-relay-test-boundary";

    pub(crate) fn state(temp_root: PathBuf) -> AppState {
        AppState {
            session: Arc::new(SessionConfig::default()),
            temp_root: Arc::new(temp_root),
            metrics: Arc::new(ChannelMetrics::new()),
            sessions: LiveSessions::new(),
        }
    }

    /// Text fields as (name, value); a file field as (name, filename, bytes).
    pub(crate) fn multipart_body(
        fields: &[(&str, &str)],
        file: Option<(&str, &str, &[u8])>,
    ) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((name, filename, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    pub(crate) fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn router(state: AppState) -> Router {
        Router::new()
            .route("/exec", post(execute_stream))
            .with_state(state)
    }

    #[tokio::test]
    async fn test_streams_echo() {
        let state = state(std::env::temp_dir());
        let metrics = state.metrics.clone();
        let request = multipart_request("/exec", multipart_body(&[("command", "echo hello")], None));

        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], EVENT_STREAM);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let mut decoder = FrameDecoder::new();
        let events: Vec<StreamEvent> = decoder
            .feed(&body)
            .into_iter()
            .map(Result::unwrap)
            .collect();

        let output: String = events
            .iter()
            .filter(|e| e.kind == EventKind::Data)
            .map(|e| e.payload.as_str())
            .collect();
        assert_eq!(output, "hello\n");
        assert_eq!(events.last(), Some(&StreamEvent::end("completed, exit 0")));
        assert_eq!(metrics.snapshot().sessions_started, 1);
    }

    #[tokio::test]
    async fn test_empty_command_is_bad_request() {
        let request = multipart_request("/exec", multipart_body(&[("command", "  ")], None));
        let response = router(state(std::env::temp_dir()))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let result: ApiResult = serde_json::from_slice(&body).unwrap();
        assert_eq!(result.code, ApiResult::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_multipart_is_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/exec")
            .body(Body::from("command=ls"))
            .unwrap();
        let response = router(state(std::env::temp_dir()))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
