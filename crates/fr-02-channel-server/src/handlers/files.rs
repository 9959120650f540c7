//! File placement routes.
//!
//! Both answer HTTP 200 with the outcome in the [`ApiResult`] body.

use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, State},
    Json,
};
use shared_types::{ApiResult, MoveFileRequest, FIELD_FILE, FIELD_TO_FILE_PATH};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use super::AppState;
use crate::placement::{self, Staging};

/// Stream the `file` part into a staging dir, then replace `toFilePath`.
pub async fn upload_to_path_replace(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Json<ApiResult> {
    let result = receive_and_place(&state, multipart).await;
    state.metrics.record_placement(result.is_ok());
    match result {
        Ok(path) => {
            info!(path = %path.display(), "upload replaced target");
            Json(ApiResult {
                data: path.display().to_string(),
                ..ApiResult::success()
            })
        }
        Err(message) => {
            warn!(%message, "upload failed");
            Json(ApiResult::failed(format!("upload failed: {message}")))
        }
    }
}

async fn receive_and_place(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<PathBuf, String> {
    let mut multipart = multipart.map_err(|e| e.body_text())?;

    let root = PathBuf::clone(&state.temp_root);
    let staging = blocking(move || Staging::create(&root)).await?;

    let received = receive_parts(&mut multipart, staging.upload_path()).await;
    let (to_path, file_name) = match received {
        Ok((to_path, Some(file_name))) => (to_path, file_name),
        Ok((_, None)) => {
            discard(staging).await;
            return Err(format!("missing `{FIELD_FILE}` part"));
        }
        Err(message) => {
            discard(staging).await;
            return Err(message);
        }
    };
    blocking(move || placement::replace_path(&staging, &file_name, &to_path)).await
}

/// Read the form, streaming the `file` part to `upload`. Returns the target
/// path and the uploaded file's name, if a file part was sent.
async fn receive_parts(
    multipart: &mut Multipart,
    upload: &Path,
) -> Result<(String, Option<String>), String> {
    let mut to_path = String::new();
    let mut file_name = None;
    while let Some(mut field) = multipart.next_field().await.map_err(|e| e.body_text())? {
        let name = field.name().unwrap_or_default().to_string();
        if name == FIELD_TO_FILE_PATH {
            to_path = field.text().await.map_err(|e| e.body_text())?;
        } else if name == FIELD_FILE {
            file_name = Some(field.file_name().unwrap_or_default().to_string());
            let mut out = tokio::fs::File::create(upload)
                .await
                .map_err(|e| format!("create staged file: {e}"))?;
            while let Some(chunk) = field.chunk().await.map_err(|e| e.body_text())? {
                out.write_all(&chunk)
                    .await
                    .map_err(|e| format!("write staged file: {e}"))?;
            }
            out.sync_all()
                .await
                .map_err(|e| format!("sync staged file: {e}"))?;
        }
    }
    Ok((to_path, file_name))
}

/// Remove an unused staging dir on the blocking pool.
async fn discard(staging: Staging) {
    if let Err(e) = tokio::task::spawn_blocking(move || drop(staging)).await {
        warn!(error = %e, "staging cleanup task failed");
    }
}

/// Move a file on this host.
pub async fn move_file(
    State(state): State<AppState>,
    request: Result<Json<MoveFileRequest>, JsonRejection>,
) -> Json<ApiResult> {
    let result = match request {
        Ok(Json(MoveFileRequest { source, target })) => {
            blocking(move || placement::move_file(&source, &target)).await
        }
        Err(rejection) => Err(rejection.body_text()),
    };
    state.metrics.record_placement(result.is_ok());
    match result {
        Ok(path) => {
            info!(path = %path.display(), "file moved");
            Json(ApiResult {
                data: path.display().to_string(),
                ..ApiResult::success()
            })
        }
        Err(message) => {
            warn!(%message, "move failed");
            Json(ApiResult::failed(message))
        }
    }
}

/// Run filesystem work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, String>
where
    F: FnOnce() -> Result<T, placement::PlacementError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(e) => Err(format!("placement task failed: {e}")),
    }
}
