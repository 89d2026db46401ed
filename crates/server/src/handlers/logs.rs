//! Activity, download and history log endpoints.

use crate::error::ApiResult;
use crate::handlers::common::{MessageResponse, record_activity};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use perch_core::{ActivityEntry, ActivityKind, DownloadLogEntry, HistoryEntry};

/// GET /api/logs - The plain-text activity log.
pub async fn get_logs(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let text = state.metadata.read_activity_log().await?;
    Ok(([(CONTENT_TYPE, "text/plain; charset=utf-8")], text))
}

/// DELETE /api/logs - Clear both forms of the activity log.
///
/// The clear itself is then recorded as the first entry of the new log.
pub async fn clear_logs(State(state): State<AppState>) -> ApiResult<Json<MessageResponse>> {
    state.metadata.clear_activity().await?;
    record_activity(&state, ActivityKind::System, "cleared activity logs").await?;
    tracing::info!("activity logs cleared");
    Ok(Json(MessageResponse::new("logs cleared")))
}

/// GET /api/activity - Structured activity, newest first.
pub async fn list_activity(State(state): State<AppState>) -> ApiResult<Json<Vec<ActivityEntry>>> {
    Ok(Json(state.metadata.list_activity().await?))
}

/// GET /api/download-logs - Recorded download attempts, oldest first.
pub async fn list_download_logs(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<DownloadLogEntry>>> {
    Ok(Json(state.metadata.list_downloads().await?))
}

/// GET /api/version-history - Release history, oldest first.
pub async fn list_version_history(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    Ok(Json(state.metadata.list_history().await?))
}

/// DELETE /api/version-history/{id} - Remove one history entry.
///
/// Only the record goes; artifacts it references stay in storage.
pub async fn delete_version_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let entry = state.metadata.delete_history(&id).await?;
    record_activity(
        &state,
        ActivityKind::DeleteHistory,
        format!("deleted version history: {} v{}", entry.platform, entry.version),
    )
    .await?;
    tracing::info!(id = %id, platform = %entry.platform, version = %entry.version, "history entry deleted");
    Ok(Json(MessageResponse::new("history entry deleted")))
}
