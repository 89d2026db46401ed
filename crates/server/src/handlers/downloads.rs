//! Artifact download endpoints.

use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{client_ip, parse_platform, record_activity, stream_artifact};
use crate::metrics;
use crate::state::AppState;
use axum::extract::{Path, Request, State};
use axum::http::header::CONTENT_LENGTH;
use axum::response::Response;
use perch_core::{ActivityKind, DownloadLogEntry, DownloadStatus, Platform};
use perch_storage::artifact_key;
use time::OffsetDateTime;

/// GET /download/{platform}/{filename} - Stream one artifact.
///
/// Every attempt, successful or not, is written to the download log,
/// including requests for an unknown platform.
pub async fn download_file(
    State(state): State<AppState>,
    Path((requested, filename)): Path<(String, String)>,
    request: Request,
) -> ApiResult<Response> {
    let ip = client_ip(request.extensions());
    let platform = match parse_platform(&requested) {
        Ok(platform) => platform,
        Err(e) => {
            log_download(&state, &requested, None, &filename, &ip, DownloadStatus::Failed).await;
            tracing::warn!(platform = %requested, file = %filename, ip = %ip, "download for unknown platform");
            return Err(e);
        }
    };

    let result = match artifact_key(platform, &filename) {
        Ok(key) => stream_artifact(&state, &key, &filename).await,
        Err(e) => Err(e.into()),
    };

    let status = if result.is_ok() {
        DownloadStatus::Success
    } else {
        DownloadStatus::Failed
    };
    log_download(&state, platform.as_str(), Some(platform), &filename, &ip, status).await;

    match &result {
        Ok(response) => {
            if let Some(len) = response
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
            {
                metrics::BYTES_DOWNLOADED.inc_by(len);
            }
            tracing::info!(%platform, file = %filename, ip = %ip, "serving download");
        }
        Err(e) => {
            tracing::warn!(%platform, file = %filename, ip = %ip, error = %e, "download failed");
        }
    }
    result
}

/// Append to the download log; failures are logged and otherwise ignored so
/// they never block the transfer itself.
///
/// `platform` is `None` when `requested` is not a known platform; such
/// entries carry version `unknown`.
async fn log_download(
    state: &AppState,
    requested: &str,
    platform: Option<Platform>,
    filename: &str,
    ip: &str,
    status: DownloadStatus,
) {
    let label = platform.map_or("unknown", |p| p.as_str());
    metrics::record_download(label, status.as_str());

    let version = match platform {
        Some(platform) => match state.metadata.get_release(platform).await {
            Ok(release) => release.version.to_string(),
            Err(e) => {
                tracing::warn!(%platform, error = %e, "failed to read release for download log");
                "unknown".to_string()
            }
        },
        None => "unknown".to_string(),
    };
    let entry = DownloadLogEntry::new(
        requested,
        filename,
        version,
        ip,
        status,
        OffsetDateTime::now_utc(),
    );
    if let Err(e) = state.metadata.record_download(&entry).await {
        tracing::warn!(platform = %requested, file = %filename, error = %e, "failed to record download");
    }
}

/// GET /api/download/{platform} - Stream the primary file of the current
/// release.
pub async fn download_latest(
    State(state): State<AppState>,
    Path(platform): Path<String>,
) -> ApiResult<Response> {
    let platform = parse_platform(&platform)?;
    let release = state.metadata.get_release(platform).await?;
    let primary = release.primary_file().ok_or_else(|| {
        ApiError::NotFound(format!("no downloadable files for platform {platform}"))
    })?;

    let key = artifact_key(platform, &primary.name)?;
    let response = stream_artifact(&state, &key, &primary.name).await?;

    if let Err(e) = record_activity(
        &state,
        ActivityKind::Download,
        format!("downloaded {platform} v{}", release.version),
    )
    .await
    {
        tracing::warn!(%platform, error = %e, "failed to record download activity");
    }
    metrics::record_download(platform.as_str(), DownloadStatus::Success.as_str());

    Ok(response)
}
