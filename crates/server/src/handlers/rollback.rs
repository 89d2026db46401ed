//! Rolling a platform back to a release from its history.

use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{parse_platform, record_activity};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use perch_core::{ActivityKind, Platform, Release, ReleaseVersion};
use perch_storage::artifact_key;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Rollback request.
#[derive(Debug, Deserialize)]
pub struct RollbackRequest {
    pub platform: Option<String>,
    pub version: Option<String>,
}

/// Rollback response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackResponse {
    pub message: String,
    pub platform: Platform,
    pub version: ReleaseVersion,
    pub previous_version: ReleaseVersion,
}

/// POST /api/rollback - Make a historical release current again.
///
/// The most recent history entry for the platform and version is restored,
/// but only if every one of its files is still in storage; otherwise nothing
/// changes and the missing files are listed in a 409 response.
#[tracing::instrument(skip(state))]
pub async fn rollback(
    State(state): State<AppState>,
    body: Result<Json<RollbackRequest>, JsonRejection>,
) -> ApiResult<Json<RollbackResponse>> {
    let Json(req) = body?;
    let (Some(platform), Some(version)) = (
        req.platform.as_deref().map(str::trim).filter(|p| !p.is_empty()),
        req.version.as_deref().map(str::trim).filter(|v| !v.is_empty()),
    ) else {
        return Err(ApiError::BadRequest(
            "platform and version are required".to_string(),
        ));
    };
    let platform = parse_platform(platform)?;
    let version = ReleaseVersion::parse(version)?;

    let _guard = state.platform_locks.lock(platform).await;

    let Some(entry) = state.metadata.find_history(platform, &version).await? else {
        metrics::ROLLBACKS.with_label_values(&["not_found"]).inc();
        return Err(ApiError::NotFound(format!(
            "no history entry for {platform} v{version}"
        )));
    };

    let mut missing_files = Vec::new();
    for file in &entry.files {
        let key = artifact_key(platform, &file.filename)?;
        if !state.storage.exists(&key).await? {
            missing_files.push(file.filename.clone());
        }
    }
    if !missing_files.is_empty() {
        metrics::ROLLBACKS.with_label_values(&["missing_files"]).inc();
        tracing::warn!(
            %platform,
            version = %version,
            missing = missing_files.len(),
            "rollback blocked by missing files"
        );
        return Err(ApiError::MissingFiles {
            platform,
            version: version.to_string(),
            missing_files,
        });
    }

    let current = state.metadata.get_release(platform).await?;
    let previous_version = current.version;
    let release = Release::from_history(&entry, previous_version.clone(), OffsetDateTime::now_utc());
    state.metadata.replace_release(platform, release).await?;

    record_activity(
        &state,
        ActivityKind::Rollback,
        format!("rolled back {platform} from v{previous_version} to v{version}"),
    )
    .await?;
    metrics::ROLLBACKS.with_label_values(&["success"]).inc();
    tracing::info!(%platform, from = %previous_version, to = %version, "rolled back");

    Ok(Json(RollbackResponse {
        message: "rollback complete".to_string(),
        platform,
        version: entry.version,
        previous_version,
    }))
}
