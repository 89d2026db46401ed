//! Release management: version table, uploads and file removal.

use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{MessageResponse, parse_platform, record_activity};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use perch_core::release::{sanitize_file_name, versioned_file_name};
use perch_core::{
    ActivityKind, HistoryEntry, Platform, Release, ReleaseFile, ReleaseTable, ReleaseVersion,
};
use perch_metadata::MetadataError;
use perch_storage::{artifact_key, checksum_object, staging_key};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use time::OffsetDateTime;

/// GET /versions, /api/versions - The current release of every platform.
pub async fn list_versions(State(state): State<AppState>) -> ApiResult<Json<ReleaseTable>> {
    Ok(Json(state.metadata.get_releases().await?))
}

/// Request to set a platform's version directly.
#[derive(Debug, Deserialize)]
pub struct SetVersionRequest {
    pub platform: Option<String>,
    pub version: Option<String>,
}

/// Response after setting a version.
#[derive(Debug, Serialize)]
pub struct SetVersionResponse {
    pub message: String,
    pub platform: Platform,
    pub version: ReleaseVersion,
}

/// POST /versions, /api/versions - Set a platform's version without
/// changing its files.
#[tracing::instrument(skip(state))]
pub async fn set_version(
    State(state): State<AppState>,
    body: Result<Json<SetVersionRequest>, JsonRejection>,
) -> ApiResult<Json<SetVersionResponse>> {
    let Json(req) = body?;
    let (Some(platform), Some(version)) = (
        non_empty(req.platform.as_deref()),
        non_empty(req.version.as_deref()),
    ) else {
        return Err(ApiError::BadRequest(
            "platform and version are required".to_string(),
        ));
    };
    let platform = parse_platform(platform)?;
    let version = ReleaseVersion::parse(version)?;

    let _guard = state.platform_locks.lock(platform).await;
    let release = state
        .metadata
        .set_release_version(platform, version, OffsetDateTime::now_utc())
        .await?;
    record_activity(
        &state,
        ActivityKind::Version,
        format!("set {platform} version to v{}", release.version),
    )
    .await?;

    tracing::info!(%platform, version = %release.version, "version set");
    Ok(Json(SetVersionResponse {
        message: "version updated".to_string(),
        platform,
        version: release.version,
    }))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A file received in an upload, parked under its staging key.
#[derive(Debug)]
struct StagedFile {
    /// Client-supplied base name.
    original: String,
    staging_key: String,
}

/// Fields collected from an upload form.
#[derive(Debug, Default)]
struct UploadForm {
    version: Option<String>,
    download_url: Option<String>,
    custom_urls: Option<BTreeMap<String, String>>,
    files: Vec<StagedFile>,
}

/// Response after a successful upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub platform: Platform,
    pub version: ReleaseVersion,
    pub files: Vec<ReleaseFile>,
    /// The explicit base URL, or `"default"`.
    pub download_url: String,
}

/// POST /upload/{platform}, /api/upload/{platform} - Publish a release.
///
/// Multipart fields:
/// - `version`: semantic version of the release (required)
/// - `files`: one or more artifacts; the first is the primary installer
/// - `downloadUrl` (alias `customUrl`): base URL stored on the release
/// - `customUrls`: JSON object mapping original file names to absolute URLs
///
/// Files are streamed into staging, then renamed to `<stem>-<version><ext>`
/// under the platform while the platform lock is held. Files they replace are
/// set aside first. If checksumming or the release write fails, the renamed
/// files are deleted and the replaced ones put back.
#[tracing::instrument(skip(state, multipart))]
pub async fn upload_release(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let platform = parse_platform(&platform)?;
    let multipart = multipart?;
    let started = Instant::now();

    let mut form = UploadForm::default();
    if let Err(e) = read_upload_form(&state, multipart, &mut form).await {
        metrics::record_upload_error("invalid_form");
        discard_staged(&state, &form.files).await;
        return Err(e);
    }

    let response = match publish(&state, platform, &form).await {
        Ok(response) => response,
        Err(e) => {
            discard_staged(&state, &form.files).await;
            return Err(e);
        }
    };

    metrics::UPLOADS_COMMITTED
        .with_label_values(&[platform.as_str()])
        .inc();
    metrics::BYTES_UPLOADED.inc_by(response.files.iter().map(|f| f.size).sum());
    metrics::UPLOAD_DURATION.observe(started.elapsed().as_secs_f64());

    Ok(Json(response))
}

async fn read_upload_form(
    state: &AppState,
    mut multipart: Multipart,
    form: &mut UploadForm,
) -> ApiResult<()> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" | "files[]" => {
                let original = field.file_name().ok_or_else(|| {
                    ApiError::BadRequest("file field is missing a file name".to_string())
                })?;
                let original = sanitize_file_name(original)?;
                let key = staging_key();
                form.files.push(StagedFile {
                    original,
                    staging_key: key.clone(),
                });

                let mut upload = state.storage.put_stream(&key).await?;
                let written = async {
                    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                        upload.write(chunk).await?;
                    }
                    Ok::<(), ApiError>(())
                }
                .await;
                match written {
                    Ok(()) => {
                        upload.finish().await?;
                    }
                    Err(e) => {
                        if let Err(abort_err) = upload.abort().await {
                            tracing::warn!(key = %key, error = %abort_err, "failed to abort staged upload");
                        }
                        return Err(e);
                    }
                }
            }
            "version" => {
                form.version = Some(field.text().await.map_err(multipart_error)?);
            }
            "downloadUrl" | "customUrl" => {
                let value = field.text().await.map_err(multipart_error)?;
                form.download_url = non_empty(Some(&value)).map(str::to_string);
            }
            "customUrls" => {
                let value = field.text().await.map_err(multipart_error)?;
                form.custom_urls = parse_custom_urls(&value);
            }
            other => {
                tracing::debug!(field = other, "ignoring unknown upload field");
            }
        }
    }
    Ok(())
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::BadRequest(format!("invalid multipart body: {}", e.body_text()))
    }
}

/// Parse the `customUrls` side channel. Anything unparsable is dropped.
fn parse_custom_urls(raw: &str) -> Option<BTreeMap<String, String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str::<BTreeMap<String, String>>(raw) {
        Ok(urls) => Some(urls),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring malformed customUrls");
            None
        }
    }
}

async fn publish(
    state: &AppState,
    platform: Platform,
    form: &UploadForm,
) -> ApiResult<UploadResponse> {
    let version = non_empty(form.version.as_deref())
        .ok_or_else(|| ApiError::BadRequest("version is required".to_string()))?;
    let version = ReleaseVersion::parse(version)?;
    if form.files.is_empty() {
        return Err(ApiError::BadRequest(
            "at least one file is required".to_string(),
        ));
    }

    let mut targets: Vec<(&StagedFile, String, String)> = Vec::with_capacity(form.files.len());
    for staged in &form.files {
        let name = versioned_file_name(&staged.original, &version);
        if targets.iter().any(|(_, existing, _)| *existing == name) {
            return Err(ApiError::BadRequest(format!(
                "duplicate file name in upload: {}",
                staged.original
            )));
        }
        let key = artifact_key(platform, &name)?;
        targets.push((staged, name, key));
    }

    let _guard = state.platform_locks.lock(platform).await;
    let now = OffsetDateTime::now_utc();

    // Objects already at a target key still back the live release; they are
    // parked in staging until the new release is written.
    let mut displaced: Vec<(String, String)> = Vec::new();
    let mut committed: Vec<String> = Vec::with_capacity(targets.len());
    let outcome = async {
        for (_, _, key) in &targets {
            if state.storage.exists(key).await? {
                let parked = staging_key();
                state.storage.rename(key, &parked).await?;
                displaced.push((key.clone(), parked));
            }
        }
        for (staged, _, key) in &targets {
            state.storage.rename(&staged.staging_key, key).await?;
            committed.push(key.clone());
        }

        let mut files = Vec::with_capacity(targets.len());
        for (staged, name, key) in &targets {
            let (checksum, size) = checksum_object(state.storage.as_ref(), key).await?;
            let custom_url = form
                .custom_urls
                .as_ref()
                .and_then(|urls| urls.get(&staged.original))
                .and_then(|url| non_empty(Some(url.as_str())))
                .map(str::to_string);
            files.push(ReleaseFile {
                name: name.clone(),
                size,
                checksum,
                custom_url,
            });
        }

        let release =
            Release::from_upload(version.clone(), files.clone(), form.download_url.clone(), now);
        state.metadata.replace_release(platform, release).await?;
        Ok::<_, ApiError>(files)
    }
    .await;

    let files = match outcome {
        Ok(files) => files,
        Err(e) => {
            metrics::record_upload_error("commit");
            for key in &committed {
                if let Err(delete_err) = state.storage.delete(key).await {
                    tracing::warn!(key = %key, error = %delete_err, "failed to remove committed file");
                }
            }
            for (key, parked) in &displaced {
                if let Err(restore_err) = state.storage.rename(parked, key).await {
                    tracing::error!(key = %key, parked = %parked, error = %restore_err, "failed to restore replaced file");
                }
            }
            return Err(e);
        }
    };
    for (key, parked) in &displaced {
        if let Err(e) = state.storage.delete(parked).await {
            tracing::warn!(key = %key, parked = %parked, error = %e, "failed to remove replaced file");
        }
    }

    let entry = HistoryEntry::record(platform, version.clone(), &files, now);
    state.metadata.append_history(&entry).await?;
    record_activity(
        state,
        ActivityKind::Upload,
        format!("uploaded {platform} v{version} ({} files)", files.len()),
    )
    .await?;

    tracing::info!(
        %platform,
        version = %version,
        files = files.len(),
        download_url = ?form.download_url,
        "release published"
    );

    Ok(UploadResponse {
        message: "files uploaded".to_string(),
        platform,
        version,
        download_url: form
            .download_url
            .clone()
            .unwrap_or_else(|| "default".to_string()),
        files,
    })
}

/// Delete whatever is left in staging for this upload.
async fn discard_staged(state: &AppState, files: &[StagedFile]) {
    for staged in files {
        match state.storage.delete(&staged.staging_key).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                tracing::warn!(key = %staged.staging_key, error = %e, "failed to discard staged file");
            }
        }
    }
}

/// DELETE /api/files/{platform}/{filename} - Remove one artifact.
#[tracing::instrument(skip(state))]
pub async fn delete_file(
    State(state): State<AppState>,
    Path((platform, filename)): Path<(String, String)>,
) -> ApiResult<Json<MessageResponse>> {
    let platform = parse_platform(&platform)?;
    let key = artifact_key(platform, &filename)?;

    let _guard = state.platform_locks.lock(platform).await;
    match state.storage.delete(&key).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            return Err(ApiError::NotFound(format!("file not found: {filename}")));
        }
        Err(e) => return Err(e.into()),
    }

    match state
        .metadata
        .remove_release_file(platform, &filename, OffsetDateTime::now_utc())
        .await
    {
        Ok(_) => {}
        Err(MetadataError::NotFound(_)) => {
            tracing::debug!(%platform, file = %filename, "deleted file was not in the current release");
        }
        Err(e) => return Err(e.into()),
    }

    record_activity(
        &state,
        ActivityKind::Delete,
        format!("deleted file {platform}/{filename}"),
    )
    .await?;

    tracing::info!(%platform, file = %filename, "file deleted");
    Ok(Json(MessageResponse::new("file deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_custom_urls() {
        let urls = parse_custom_urls(r#"{"Setup.exe":"https://cdn.example.com/Setup.exe"}"#)
            .unwrap();
        assert_eq!(urls["Setup.exe"], "https://cdn.example.com/Setup.exe");

        assert!(parse_custom_urls("").is_none());
        assert!(parse_custom_urls("{not json").is_none());
        assert!(parse_custom_urls(r#"["a","b"]"#).is_none());
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  1.2.0 ")), Some("1.2.0"));
        assert_eq!(non_empty(Some("   ")), None);
        assert_eq!(non_empty(None), None);
    }
}
