//! Service health and discovery endpoints.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use perch_core::Platform;
use serde::Serialize;
use time::OffsetDateTime;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// GET /health - Health check.
///
/// Verifies that the metadata directory and the artifact store are usable.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.metadata.health_check().await?;
    state.storage.health_check().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    }))
}

/// One documented endpoint.
#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

/// Service index response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceIndex {
    pub name: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<EndpointInfo>,
    pub supported_platforms: Vec<Platform>,
    /// Ways to serve artifacts from somewhere other than this server.
    pub custom_download_support: Vec<&'static str>,
}

const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("GET", "/update/{platform}/{version}", "check for an update"),
    ("GET", "/latest.yml", "auto-updater manifest"),
    ("GET", "/download/{platform}/{filename}", "download an artifact"),
    ("POST", "/upload/{platform}", "upload a release (multipart)"),
    ("GET", "/versions", "current release of every platform"),
    ("POST", "/api/rollback", "roll a platform back to a previous release"),
    ("GET", "/api/version-history", "release history"),
    ("GET", "/api/download-logs", "download log"),
    ("GET", "/api/activity", "administrative activity"),
    ("GET", "/api/config", "deployment settings"),
    ("GET", "/health", "health check"),
];

/// GET / - Describe the service.
pub async fn service_index() -> Json<ServiceIndex> {
    Json(ServiceIndex {
        name: "perch",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ENDPOINTS
            .iter()
            .map(|&(method, path, description)| EndpointInfo {
                method,
                path,
                description,
            })
            .collect(),
        supported_platforms: Platform::ALL.to_vec(),
        custom_download_support: vec![
            "deployment setting CUSTOM_DOWNLOAD_URL",
            "downloadUrl field on upload",
            "customUrls field on upload (per file)",
        ],
    })
}
