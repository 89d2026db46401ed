//! Shared handler helpers.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HOST};
use axum::http::{Extensions, HeaderMap, StatusCode};
use axum::response::Response;
use perch_core::config::ServerConfig;
use perch_core::{ActivityEntry, ActivityKind, Platform};
use serde::Serialize;
use std::net::SocketAddr;
use time::OffsetDateTime;

/// Plain `{message}` acknowledgement.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Parse a platform path segment.
pub fn parse_platform(raw: &str) -> ApiResult<Platform> {
    Ok(Platform::parse(raw)?)
}

/// Record an administrative event in the activity log.
pub async fn record_activity(
    state: &AppState,
    kind: ActivityKind,
    title: impl Into<String>,
) -> ApiResult<()> {
    let entry = ActivityEntry::new(kind, title, OffsetDateTime::now_utc());
    state.metadata.record_activity(&entry).await?;
    Ok(())
}

/// Origin (`scheme://host`) the client used to reach this server.
///
/// Uses the `Host` header and `X-Forwarded-Proto` when present, else the
/// configured public host and port. The scheme defaults to the one the
/// listener serves.
pub fn request_origin(headers: &HeaderMap, config: &ServerConfig) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(config.scheme());

    match headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        Some(host) => format!("{scheme}://{host}"),
        None => format!("{scheme}://{}:{}", config.public_host, config.port),
    }
}

/// Client IP from the connection info, or `"unknown"` when the server was not
/// started with connect info (as in router-level tests).
pub fn client_ip(extensions: &Extensions) -> String {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Stream a stored artifact as an attachment.
pub async fn stream_artifact(state: &AppState, key: &str, file_name: &str) -> ApiResult<Response> {
    let meta = match state.storage.head(key).await {
        Ok(meta) => meta,
        Err(e) if e.is_not_found() => {
            return Err(ApiError::NotFound(format!("file not found: {file_name}")));
        }
        Err(e) => return Err(e.into()),
    };
    let stream = state.storage.get_stream(key).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/octet-stream")
        .header(CONTENT_LENGTH, meta.size)
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name.replace('"', "")),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Internal(format!("failed to build response: {e}")))
}
