//! Update manifest endpoints queried by desktop clients.

use crate::error::ApiResult;
use crate::handlers::common::{parse_platform, request_origin};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_TYPE, USER_AGENT};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use perch_core::manifest::{render_latest_yml, resolve_update};
use perch_core::{Platform, UpdateCheck};
use serde::Deserialize;

/// GET /update/{platform}/{version} - Check for a newer release.
///
/// Answers `204 No Content` when the client is current, otherwise the JSON
/// manifest of the newer release.
pub async fn check_update(
    State(state): State<AppState>,
    Path((platform, client_version)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let platform = parse_platform(&platform)?;
    let release = state.metadata.get_release(platform).await?;
    let origin = request_origin(&headers, &state.config.server);

    let check = resolve_update(
        platform,
        &release,
        &client_version,
        state.download_base(),
        &origin,
    );

    match check {
        Ok(UpdateCheck::NoUpdate) => {
            metrics::record_update_check(platform.as_str(), "no_update");
            tracing::debug!(%platform, client_version = %client_version, "client is up to date");
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        Ok(UpdateCheck::Available(manifest)) => {
            metrics::record_update_check(platform.as_str(), "available");
            tracing::info!(
                %platform,
                client_version = %client_version,
                version = %manifest.version,
                "update available"
            );
            Ok(Json(manifest).into_response())
        }
        Err(e) => {
            metrics::record_update_check(platform.as_str(), "error");
            Err(e.into())
        }
    }
}

/// Query parameters for `latest.yml`.
#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    pub platform: Option<String>,
}

/// GET /latest.yml - Aggregate manifest for auto-updaters.
///
/// The platform comes from `?platform=`, else it is inferred from the
/// `User-Agent` header.
pub async fn latest_yml(
    State(state): State<AppState>,
    Query(query): Query<LatestQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let platform = match query.platform.as_deref().filter(|p| !p.is_empty()) {
        Some(raw) => parse_platform(raw)?,
        None => {
            let user_agent = headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            Platform::from_user_agent(user_agent)
        }
    };

    let release = state.metadata.get_release(platform).await?;
    let document = render_latest_yml(platform, &release, state.download_base())?;
    metrics::record_update_check(platform.as_str(), "latest_yml");

    Ok(([(CONTENT_TYPE, "text/yaml; charset=utf-8")], document).into_response())
}
