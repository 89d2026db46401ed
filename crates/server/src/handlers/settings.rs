//! Deployment settings endpoints.

use crate::error::{ApiError, ApiResult};
use crate::handlers::common::record_activity;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use perch_core::ActivityKind;
use perch_core::config::{SettingKey, SettingValue};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// GET /api/config - Effective values of the deployment settings.
pub async fn get_config(
    State(state): State<AppState>,
) -> Json<BTreeMap<&'static str, SettingValue>> {
    Json(state.config.settings_view())
}

/// Response after saving settings.
#[derive(Debug, Serialize)]
pub struct SaveConfigResponse {
    pub message: String,
    /// Keys written to the settings file.
    pub updated: Vec<&'static str>,
}

/// POST /api/config - Persist deployment settings.
///
/// The body is a JSON object of `KEY: value` pairs. Every key must be a known
/// setting with a valid value or nothing is written. Saved values apply the
/// next time the server starts.
#[tracing::instrument(skip(state, body))]
pub async fn update_config(
    State(state): State<AppState>,
    body: Result<Json<BTreeMap<String, Value>>, JsonRejection>,
) -> ApiResult<Json<SaveConfigResponse>> {
    let Json(body) = body?;
    let updates = typed_settings(&body)?;
    if updates.is_empty() {
        return Err(ApiError::BadRequest("no settings provided".to_string()));
    }

    state.metadata.write_settings(&updates).await?;
    let updated: Vec<&'static str> = updates.iter().map(|(key, _)| key.as_str()).collect();
    record_activity(
        &state,
        ActivityKind::Config,
        format!("updated server settings: {}", updated.join(", ")),
    )
    .await?;

    tracing::info!(keys = ?updated, "settings saved");
    Ok(Json(SaveConfigResponse {
        message: "settings saved; restart the server to apply them".to_string(),
        updated,
    }))
}

fn typed_settings(body: &BTreeMap<String, Value>) -> ApiResult<Vec<(SettingKey, SettingValue)>> {
    let mut updates = Vec::with_capacity(body.len());
    for (raw_key, raw_value) in body {
        let key = SettingKey::parse(raw_key)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown setting: {raw_key}")))?;
        let raw = match raw_value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Null => String::new(),
            other => {
                return Err(ApiError::BadRequest(format!(
                    "{raw_key} must be a string or number, got {other}"
                )));
            }
        };
        let value = key.parse_value(&raw).map_err(ApiError::BadRequest)?;
        updates.push((key, value));
    }
    Ok(updates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> BTreeMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_typed_settings_accepts_strings_and_numbers() {
        let updates = typed_settings(&body(json!({
            "PORT": 8080,
            "LOG_LEVEL": "debug",
            "CUSTOM_DOWNLOAD_URL": null,
        })))
        .unwrap();
        assert_eq!(
            updates,
            vec![
                (
                    SettingKey::CustomDownloadUrl,
                    SettingValue::Text(String::new())
                ),
                (SettingKey::LogLevel, SettingValue::Text("debug".to_string())),
                (SettingKey::Port, SettingValue::Int(8080)),
            ]
        );
    }

    #[test]
    fn test_typed_settings_rejects_unknown_and_invalid() {
        assert!(typed_settings(&body(json!({"API_KEY": "secret"}))).is_err());
        assert!(typed_settings(&body(json!({"PORT": "eighty"}))).is_err());
        assert!(typed_settings(&body(json!({"MAX_FILE_SIZE": [1]}))).is_err());
    }
}
