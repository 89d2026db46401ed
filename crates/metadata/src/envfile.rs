//! `KEY=value` settings files.

use crate::error::{MetadataError, MetadataResult};
use perch_core::config::{SettingKey, SettingValue};
use std::collections::BTreeMap;
use std::path::Path;

/// Parse settings text into key/value pairs.
///
/// Follows `.env` syntax: comments, `export ` prefixes and quoted values are
/// understood, and later assignments win. A malformed line fails the whole
/// file.
pub fn parse(text: &str) -> MetadataResult<BTreeMap<String, String>> {
    let mut settings = BTreeMap::new();
    for item in dotenvy::from_read_iter(text.as_bytes()) {
        let (key, value) = item.map_err(|e| {
            MetadataError::InvalidSetting(format!("malformed settings file: {e}"))
        })?;
        settings.insert(key, value);
    }
    Ok(settings)
}

/// Apply updates to settings text.
///
/// Each key replaces the first line assigning it; keys with no existing line
/// are appended. Other lines, including comments, are kept as they are.
pub fn apply(text: &str, updates: &[(SettingKey, SettingValue)]) -> String {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();

    for (key, value) in updates {
        let assignment = format!("{}={}", key.as_str(), quote(&value.to_string()));
        let prefix = format!("{}=", key.as_str());
        let existing = lines.iter().position(|line| {
            let line = line.trim_start();
            let line = line.strip_prefix("export ").unwrap_or(line);
            line.starts_with(&prefix)
        });
        match existing {
            Some(idx) => lines[idx] = assignment,
            None => lines.push(assignment),
        }
    }

    let body = lines.join("\n");
    let body = body.trim();
    if body.is_empty() {
        String::new()
    } else {
        format!("{body}\n")
    }
}

/// Quote a value when `.env` parsing would otherwise alter it.
fn quote(value: &str) -> String {
    let plain = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_.:/@+%".contains(c));
    if plain {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Load a settings file; a missing file yields no settings.
pub async fn load(path: &Path) -> MetadataResult<BTreeMap<String, String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => parse(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(MetadataError::Io(e)),
    }
}

/// Validate raw settings against the known keys.
///
/// Unknown keys are returned separately so callers can warn about them.
pub fn typed(
    raw: &BTreeMap<String, String>,
) -> MetadataResult<(Vec<(SettingKey, SettingValue)>, Vec<String>)> {
    let mut known = Vec::new();
    let mut unknown = Vec::new();
    for (key, value) in raw {
        match SettingKey::parse(key) {
            Some(setting) => {
                let value = setting
                    .parse_value(value)
                    .map_err(MetadataError::InvalidSetting)?;
                known.push((setting, value));
            }
            None => unknown.push(key.clone()),
        }
    }
    Ok((known, unknown))
}
