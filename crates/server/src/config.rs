//! Configuration loading for the server binary.
//!
//! Sources, lowest priority first:
//! 1. the TOML file (optional)
//! 2. the deployment settings file written by `POST /api/config`
//! 3. `PERCH_`-prefixed environment variables, `__` separating nested keys

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use perch_core::config::{AppConfig, SettingKey, SettingValue};
use perch_metadata::envfile;
use std::path::Path;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "PERCH_";

/// A loaded configuration and what was skipped while loading it.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: AppConfig,
    /// Keys in the settings file that are not deployment settings.
    pub ignored_settings: Vec<String>,
}

/// Build the layered figment for a config file and a set of deployment
/// settings.
pub fn layered(config_path: &Path, settings: &[(SettingKey, SettingValue)]) -> Figment {
    let mut figment = Figment::new();
    if config_path.exists() {
        figment = figment.merge(Toml::file(config_path));
    }
    for (key, value) in settings {
        figment = figment.merge(Serialized::default(key.config_path(), value));
    }
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load the configuration.
///
/// The settings file location is itself configurable, so the file and
/// environment are read once to find it and again with its values layered in.
pub async fn load_config(config_path: &Path) -> Result<LoadedConfig> {
    let base: AppConfig = layered(config_path, &[])
        .extract()
        .context("failed to load configuration")?;

    let settings_path = base.metadata.settings_path();
    let raw = envfile::load(&settings_path)
        .await
        .with_context(|| format!("failed to read settings file {}", settings_path.display()))?;
    let (settings, ignored_settings) = envfile::typed(&raw)
        .with_context(|| format!("invalid settings file {}", settings_path.display()))?;

    let config: AppConfig = layered(config_path, &settings)
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    Ok(LoadedConfig {
        config,
        ignored_settings,
    })
}
