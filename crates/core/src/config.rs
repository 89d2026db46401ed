//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    /// Listening port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Host name advertised to clients.
    #[serde(default = "default_public_host")]
    pub public_host: String,
    /// Maximum upload request size in MiB.
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
    /// HTTPS listener settings.
    #[serde(default)]
    pub tls: TlsConfig,
}

/// HTTPS listener settings.
///
/// HTTPS is served only when enabled and both PEM paths are set.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,
    /// PEM certificate chain.
    #[serde(default)]
    pub cert_path: Option<PathBuf>,
    /// PEM private key.
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

impl TlsConfig {
    /// Certificate and key paths, if HTTPS should be served.
    pub fn pem_paths(&self) -> Option<(&Path, &Path)> {
        if !self.enabled {
            return None;
        }
        Some((self.cert_path.as_deref()?, self.key_path.as_deref()?))
    }
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_public_host() -> String {
    "localhost".to_string()
}

fn default_max_file_size_mb() -> u64 {
    500
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            port: default_port(),
            public_host: default_public_host(),
            max_file_size_mb: default_max_file_size_mb(),
            metrics_enabled: default_metrics_enabled(),
            tls: TlsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Socket address string to bind, e.g. `0.0.0.0:3000`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    /// URL scheme the listener serves.
    pub fn scheme(&self) -> &'static str {
        if self.tls.pem_paths().is_some() {
            "https"
        } else {
            "http"
        }
    }

    /// Maximum upload request size in bytes (saturating).
    pub fn max_upload_bytes(&self) -> usize {
        let bytes = self.max_file_size_mb.saturating_mul(1024 * 1024);
        usize::try_from(bytes).unwrap_or(usize::MAX)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("server.port must be non-zero".to_string());
        }
        if self.max_file_size_mb == 0 {
            return Err("server.max_file_size_mb must be at least 1".to_string());
        }
        if self.public_host.trim().is_empty() {
            return Err("server.public_host must not be empty".to_string());
        }
        Ok(())
    }
}

/// Artifact storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory; artifacts live under `<path>/<platform>/`.
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/releases"),
        }
    }
}

/// Metadata (JSON document) store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Directory holding the release table, history and logs.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Maximum history entries retained.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Maximum download log entries retained.
    #[serde(default = "default_download_log_limit")]
    pub download_log_limit: usize,
    /// Maximum structured activity entries retained.
    #[serde(default = "default_activity_limit")]
    pub activity_limit: usize,
    /// Deployment settings file (`KEY=value` lines). Relative paths are
    /// resolved against `data_dir`.
    #[serde(default = "default_settings_file")]
    pub settings_file: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_history_limit() -> usize {
    crate::DEFAULT_HISTORY_LIMIT
}

fn default_download_log_limit() -> usize {
    crate::DEFAULT_DOWNLOAD_LOG_LIMIT
}

fn default_activity_limit() -> usize {
    crate::DEFAULT_ACTIVITY_LIMIT
}

fn default_settings_file() -> PathBuf {
    PathBuf::from("settings.env")
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            history_limit: default_history_limit(),
            download_log_limit: default_download_log_limit(),
            activity_limit: default_activity_limit(),
            settings_file: default_settings_file(),
        }
    }
}

impl MetadataConfig {
    /// Full path of the settings file.
    pub fn settings_path(&self) -> PathBuf {
        if self.settings_file.is_absolute() {
            self.settings_file.clone()
        } else {
            self.data_dir.join(&self.settings_file)
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.history_limit == 0 || self.download_log_limit == 0 || self.activity_limit == 0 {
            return Err("metadata log limits must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Update manifest configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Deployment-wide base URL for artifact downloads (e.g., a CDN).
    #[serde(default)]
    pub custom_download_url: Option<String>,
}

impl UpdateConfig {
    /// The base URL, if set and non-empty.
    pub fn download_base(&self) -> Option<&str> {
        self.custom_download_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter level when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub update: UpdateConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Create a test configuration rooted at `dir`.
    ///
    /// **For testing only.** Storage and metadata both live under `dir` and
    /// metrics are disabled.
    pub fn for_testing(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            server: ServerConfig {
                metrics_enabled: false,
                ..ServerConfig::default()
            },
            storage: StorageConfig::Filesystem {
                path: dir.join("releases"),
            },
            metadata: MetadataConfig {
                data_dir: dir,
                ..MetadataConfig::default()
            },
            update: UpdateConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.metadata.validate()?;
        Ok(())
    }

    /// Effective values of every deployment setting, keyed by setting name.
    pub fn settings_view(&self) -> BTreeMap<&'static str, SettingValue> {
        SettingKey::ALL
            .into_iter()
            .map(|key| {
                let value = match key {
                    SettingKey::Port => SettingValue::Int(u64::from(self.server.port)),
                    SettingKey::ServerHost => SettingValue::Text(self.server.public_host.clone()),
                    SettingKey::CustomDownloadUrl => SettingValue::Text(
                        self.update.custom_download_url.clone().unwrap_or_default(),
                    ),
                    SettingKey::MaxFileSize => SettingValue::Int(self.server.max_file_size_mb),
                    SettingKey::LogLevel => SettingValue::Text(self.logging.level.clone()),
                };
                (key.as_str(), value)
            })
            .collect()
    }
}

/// A deployment setting persisted in the settings file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SettingKey {
    Port,
    ServerHost,
    CustomDownloadUrl,
    MaxFileSize,
    LogLevel,
}

impl SettingKey {
    pub const ALL: [SettingKey; 5] = [
        SettingKey::Port,
        SettingKey::ServerHost,
        SettingKey::CustomDownloadUrl,
        SettingKey::MaxFileSize,
        SettingKey::LogLevel,
    ];

    /// Parse a settings-file key (`PORT`, `SERVER_HOST`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PORT" => Some(Self::Port),
            "SERVER_HOST" => Some(Self::ServerHost),
            "CUSTOM_DOWNLOAD_URL" => Some(Self::CustomDownloadUrl),
            "MAX_FILE_SIZE" => Some(Self::MaxFileSize),
            "LOG_LEVEL" => Some(Self::LogLevel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Port => "PORT",
            Self::ServerHost => "SERVER_HOST",
            Self::CustomDownloadUrl => "CUSTOM_DOWNLOAD_URL",
            Self::MaxFileSize => "MAX_FILE_SIZE",
            Self::LogLevel => "LOG_LEVEL",
        }
    }

    /// Dotted path of the [`AppConfig`] field this setting controls.
    pub fn config_path(&self) -> &'static str {
        match self {
            Self::Port => "server.port",
            Self::ServerHost => "server.public_host",
            Self::CustomDownloadUrl => "update.custom_download_url",
            Self::MaxFileSize => "server.max_file_size_mb",
            Self::LogLevel => "logging.level",
        }
    }

    /// Parse and validate a raw value for this setting.
    pub fn parse_value(&self, raw: &str) -> Result<SettingValue, String> {
        let raw = raw.trim();
        match self {
            Self::Port => raw
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .map(|p| SettingValue::Int(u64::from(p)))
                .ok_or_else(|| format!("{} must be a port number, got {raw:?}", self.as_str())),
            Self::MaxFileSize => raw
                .parse::<u64>()
                .ok()
                .filter(|n| *n != 0)
                .map(SettingValue::Int)
                .ok_or_else(|| {
                    format!("{} must be a positive number of MiB, got {raw:?}", self.as_str())
                }),
            Self::ServerHost | Self::LogLevel if raw.is_empty() => {
                Err(format!("{} must not be empty", self.as_str()))
            }
            Self::ServerHost | Self::CustomDownloadUrl | Self::LogLevel => {
                if raw.contains(['\n', '\r']) {
                    Err(format!("{} must be a single line", self.as_str()))
                } else {
                    Ok(SettingValue::Text(raw.to_string()))
                }
            }
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed deployment setting value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Int(u64),
    Text(String),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.max_upload_bytes(), 500 * 1024 * 1024);
        assert!(config.metrics_enabled);
    }

    #[test]
    fn test_app_config_deserialize_partial() {
        let json = r#"{
            "server": {"port": 8080},
            "storage": {"type": "filesystem", "path": "/srv/releases"},
            "update": {"custom_download_url": "https://cdn.example.com"}
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.public_host, "localhost");
        assert_eq!(config.metadata.history_limit, 200);
        assert_eq!(config.metadata.download_log_limit, 500);
        assert_eq!(config.metadata.activity_limit, 100);
        assert_eq!(config.update.download_base(), Some("https://cdn.example.com"));
        let StorageConfig::Filesystem { path } = &config.storage;
        assert_eq!(path, &PathBuf::from("/srv/releases"));
    }

    #[test]
    fn test_tls_needs_both_pem_paths() {
        let mut config: ServerConfig =
            serde_json::from_str(r#"{"tls": {"enabled": true, "cert_path": "/etc/perch/cert.pem"}}"#)
                .unwrap();
        assert!(config.tls.pem_paths().is_none());
        assert_eq!(config.scheme(), "http");

        config.tls.key_path = Some(PathBuf::from("/etc/perch/key.pem"));
        assert_eq!(
            config.tls.pem_paths(),
            Some((Path::new("/etc/perch/cert.pem"), Path::new("/etc/perch/key.pem")))
        );
        assert_eq!(config.scheme(), "https");

        config.tls.enabled = false;
        assert_eq!(config.scheme(), "http");
    }

    #[test]
    fn test_blank_download_base_is_unset() {
        let config = UpdateConfig {
            custom_download_url: Some("  ".to_string()),
        };
        assert_eq!(config.download_base(), None);
    }

    #[test]
    fn test_settings_path_resolution() {
        let mut config = MetadataConfig {
            data_dir: PathBuf::from("/var/lib/perch"),
            ..MetadataConfig::default()
        };
        assert_eq!(
            config.settings_path(),
            PathBuf::from("/var/lib/perch/settings.env")
        );
        config.settings_file = PathBuf::from("/etc/perch/settings.env");
        assert_eq!(
            config.settings_path(),
            PathBuf::from("/etc/perch/settings.env")
        );
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = AppConfig::for_testing("/tmp/perch");
        assert!(config.validate().is_ok());
        config.metadata.history_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_setting_keys_roundtrip() {
        for key in SettingKey::ALL {
            assert_eq!(SettingKey::parse(key.as_str()), Some(key));
        }
        assert_eq!(SettingKey::parse("API_KEY"), None);
        assert_eq!(SettingKey::parse("port"), None);
    }

    #[test]
    fn test_setting_value_validation() {
        assert_eq!(
            SettingKey::Port.parse_value(" 8080 ").unwrap(),
            SettingValue::Int(8080)
        );
        assert!(SettingKey::Port.parse_value("70000").is_err());
        assert!(SettingKey::Port.parse_value("0").is_err());
        assert!(SettingKey::MaxFileSize.parse_value("-1").is_err());
        assert!(SettingKey::LogLevel.parse_value("").is_err());
        assert_eq!(
            SettingKey::CustomDownloadUrl.parse_value("").unwrap(),
            SettingValue::Text(String::new())
        );
        assert!(
            SettingKey::ServerHost
                .parse_value("a\nPORT=1")
                .is_err()
        );
    }

    #[test]
    fn test_settings_view_reports_effective_values() {
        let mut config = AppConfig::for_testing("/tmp/perch");
        config.server.port = 4000;
        config.update.custom_download_url = Some("https://cdn.example.com".to_string());
        let view = config.settings_view();
        assert_eq!(view["PORT"], SettingValue::Int(4000));
        assert_eq!(view["SERVER_HOST"], SettingValue::Text("localhost".to_string()));
        assert_eq!(
            view["CUSTOM_DOWNLOAD_URL"],
            SettingValue::Text("https://cdn.example.com".to_string())
        );
        assert_eq!(view["MAX_FILE_SIZE"], SettingValue::Int(500));
        assert_eq!(view["LOG_LEVEL"], SettingValue::Text("info".to_string()));
    }
}
