//! Configuration System
//!
//! Loads connection, write and logging settings from a TOML file, with
//! environment variable overrides on top.

use crate::client::{HttpConfig, Precision};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub write: WriteConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default)]
    pub token: String,

    #[serde(default)]
    pub org: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_url() -> String {
    "http://localhost:8086".to_string()
}

fn default_request_timeout() -> u64 {
    30_000
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            token: String::new(),
            org: String::new(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl ConnectionConfig {
    pub fn http(&self) -> HttpConfig {
        HttpConfig {
            url: self.url.clone(),
            token: self.token.clone(),
            request_timeout_ms: self.request_timeout_ms,
        }
    }
}

/// Write path configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WriteConfig {
    #[serde(default)]
    pub precision: Precision,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            Some(PathBuf::from("./fluxkit.toml")),
            dirs::config_dir().map(|p| p.join("fluxkit").join("config.toml")),
            Some(PathBuf::from("/etc/fluxkit/config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("FLUXKIT_URL") {
            self.connection.url = url;
        }
        if let Some(token) = var("FLUXKIT_TOKEN") {
            self.connection.token = token;
        }
        if let Some(org) = var("FLUXKIT_ORG") {
            self.connection.org = org;
        }
        if let Some(raw) = var("FLUXKIT_PRECISION") {
            match Precision::from_str(&raw) {
                Some(precision) => self.write.precision = precision,
                None => tracing::warn!(
                    "Ignoring invalid FLUXKIT_PRECISION {:?}, expected one of s, ms, us, ns",
                    raw
                ),
            }
        }

        if let Some(level) = var("FLUXKIT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("FLUXKIT_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# fluxkit configuration
#
# Environment variables override these settings:
# - FLUXKIT_URL
# - FLUXKIT_TOKEN
# - FLUXKIT_ORG
# - FLUXKIT_PRECISION
# - FLUXKIT_LOG_LEVEL
# - FLUXKIT_LOG_FORMAT

[connection]
# Server URL
url = "http://localhost:8086"

# API token
token = ""

# Organization that owns the buckets
org = ""

# Request timeout (ms)
request_timeout_ms = 30000

[write]
# Timestamp precision of written points: s, ms, us, ns
precision = "ns"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty or json
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.connection.url, "http://localhost:8086");
        assert_eq!(config.connection.request_timeout_ms, 30_000);
        assert_eq!(config.write.precision, Precision::Ns);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[connection]\nurl = \"http://db:8086\"\norg = \"acme\"\n\n[write]\nprecision = \"ms\""
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.connection.url, "http://db:8086");
        assert_eq!(config.connection.org, "acme");
        assert_eq!(config.connection.token, "");
        assert_eq!(config.write.precision, Precision::Ms);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_generated_config_parses() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(generate_default_config().as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.connection.url, "http://localhost:8086");
        assert_eq!(config.write.precision, Precision::Ns);
    }

    #[test]
    fn test_load_errors() {
        let missing = Config::load(Path::new("/nonexistent/fluxkit.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[write]\nprecision = \"minutes\"").unwrap();
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FLUXKIT_URL", "http://other:8086"),
            ("FLUXKIT_TOKEN", "secret"),
            ("FLUXKIT_ORG", "acme"),
            ("FLUXKIT_PRECISION", "s"),
            ("FLUXKIT_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.connection.url, "http://other:8086");
        assert_eq!(config.connection.token, "secret");
        assert_eq!(config.connection.org, "acme");
        assert_eq!(config.write.precision, Precision::S);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "json");

        let http = config.connection.http();
        assert_eq!(http.url, "http://other:8086");
        assert_eq!(http.token, "secret");
    }

    #[test]
    fn test_invalid_precision_override_keeps_setting() {
        let mut config = Config::default();
        config.write.precision = Precision::Ms;
        config.apply_overrides(|key| (key == "FLUXKIT_PRECISION").then(|| "minutes".to_string()));

        assert_eq!(config.write.precision, Precision::Ms);
    }
}
