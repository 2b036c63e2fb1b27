//! Engine configuration
//!
//! [`QuarryConfig`] is read from the `[quarry]` section of
//! `config/config.toml` and from `QUARRY__*` environment variables, e.g.
//! `QUARRY__LOG_QUERIES=true`. Every field has a default, so a missing file
//! or section simply yields [`QuarryConfig::default()`].

use crate::error::QueryError;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_FILE: &str = "config/config.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuarryConfig {
    /// Log every rendered query at debug level
    #[serde(default)]
    pub log_queries: bool,
    /// Warn when a projection leaves target fields unbound
    #[serde(default = "default_warn_unbound_fields")]
    pub warn_unbound_fields: bool,
    /// Queries slower than this are logged at warn level
    #[serde(default = "default_slow_query_threshold_ms")]
    pub slow_query_threshold_ms: u64,
    /// Page size used by `Select::page_default`
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
}

fn default_warn_unbound_fields() -> bool {
    true
}

fn default_slow_query_threshold_ms() -> u64 {
    500
}

fn default_page_size() -> u64 {
    20
}

impl Default for QuarryConfig {
    fn default() -> Self {
        Self {
            log_queries: false,
            warn_unbound_fields: default_warn_unbound_fields(),
            slow_query_threshold_ms: default_slow_query_threshold_ms(),
            default_page_size: default_page_size(),
        }
    }
}

impl QuarryConfig {
    /// Load from `config/config.toml`, falling back to env vars
    pub fn load() -> Result<Self, QueryError> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix("QUARRY").separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                if std::path::Path::new(CONFIG_FILE).exists() {
                    log::warn!("Failed to load {CONFIG_FILE}, falling back to env: {err}");
                }
                Config::builder()
                    .add_source(Environment::with_prefix("QUARRY").separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file ({err}) and from env \
                             ({env_err})"
                        ))
                    })?
            }
        };
        Ok(Self::from_settings(&settings)?)
    }

    /// Load from a specific TOML file only
    pub fn from_file(path: &str) -> Result<Self, QueryError> {
        let settings = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        Ok(Self::from_settings(&settings)?)
    }

    fn from_settings(settings: &Config) -> Result<Self, ConfigError> {
        match settings.get::<QuarryConfig>("quarry") {
            Ok(cfg) => Ok(cfg),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(ConfigError::Message(format!(
                "Quarry configuration could not be loaded from file or environment: {e}"
            ))),
        }
    }

    pub fn slow_query_threshold(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.slow_query_threshold_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_defaults() {
        let cfg = QuarryConfig::default();
        assert!(!cfg.log_queries);
        assert!(cfg.warn_unbound_fields);
        assert_eq!(cfg.default_page_size, 20);
        assert_eq!(cfg.slow_query_threshold().as_millis(), 500);
    }

    #[test]
    fn test_from_file_partial_section() {
        let path = write_temp(
            "quarry_config_partial.toml",
            "[quarry]\nlog_queries = true\ndefault_page_size = 5\n",
        );
        let cfg = QuarryConfig::from_file(&path).unwrap();
        assert!(cfg.log_queries);
        assert_eq!(cfg.default_page_size, 5);
        assert!(cfg.warn_unbound_fields);
    }

    #[test]
    fn test_from_file_without_section() {
        let path = write_temp("quarry_config_empty.toml", "[other]\nkey = 1\n");
        assert_eq!(QuarryConfig::from_file(&path).unwrap(), QuarryConfig::default());
    }

    #[test]
    fn test_bad_file_reports_config_error() {
        let path = write_temp(
            "quarry_config_invalid.toml",
            "[quarry]\ndefault_page_size = \"many\"\n",
        );
        let err = QuarryConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, QueryError::Config(_)));
        assert!(err.to_string().starts_with("Configuration error"));

        let missing = std::env::temp_dir().join("quarry_config_missing.toml");
        let err = QuarryConfig::from_file(&missing.to_string_lossy()).unwrap_err();
        assert!(matches!(err, QueryError::Config(_)));
    }
}
