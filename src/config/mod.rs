//! Process configuration.
//!
//! Engine knobs live in [`DeduplicationConfig`]; this module adds the
//! surrounding process settings (store location, logging, metrics) and loads
//! them from a TOML file.
//!
//! ```toml
//! [dedup]
//! near_duplicate_threshold = 0.8
//! shingle_size = 3
//! compare_scope = "both"
//!
//! [store]
//! path = "/var/lib/regdedup/store.json"
//!
//! [store.breaker]
//! failure_threshold = 5
//! reset_timeout_ms = 30000
//!
//! [logging]
//! format = "json"
//! level = "info"
//!
//! [metrics]
//! enabled = true
//! port = 9090
//! ```

use crate::services::deduplication::DeduplicationConfig;
use crate::storage::StoreResilienceConfig;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File name of the JSON store when no path is configured.
const DEFAULT_STORE_FILE: &str = "store.json";

/// Main configuration for the regdedup process.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Deduplication engine knobs.
    pub dedup: DeduplicationConfig,
    /// Knowledge store settings.
    pub store: StoreSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Metrics settings.
    pub metrics: MetricsSettings,
}

/// Knowledge store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Path of the JSON store document.
    pub path: PathBuf,
    /// Circuit breaker wrapped around the store.
    pub breaker: StoreResilienceConfig,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            breaker: StoreResilienceConfig::default(),
        }
    }
}

/// Logging settings from the config file.
///
/// Unset fields fall back to environment variables and then built-in
/// defaults when observability is initialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoggingSettings {
    /// Output format: `pretty` or `json`.
    pub format: Option<String>,
    /// Filter directive such as `info` or `regdedup=debug`.
    pub level: Option<String>,
    /// Optional log file; logs go to stderr when unset.
    pub file: Option<PathBuf>,
}

/// Metrics settings from the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MetricsSettings {
    /// Whether the Prometheus recorder is installed.
    pub enabled: Option<bool>,
    /// Port for the Prometheus scrape endpoint.
    pub port: Option<u16>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Engine knobs; missing keys keep their defaults.
    pub dedup: Option<DeduplicationConfig>,
    /// Store section.
    pub store: Option<ConfigFileStore>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
    /// Metrics section.
    pub metrics: Option<MetricsSettings>,
}

/// Store section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileStore {
    /// Store document path.
    pub path: Option<String>,
    /// Circuit breaker settings.
    pub breaker: Option<StoreResilienceConfig>,
}

impl AppConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the file cannot be read or parsed,
    /// and [`Error::InvalidConfig`] if the `[dedup]` section is out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the text is not valid TOML for
    /// this schema, and [`Error::InvalidConfig`] for out-of-range knobs.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/regdedup/` on macOS)
    /// 2. XDG config dir (`~/.config/regdedup/` for Unix compatibility)
    ///
    /// Returns default configuration if no usable config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join("regdedup").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("regdedup")
                .join("config.toml"),
        ];

        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unusable config file");
                },
            }
        }

        Self::default()
    }

    /// Applies environment variable overrides to every section.
    ///
    /// `REGDEDUP_STORE_PATH` replaces the store path; engine and breaker
    /// overrides are delegated to their own configs.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        self.dedup = self.dedup.with_env_overrides();
        self.store.breaker = self.store.breaker.with_env_overrides();
        if let Ok(path) = std::env::var("REGDEDUP_STORE_PATH")
            && !path.trim().is_empty()
        {
            self.store.path = PathBuf::from(path);
        }
        self
    }

    /// Sets the store document path.
    #[must_use]
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store.path = path.into();
        self
    }

    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dedup) = file.dedup {
            dedup.validate()?;
            config.dedup = dedup;
        }
        if let Some(store) = file.store {
            if let Some(path) = store.path {
                config.store.path = PathBuf::from(path);
            }
            if let Some(breaker) = store.breaker {
                config.store.breaker = breaker;
            }
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }
        if let Some(metrics) = file.metrics {
            config.metrics = metrics;
        }

        Ok(config)
    }
}

/// Default store location: `<data_dir>/regdedup/store.json`, or the working
/// directory when no home directory is known.
fn default_store_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(DEFAULT_STORE_FILE),
        |dirs| dirs.data_dir().join("regdedup").join(DEFAULT_STORE_FILE),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::deduplication::CompareScope;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.dedup, DeduplicationConfig::default());
        assert_eq!(config.store.breaker, StoreResilienceConfig::default());
        assert!(config.logging.format.is_none());
        assert!(config.metrics.enabled.is_none());
    }

    #[test]
    fn test_partial_sections_merge() {
        let config = AppConfig::from_toml(
            r#"
            [dedup]
            near_duplicate_threshold = 0.85
            compare_scope = "against_store"

            [store]
            path = "/tmp/kb.json"

            [store.breaker]
            failure_threshold = 2

            [logging]
            format = "json"

            [metrics]
            enabled = true
            port = 9100
            "#,
        )
        .unwrap();

        assert!((config.dedup.near_duplicate_threshold - 0.85).abs() < f64::EPSILON);
        assert_eq!(config.dedup.shingle_size, 3);
        assert_eq!(config.dedup.compare_scope, CompareScope::AgainstStore);
        assert_eq!(config.store.path, PathBuf::from("/tmp/kb.json"));
        assert_eq!(config.store.breaker.failure_threshold, 2);
        assert_eq!(config.store.breaker.reset_timeout_ms, 30_000);
        assert_eq!(config.logging.format.as_deref(), Some("json"));
        assert_eq!(config.metrics.enabled, Some(true));
        assert_eq!(config.metrics.port, Some(9100));
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let err = AppConfig::from_toml("[dedup]\nnear_duplicate_threshold = 1.5\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = AppConfig::from_toml("[dedup\nshingle_size = ").unwrap_err();
        assert!(matches!(err, Error::OperationFailed { ref operation, .. } if operation == "parse_config_file"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[dedup]\nshingle_size = 5").unwrap();

        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.dedup.shingle_size, 5);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::OperationFailed { ref operation, .. } if operation == "read_config_file"));
    }

    #[test]
    fn test_with_store_path() {
        let config = AppConfig::new().with_store_path("kb.json");
        assert_eq!(config.store.path, PathBuf::from("kb.json"));
    }
}
