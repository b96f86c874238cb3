//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name; anything other than `json` is pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Event filter.
    pub filter: EnvFilter,
    /// Optional log file; stderr when unset.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds logging configuration from environment variables.
    #[must_use]
    pub fn from_env(verbose: bool) -> Self {
        Self::from_settings(None, verbose)
    }

    /// Builds logging configuration from config settings with env overrides.
    ///
    /// Filter precedence: `REGDEDUP_LOG`, `RUST_LOG`, the config `level`,
    /// then `debug` when verbose or `info` otherwise.
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        let format = std::env::var("REGDEDUP_LOG_FORMAT")
            .ok()
            .or_else(|| settings.and_then(|s| s.format.clone()))
            .map_or_else(LogFormat::default, |f| LogFormat::parse(&f));

        let file = std::env::var("REGDEDUP_LOG_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| settings.and_then(|s| s.file.clone()));

        let directive = std::env::var("REGDEDUP_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok()
            .or_else(|| settings.and_then(|s| s.level.clone()))
            .unwrap_or_else(|| default_level(verbose).to_string());

        let filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
            tracing::warn!(directive = %directive, error = %e, "Invalid log filter, using default");
            EnvFilter::new(default_level(verbose))
        });

        Self {
            format,
            filter,
            file,
        }
    }
}

const fn default_level(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("json", LogFormat::Json; "json")]
    #[test_case("JSON", LogFormat::Json; "uppercase json")]
    #[test_case("pretty", LogFormat::Pretty; "pretty")]
    #[test_case("text", LogFormat::Pretty; "unknown falls back")]
    fn test_log_format_parse(input: &str, expected: LogFormat) {
        assert_eq!(LogFormat::parse(input), expected);
    }

    #[test]
    fn test_default_level() {
        assert_eq!(default_level(true), "debug");
        assert_eq!(default_level(false), "info");
    }
}
