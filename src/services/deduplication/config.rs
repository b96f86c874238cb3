//! Deduplication configuration.
//!
//! This module defines the process-wide engine configuration, the patch type
//! accepted by `update_config`, and the validation that guards both.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::fingerprint::DEFAULT_SHINGLE_SIZE;

/// Default near-duplicate threshold.
pub const DEFAULT_NEAR_DUPLICATE_THRESHOLD: f64 = 0.70;

/// Default maximum content size accepted for fingerprinting (1 MiB).
pub const DEFAULT_MAX_CONTENT_BYTES: usize = 1024 * 1024;

/// Which peers a candidate is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareScope {
    /// Only earlier accepted objects of the same batch call.
    #[serde(alias = "withinBatch", alias = "within-batch")]
    WithinBatch,
    /// Only objects already in the store.
    #[serde(alias = "againstStore", alias = "against-store")]
    AgainstStore,
    /// Both the store and earlier accepted batch objects.
    #[default]
    Both,
}

impl CompareScope {
    /// Returns the scope as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WithinBatch => "within_batch",
            Self::AgainstStore => "against_store",
            Self::Both => "both",
        }
    }

    /// Returns true if store objects are peers under this scope.
    #[must_use]
    pub const fn includes_store(&self) -> bool {
        matches!(self, Self::AgainstStore | Self::Both)
    }

    /// Returns true if earlier batch objects are peers under this scope.
    #[must_use]
    pub const fn includes_batch(&self) -> bool {
        matches!(self, Self::WithinBatch | Self::Both)
    }

    /// Parses a scope from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "within_batch" | "withinbatch" | "batch" => Some(Self::WithinBatch),
            "against_store" | "againststore" | "store" => Some(Self::AgainstStore),
            "both" => Some(Self::Both),
            _ => None,
        }
    }
}

impl fmt::Display for CompareScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for the deduplication engine.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `REGDEDUP_NEAR_DUPLICATE_THRESHOLD` | f64 | `0.70` | Jaccard score treated as near duplicate |
/// | `REGDEDUP_SHINGLE_SIZE` | usize | `3` | Token n-gram length |
/// | `REGDEDUP_COMPARE_SCOPE` | enum | `both` | `within_batch`, `against_store`, `both` |
///
/// # Example
///
/// ```rust
/// use regdedup::services::deduplication::{CompareScope, DeduplicationConfig};
///
/// let config = DeduplicationConfig::default();
/// assert_eq!(config.near_duplicate_threshold, 0.70);
/// assert_eq!(config.shingle_size, 3);
/// assert_eq!(config.compare_scope, CompareScope::Both);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct DeduplicationConfig {
    /// Similarity at or above which two objects are near duplicates; in `(0, 1]`.
    pub near_duplicate_threshold: f64,

    /// Token n-gram length; at least 1.
    pub shingle_size: usize,

    /// Which peers are compared.
    pub compare_scope: CompareScope,

    /// Largest content accepted, in bytes.
    ///
    /// Internal tuning: not patchable through `update_config`.
    pub max_content_bytes: usize,
}

impl DeduplicationConfig {
    /// Creates a new configuration from environment variables.
    ///
    /// Unset variables keep their defaults; unparseable or out-of-range values
    /// are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("REGDEDUP_NEAR_DUPLICATE_THRESHOLD") {
            match v.parse::<f64>() {
                Ok(threshold) if validate_threshold(threshold).is_ok() => {
                    self.near_duplicate_threshold = threshold;
                },
                _ => tracing::warn!(value = %v, "Ignoring invalid REGDEDUP_NEAR_DUPLICATE_THRESHOLD"),
            }
        }

        if let Ok(v) = std::env::var("REGDEDUP_SHINGLE_SIZE") {
            match v.parse::<usize>() {
                Ok(size) if size >= 1 => self.shingle_size = size,
                _ => tracing::warn!(value = %v, "Ignoring invalid REGDEDUP_SHINGLE_SIZE"),
            }
        }

        if let Ok(v) = std::env::var("REGDEDUP_COMPARE_SCOPE") {
            match CompareScope::parse(&v) {
                Some(scope) => self.compare_scope = scope,
                None => tracing::warn!(value = %v, "Ignoring invalid REGDEDUP_COMPARE_SCOPE"),
            }
        }

        self
    }

    /// Checks every knob against its valid range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.near_duplicate_threshold)?;
        if self.shingle_size < 1 {
            return Err(Error::InvalidConfig(
                "shingle_size must be at least 1".to_string(),
            ));
        }
        if self.max_content_bytes < 1 {
            return Err(Error::InvalidConfig(
                "max_content_bytes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns a validated copy with `patch` applied; `self` is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the patched configuration is invalid.
    pub fn patched(&self, patch: &ConfigPatch) -> Result<Self> {
        let mut next = self.clone();
        if let Some(threshold) = patch.near_duplicate_threshold {
            next.near_duplicate_threshold = threshold;
        }
        if let Some(size) = patch.shingle_size {
            next.shingle_size = size;
        }
        if let Some(scope) = patch.compare_scope {
            next.compare_scope = scope;
        }
        next.validate()?;
        Ok(next)
    }

    /// Stable short digest of the configuration values.
    ///
    /// Verdicts and stats carry it so an auditor can tell which settings a
    /// decision was made under.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let canonical = format!(
            "threshold={:.6};shingle_size={};scope={};max_content_bytes={}",
            self.near_duplicate_threshold,
            self.shingle_size,
            self.compare_scope.as_str(),
            self.max_content_bytes
        );
        let digest = hex::encode(Sha256::digest(canonical.as_bytes()));
        digest[..16].to_string()
    }

    /// Builder method to set the near-duplicate threshold.
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.near_duplicate_threshold = threshold;
        self
    }

    /// Builder method to set the shingle size.
    #[must_use]
    pub const fn with_shingle_size(mut self, size: usize) -> Self {
        self.shingle_size = size;
        self
    }

    /// Builder method to set the compare scope.
    #[must_use]
    pub const fn with_compare_scope(mut self, scope: CompareScope) -> Self {
        self.compare_scope = scope;
        self
    }

    /// Builder method to set the maximum content size.
    #[must_use]
    pub const fn with_max_content_bytes(mut self, bytes: usize) -> Self {
        self.max_content_bytes = bytes;
        self
    }
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            near_duplicate_threshold: DEFAULT_NEAR_DUPLICATE_THRESHOLD,
            shingle_size: DEFAULT_SHINGLE_SIZE,
            compare_scope: CompareScope::default(),
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
        }
    }
}

fn validate_threshold(threshold: f64) -> Result<()> {
    if threshold.is_finite() && threshold > 0.0 && threshold <= 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "near_duplicate_threshold must be in (0, 1], got {threshold}"
        )))
    }
}

/// Partial update of the externally tunable knobs.
///
/// Unknown fields are rejected when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ConfigPatch {
    /// New near-duplicate threshold.
    #[serde(default, alias = "near_duplicate_threshold")]
    pub near_duplicate_threshold: Option<f64>,
    /// New shingle size.
    #[serde(default, alias = "shingle_size")]
    pub shingle_size: Option<usize>,
    /// New compare scope.
    #[serde(default, alias = "compare_scope")]
    pub compare_scope: Option<CompareScope>,
}

impl ConfigPatch {
    /// Creates an empty patch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            near_duplicate_threshold: None,
            shingle_size: None,
            compare_scope: None,
        }
    }

    /// Sets the threshold.
    #[must_use]
    pub const fn threshold(mut self, threshold: f64) -> Self {
        self.near_duplicate_threshold = Some(threshold);
        self
    }

    /// Sets the shingle size.
    #[must_use]
    pub const fn shingle_size(mut self, size: usize) -> Self {
        self.shingle_size = Some(size);
        self
    }

    /// Sets the compare scope.
    #[must_use]
    pub const fn compare_scope(mut self, scope: CompareScope) -> Self {
        self.compare_scope = Some(scope);
        self
    }

    /// Returns true if the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.near_duplicate_threshold.is_none()
            && self.shingle_size.is_none()
            && self.compare_scope.is_none()
    }
}
