//! # regdedup
//!
//! Deterministic deduplication engine for regulatory knowledge objects.
//!
//! regdedup decides whether an incoming or stored knowledge object (a
//! regulatory text snippet, rule, or interpretation) duplicates another one,
//! and reconciles a store that has accumulated duplicates under a retention
//! policy.
//!
//! ## Pipeline
//!
//! ```text
//! content ─▶ Canonicalizer ─▶ FingerprintGenerator ─▶ DuplicateClassifier ─▶ DuplicateVerdict
//!                                   (sha256 + shingles)     │
//!                                                           ▼
//!                                                 jaccard_similarity vs peers
//! ```
//!
//! Every verdict carries a [`VerdictReason`] trace so that a reviewer can ask
//! why one object was considered a duplicate of another.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use regdedup::{DeduplicationConfig, DeduplicationEngine, KnowledgeObject, MatchType};
//! use regdedup::storage::InMemoryStore;
//!
//! let store = Arc::new(InMemoryStore::new());
//! store.insert(KnowledgeObject::new("kb-1", "All transactions over $10,000 must be reported."));
//!
//! let engine = DeduplicationEngine::new(store, DeduplicationConfig::default())?;
//! let candidate = KnowledgeObject::new("kb-2", "All transactions over $10,000 must be reported");
//! let verdict = engine.check_duplicate(&candidate, None)?;
//! assert_eq!(verdict.match_type, MatchType::Exact);
//! # Ok::<(), regdedup::Error>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::AppConfig;
pub use models::{Confidence, KnowledgeObject, ObjectFilter, ObjectId, ObjectStatus};
pub use services::deduplication::{
    BatchResult, CleanupOptions, CleanupResult, CleanupStrategy, CompareScope, ConfigPatch,
    DeduplicationConfig, DeduplicationEngine, DeduplicationStats, DuplicateVerdict, Fingerprint,
    MatchType, VerdictReason,
};
pub use storage::KnowledgeStore;

/// Error type for regdedup operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty or malformed content, unknown cleanup strategy |
/// | `InvalidConfig` | Threshold outside (0, 1], shingle size of zero |
/// | `StoreUnavailable` | The knowledge store failed, timed out, or its breaker is open |
/// | `ConcurrentCleanupInProgress` | A second cleanup while one is running |
/// | `Cancelled` | A cleanup was cancelled before it issued removals |
/// | `OperationFailed` | Local I/O, serialization, or lock failures |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - Content is empty, whitespace only, contains NUL bytes, or exceeds the size limit
    /// - A cleanup strategy name is not one of `newest`, `oldest`, `highest-trust`
    /// - A request document cannot be parsed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A configuration value is out of range.
    ///
    /// The previous configuration stays in effect when this is returned.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The knowledge store could not serve the request.
    ///
    /// Retryable by the caller. The engine never retries on its own.
    #[error("store unavailable during '{operation}': {cause}")]
    StoreUnavailable {
        /// The store operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A cleanup run is already in progress.
    #[error("cleanup already in progress")]
    ConcurrentCleanupInProgress,

    /// The operation was cancelled before any store mutation was issued.
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// A local operation failed.
    ///
    /// Raised when:
    /// - Configuration or store files cannot be read, parsed, or written
    /// - Observability initialization fails
    /// - An internal lock was poisoned
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns `true` when the caller may retry the same request unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. } | Self::ConcurrentCleanupInProgress
        )
    }

    /// Short machine-readable error kind used in logs and metric labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidConfig(_) => "invalid_config",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::ConcurrentCleanupInProgress => "cleanup_in_progress",
            Self::Cancelled(_) => "cancelled",
            Self::OperationFailed { .. } => "operation_failed",
        }
    }
}

/// Result type alias for regdedup operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("empty content".to_string());
        assert_eq!(err.to_string(), "invalid input: empty content");

        let err = Error::StoreUnavailable {
            operation: "list_objects".to_string(),
            cause: "timeout".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "store unavailable during 'list_objects': timeout"
        );

        let err = Error::ConcurrentCleanupInProgress;
        assert_eq!(err.to_string(), "cleanup already in progress");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(Error::ConcurrentCleanupInProgress.is_retryable());
        assert!(
            Error::StoreUnavailable {
                operation: "remove_objects".to_string(),
                cause: "down".to_string(),
            }
            .is_retryable()
        );
        assert!(!Error::InvalidConfig("threshold".to_string()).is_retryable());
        assert!(!Error::InvalidInput("content".to_string()).is_retryable());
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::Cancelled("cleanup".to_string()).kind(), "cancelled");
        assert_eq!(
            Error::InvalidConfig("x".to_string()).kind(),
            "invalid_config"
        );
    }
}
