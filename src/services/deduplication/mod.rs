//! Deduplication of regulatory knowledge objects.
//!
//! Detects exact and near duplicates and reconciles a store that has
//! accumulated them.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                       DeduplicationEngine                         │
//! │  config snapshot (RwLock<Arc<_>>) · cleanup permit · cancel flag  │
//! │                                                                   │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────┐  ┌───────────┐  │
//! │  │Canonicalizer │─▶│ Fingerprint  │─▶│Similarity│─▶│ Duplicate │  │
//! │  │              │  │ Generator    │  │ (Jaccard)│  │ Classifier│  │
//! │  │ lowercase,   │  │ sha256 +     │  │          │  │ threshold,│  │
//! │  │ punctuation  │  │ shingles     │  │          │  │ tie-break │  │
//! │  └──────────────┘  └──────────────┘  └──────────┘  └───────────┘  │
//! │                                                                   │
//! │  cleanup: union-find clusters ─▶ CleanupStrategy ─▶ remove_objects│
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Defaults
//!
//! | Knob | Default |
//! |------|---------|
//! | `near_duplicate_threshold` | 0.70 |
//! | `shingle_size` | 3 |
//! | `compare_scope` | `both` |

mod canonicalizer;
mod classifier;
mod cluster;
mod config;
mod fingerprint;
mod service;
mod similarity;
mod strategy;
mod types;

pub use canonicalizer::{Canonicalizer, DEFAULT_KEEP, DEFAULT_NUMERIC_SEPARATORS, canonicalize};
pub use classifier::{Classification, DuplicateClassifier, IndexedPeer, metadata_agreement};
pub use cluster::{UnionFind, find_clusters};
pub use config::{
    CompareScope, ConfigPatch, DEFAULT_MAX_CONTENT_BYTES, DEFAULT_NEAR_DUPLICATE_THRESHOLD,
    DeduplicationConfig,
};
pub use fingerprint::{DEFAULT_SHINGLE_SIZE, Fingerprint, FingerprintGenerator, hash, shingles};
pub use service::DeduplicationEngine;
pub use similarity::{SimilarityBreakdown, compare, jaccard_similarity};
pub use strategy::{CleanupStrategy, trust_rank};
pub use types::{
    BatchItemError, BatchItemResult, BatchOutcome, BatchResult, CleanupOptions, CleanupResult,
    ClusterResolution, DeduplicationStats, Deduplicator, DuplicateVerdict, MatchSignal, MatchType,
    MetadataField, PeerOrigin, StatsSource, VerdictReason,
};
