//! Deduplication result types.
//!
//! This module defines the verdicts, batch results, cleanup results and stats
//! returned by the engine. Every type is plain serializable data so callers
//! can hand it to whatever transport they own.

use crate::models::{ObjectFilter, ObjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::config::DeduplicationConfig;
use super::strategy::CleanupStrategy;

/// How a candidate matched a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Canonical content hashes are identical.
    Exact,
    /// Shingle similarity met the threshold.
    Near,
    /// No peer matched.
    None,
}

impl MatchType {
    /// Returns the match type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Near => "near",
            Self::None => "none",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The signal that decided a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSignal {
    /// A peer had the same exact hash.
    ExactHash,
    /// The best peer's shingle similarity met the threshold.
    ShingleSimilarity,
    /// Peers were compared but none reached the threshold.
    BelowThreshold,
    /// There was nothing to compare against.
    NoPeers,
}

impl fmt::Display for MatchSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactHash => write!(f, "exact_hash"),
            Self::ShingleSimilarity => write!(f, "shingle_similarity"),
            Self::BelowThreshold => write!(f, "below_threshold"),
            Self::NoPeers => write!(f, "no_peers"),
        }
    }
}

/// Where a matched peer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerOrigin {
    /// Already in the knowledge store.
    Store,
    /// An earlier accepted item of the same batch call.
    Batch,
}

/// Classification metadata fields reported in the reason trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    /// `topic`
    Topic,
    /// `category`
    Category,
    /// `country`
    Country,
    /// `regulation_type`
    RegulationType,
    /// `effective_date`
    EffectiveDate,
}

/// Structured trace of why a verdict was reached.
///
/// The `matched_*`, `peer_origin`, and shingle counts describe the best peer
/// (the exact match, the near match, or the closest peer below threshold).
/// `metadata_agreement` is informational; it never affects the verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictReason {
    /// The deciding signal.
    pub signal: MatchSignal,
    /// Exact hash of the candidate.
    pub candidate_hash: String,
    /// Exact hash of the best peer, if any peer was compared.
    pub matched_hash: Option<String>,
    /// Near-duplicate threshold in effect.
    pub threshold: f64,
    /// Shingle size in effect.
    pub shingle_size: usize,
    /// Number of peers compared (self-matches excluded).
    pub peers_compared: usize,
    /// Origin of the best peer.
    pub peer_origin: Option<PeerOrigin>,
    /// Shingles shared with the best peer.
    pub shared_shingles: usize,
    /// Shingles in the union with the best peer.
    pub union_shingles: usize,
    /// Peers tied at the best score.
    pub tied_peers: usize,
    /// Metadata fields present on both sides with equal values.
    pub metadata_agreement: Vec<MetadataField>,
}

impl VerdictReason {
    /// Creates a trace with no peer information.
    #[must_use]
    pub const fn no_peers(candidate_hash: String, threshold: f64, shingle_size: usize) -> Self {
        Self {
            signal: MatchSignal::NoPeers,
            candidate_hash,
            matched_hash: None,
            threshold,
            shingle_size,
            peers_compared: 0,
            peer_origin: None,
            shared_shingles: 0,
            union_shingles: 0,
            tied_peers: 0,
            metadata_agreement: Vec::new(),
        }
    }
}

/// Result of classifying one candidate.
///
/// # Example
///
/// ```rust
/// use regdedup::services::deduplication::{DuplicateVerdict, MatchType, VerdictReason};
///
/// let reason = VerdictReason::no_peers("ab".repeat(32), 0.7, 3);
/// let verdict = DuplicateVerdict::not_duplicate(0.0, reason, "0011223344556677".to_string());
/// assert!(!verdict.is_duplicate);
/// assert_eq!(verdict.match_type, MatchType::None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateVerdict {
    /// Whether the candidate duplicates a peer.
    pub is_duplicate: bool,
    /// The peer it duplicates.
    pub matched_object_id: Option<ObjectId>,
    /// Exact, near, or none.
    pub match_type: MatchType,
    /// 1.0 for exact, the Jaccard score for near, the best score seen for none.
    pub similarity_score: f64,
    /// Audit trace.
    pub reason: VerdictReason,
    /// Fingerprint of the configuration snapshot used.
    pub config_fingerprint: String,
}

impl DuplicateVerdict {
    /// Creates an exact-duplicate verdict.
    #[must_use]
    pub const fn exact(
        matched: ObjectId,
        reason: VerdictReason,
        config_fingerprint: String,
    ) -> Self {
        Self {
            is_duplicate: true,
            matched_object_id: Some(matched),
            match_type: MatchType::Exact,
            similarity_score: 1.0,
            reason,
            config_fingerprint,
        }
    }

    /// Creates a near-duplicate verdict.
    #[must_use]
    pub const fn near(
        matched: ObjectId,
        score: f64,
        reason: VerdictReason,
        config_fingerprint: String,
    ) -> Self {
        Self {
            is_duplicate: true,
            matched_object_id: Some(matched),
            match_type: MatchType::Near,
            similarity_score: score,
            reason,
            config_fingerprint,
        }
    }

    /// Creates a not-duplicate verdict.
    #[must_use]
    pub const fn not_duplicate(
        best_score: f64,
        reason: VerdictReason,
        config_fingerprint: String,
    ) -> Self {
        Self {
            is_duplicate: false,
            matched_object_id: None,
            match_type: MatchType::None,
            similarity_score: best_score,
            reason,
            config_fingerprint,
        }
    }
}

/// Outcome of one batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Not a duplicate; later items are compared against it.
    Accepted,
    /// Duplicate of a store object or an earlier batch item.
    Duplicate,
    /// Classification failed for this item only.
    Error,
}

impl BatchOutcome {
    /// Returns the outcome as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Duplicate => "duplicate",
            Self::Error => "error",
        }
    }
}

/// Error attached to a single batch item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemError {
    /// Machine-readable kind (see [`crate::Error::kind`]).
    pub kind: String,
    /// Human-readable message.
    pub message: String,
}

impl From<&crate::Error> for BatchItemError {
    fn from(err: &crate::Error) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Per-item result of a batch call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItemResult {
    /// Position in the input.
    pub index: usize,
    /// Id of the submitted object.
    pub object_id: ObjectId,
    /// Accepted, duplicate, or error.
    pub outcome: BatchOutcome,
    /// Verdict when classification succeeded.
    pub verdict: Option<DuplicateVerdict>,
    /// Error when classification failed.
    pub error: Option<BatchItemError>,
    /// Input index of the batch peer it duplicates.
    pub matched_batch_index: Option<usize>,
}

/// Result of `batch_deduplicate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    /// One entry per input item, in input order.
    pub items: Vec<BatchItemResult>,
    /// Items accepted.
    pub accepted: usize,
    /// Items found to be duplicates.
    pub duplicates_found: usize,
    /// Items that failed.
    pub errors: usize,
    /// Fingerprint of the configuration snapshot used.
    pub config_fingerprint: String,
    /// Wall time in milliseconds.
    pub duration_ms: u64,
}

/// Options for a cleanup run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupOptions {
    /// Compute clusters and survivors without issuing removals.
    pub dry_run: bool,
    /// Restricts the run to matching objects.
    pub filter: ObjectFilter,
}

impl CleanupOptions {
    /// Creates default options (live run over the whole store).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the object filter.
    #[must_use]
    pub fn with_filter(mut self, filter: ObjectFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// How one duplicate cluster was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterResolution {
    /// The kept object.
    pub survivor: ObjectId,
    /// Objects marked for removal, sorted.
    pub removed: Vec<ObjectId>,
}

/// Result of `cleanup_duplicates`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupResult {
    /// Strategy used.
    pub strategy: CleanupStrategy,
    /// Whether removals were skipped.
    pub dry_run: bool,
    /// Objects listed from the store.
    pub objects_scanned: usize,
    /// Objects skipped because their content failed validation.
    pub objects_skipped: usize,
    /// Clusters of size greater than one.
    pub clusters_processed: usize,
    /// Objects marked for removal across all clusters.
    pub redundant_objects: usize,
    /// Objects the store reported as removed (zero on dry run).
    pub objects_removed: usize,
    /// Per-cluster decisions.
    pub resolutions: Vec<ClusterResolution>,
    /// Fingerprint of the configuration snapshot used.
    pub config_fingerprint: String,
    /// Completion time.
    pub completed_at: DateTime<Utc>,
    /// Wall time in milliseconds.
    pub duration_ms: u64,
}

impl CleanupResult {
    /// Returns a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let verb = if self.dry_run { "would remove" } else { "removed" };
        let count = if self.dry_run {
            self.redundant_objects
        } else {
            self.objects_removed
        };
        format!(
            "{} clusters, {verb} {count} of {} objects ({} skipped) using '{}' in {}ms",
            self.clusters_processed,
            self.objects_scanned,
            self.objects_skipped,
            self.strategy,
            self.duration_ms
        )
    }
}

/// Where the cluster counts in [`DeduplicationStats`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsSource {
    /// An on-demand dry scan.
    Scan,
    /// The most recent live cleanup run.
    LastCleanup,
}

/// Read-only engine statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeduplicationStats {
    /// Objects currently in the store (matching the filter).
    pub total_objects: usize,
    /// Duplicate clusters, if a scan ran or a cleanup has completed.
    pub duplicate_clusters: Option<usize>,
    /// Objects that a cleanup would remove (or did remove).
    pub redundant_objects: Option<usize>,
    /// Origin of the cluster counts.
    pub source: Option<StatsSource>,
    /// When the last live cleanup finished.
    pub last_cleanup_at: Option<DateTime<Utc>>,
    /// Current configuration.
    pub config: DeduplicationConfig,
    /// Fingerprint of the current configuration.
    pub config_fingerprint: String,
}

/// Single-object duplicate checking.
///
/// Lets callers depend on the check without naming the store type.
pub trait Deduplicator: Send + Sync {
    /// Classifies `object` against its peers under the current configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is invalid or the store is unavailable.
    fn check(&self, object: &crate::models::KnowledgeObject) -> crate::Result<DuplicateVerdict>;

    /// Fingerprints `content` under the current configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if the content is invalid.
    fn fingerprint(&self, content: &str) -> crate::Result<super::fingerprint::Fingerprint>;
}
