//! Deduplication engine orchestrator.
//!
//! Coordinates fingerprinting, classification and clustering against the
//! knowledge store, and owns the only mutable shared state: the current
//! configuration snapshot, the cleanup permit, and the last cleanup summary.

use crate::models::{KnowledgeObject, ObjectFilter, ObjectId};
use crate::storage::KnowledgeStore;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::instrument;

use super::classifier::{DuplicateClassifier, IndexedPeer};
use super::cluster::find_clusters;
use super::config::{ConfigPatch, DeduplicationConfig};
use super::fingerprint::Fingerprint;
use super::strategy::CleanupStrategy;
use super::types::{
    BatchItemError, BatchItemResult, BatchOutcome, BatchResult, CleanupOptions, CleanupResult,
    ClusterResolution, DeduplicationStats, Deduplicator, DuplicateVerdict, PeerOrigin,
    StatsSource,
};

/// Summary of the last live cleanup, kept for stats.
#[derive(Debug, Clone, Copy)]
struct CleanupSummary {
    completed_at: DateTime<Utc>,
    clusters: usize,
    redundant: usize,
}

/// Holds the cleanup permit for one run.
///
/// Drop releases the permit before clearing the cancel flag.
struct CleanupRun<'a> {
    permit: Option<SemaphorePermit<'a>>,
    cancel_requested: &'a AtomicBool,
}

impl Drop for CleanupRun<'_> {
    fn drop(&mut self) {
        drop(self.permit.take());
        self.cancel_requested.store(false, Ordering::SeqCst);
    }
}

/// Clusters and survivors computed over a store listing.
struct ClusterPlan {
    objects_scanned: usize,
    objects_skipped: usize,
    resolutions: Vec<ClusterResolution>,
}

impl ClusterPlan {
    fn redundant(&self) -> usize {
        self.resolutions.iter().map(|r| r.removed.len()).sum()
    }
}

/// The deduplication engine.
///
/// One instance is constructed per process and shared (usually behind an
/// `Arc`) by every request handler. Reads and writes of the configuration use
/// snapshot replacement: each operation clones the `Arc` at entry and works
/// against that snapshot, so an `update_config` racing with a batch never
/// changes the batch midway.
///
/// `check_duplicate` and `batch_deduplicate` may run concurrently with each
/// other and with cleanup. At most one cleanup runs at a time; a second caller
/// gets [`Error::ConcurrentCleanupInProgress`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use regdedup::{CleanupStrategy, DeduplicationConfig, DeduplicationEngine, KnowledgeObject};
/// use regdedup::storage::InMemoryStore;
///
/// let store = Arc::new(InMemoryStore::new());
/// store.create(KnowledgeObject::new("", "Report cash deposits over $10,000."));
/// store.create(KnowledgeObject::new("", "report cash deposits over $10,000"));
///
/// let engine = DeduplicationEngine::new(store.clone(), DeduplicationConfig::default())?;
/// let result = engine.cleanup_duplicates(CleanupStrategy::Oldest)?;
/// assert_eq!(result.objects_removed, 1);
/// assert_eq!(store.len(), 1);
/// # Ok::<(), regdedup::Error>(())
/// ```
pub struct DeduplicationEngine<S: KnowledgeStore + ?Sized> {
    store: Arc<S>,
    config: RwLock<Arc<DeduplicationConfig>>,
    cleanup_permit: Semaphore,
    cancel_requested: AtomicBool,
    last_cleanup: Mutex<Option<CleanupSummary>>,
}

impl<S: KnowledgeStore + ?Sized> DeduplicationEngine<S> {
    /// Creates an engine over `store`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` is out of range.
    pub fn new(store: Arc<S>, config: DeduplicationConfig) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            store = store.name(),
            threshold = config.near_duplicate_threshold,
            shingle_size = config.shingle_size,
            scope = %config.compare_scope,
            "Deduplication engine ready"
        );
        Ok(Self {
            store,
            config: RwLock::new(Arc::new(config)),
            cleanup_permit: Semaphore::new(1),
            cancel_requested: AtomicBool::new(false),
            last_cleanup: Mutex::new(None),
        })
    }

    /// Returns the store.
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn snapshot(&self) -> Arc<DeduplicationConfig> {
        Arc::clone(&self.config.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Snapshot with an optional per-call override applied.
    fn effective_config(&self, patch: Option<&ConfigPatch>) -> Result<Arc<DeduplicationConfig>> {
        let base = self.snapshot();
        match patch {
            Some(patch) if !patch.is_empty() => Ok(Arc::new(base.patched(patch)?)),
            _ => Ok(base),
        }
    }

    /// Returns a copy of the current configuration.
    pub fn get_config(&self) -> DeduplicationConfig {
        self.snapshot().as_ref().clone()
    }

    /// Applies `patch` atomically and returns the new configuration.
    ///
    /// Takes effect for operations that start after this call returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the patched configuration is out of
    /// range; the previous configuration stays in effect.
    #[instrument(skip(self), fields(operation = "update_config"))]
    pub fn update_config(&self, patch: &ConfigPatch) -> Result<DeduplicationConfig> {
        let mut guard = self.config.write().unwrap_or_else(PoisonError::into_inner);
        match guard.patched(patch) {
            Ok(next) => {
                tracing::info!(
                    threshold = next.near_duplicate_threshold,
                    shingle_size = next.shingle_size,
                    scope = %next.compare_scope,
                    fingerprint = %next.fingerprint(),
                    "Deduplication config updated"
                );
                *guard = Arc::new(next.clone());
                drop(guard);
                metrics::counter!("dedup_config_updates_total", "result" => "applied").increment(1);
                Ok(next)
            },
            Err(e) => {
                drop(guard);
                tracing::warn!(error = %e, "Rejected config update");
                metrics::counter!("dedup_config_updates_total", "result" => "rejected")
                    .increment(1);
                Err(e)
            },
        }
    }

    /// Fingerprints `content` under the current shingle size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the content is empty, contains NUL
    /// bytes, exceeds the size limit, or has no comparable tokens.
    pub fn generate_fingerprint(&self, content: &str) -> Result<Fingerprint> {
        DuplicateClassifier::new(&self.snapshot()).fingerprint(content)
    }

    /// Lists and indexes store peers, ordered by (`created_at`, `id`).
    ///
    /// Objects whose content fails validation are skipped.
    fn store_peers(&self, classifier: &DuplicateClassifier) -> Result<Vec<IndexedPeer>> {
        let objects = self.list(&ObjectFilter::default())?;
        let mut peers: Vec<IndexedPeer> = objects
            .iter()
            .filter_map(|object| match classifier.index(object, PeerOrigin::Store, None) {
                Ok(peer) => Some(peer),
                Err(e) => {
                    tracing::debug!(object_id = %object.id, error = %e, "Skipping invalid store object");
                    None
                },
            })
            .collect();
        peers.sort_by(|a, b| {
            a.object
                .created_at
                .cmp(&b.object.created_at)
                .then_with(|| a.object.id.cmp(&b.object.id))
        });
        Ok(peers)
    }

    fn list(&self, filter: &ObjectFilter) -> Result<Vec<KnowledgeObject>> {
        self.store
            .list_objects(filter)
            .map_err(|e| store_error("list_objects", e))
    }

    /// Classifies one object against the store.
    ///
    /// Read-only. `override_patch` adjusts the knobs for this call only.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for invalid content, before any store call
    /// - [`Error::InvalidConfig`] if the override is out of range
    /// - [`Error::StoreUnavailable`] if the store cannot list peers
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    #[instrument(
        skip(self, object, override_patch),
        fields(
            operation = "check_duplicate",
            object_id = %object.id,
            content_length = object.content.len()
        )
    )]
    pub fn check_duplicate(
        &self,
        object: &KnowledgeObject,
        override_patch: Option<&ConfigPatch>,
    ) -> Result<DuplicateVerdict> {
        let start = Instant::now();
        let config = self.effective_config(override_patch)?;
        let classifier = DuplicateClassifier::new(&config);
        let fingerprint = classifier.fingerprint(&object.content)?;

        let peers = if config.compare_scope.includes_store() {
            self.store_peers(&classifier)?
        } else {
            tracing::debug!("Compare scope excludes store, no peers for a single check");
            Vec::new()
        };

        let verdict = classifier
            .classify_fingerprint(object, &fingerprint, &peers)
            .verdict;

        let duration_ms = start.elapsed().as_millis() as u64;
        metrics::counter!("dedup_checks_total", "match_type" => verdict.match_type.as_str())
            .increment(1);
        metrics::histogram!("dedup_check_duration_ms").record(duration_ms as f64);
        tracing::info!(
            match_type = %verdict.match_type,
            matched = ?verdict.matched_object_id.as_ref().map(ObjectId::as_str),
            score = verdict.similarity_score,
            peers = verdict.reason.peers_compared,
            duration_ms,
            "Duplicate check complete"
        );
        Ok(verdict)
    }

    /// Classifies `objects` in input order against the store and earlier
    /// accepted items of the same call.
    ///
    /// Store peers are listed once at the start. An item that fails
    /// classification is recorded with its error and skipped; the rest of the
    /// batch continues.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if the override is out of range
    /// - [`Error::StoreUnavailable`] if the store cannot list peers
    #[allow(clippy::cast_possible_truncation)] // Duration in ms won't exceed u64::MAX
    #[instrument(
        skip(self, objects, override_patch),
        fields(operation = "batch_deduplicate", batch_size = objects.len())
    )]
    pub fn batch_deduplicate(
        &self,
        objects: &[KnowledgeObject],
        override_patch: Option<&ConfigPatch>,
    ) -> Result<BatchResult> {
        let start = Instant::now();
        let config = self.effective_config(override_patch)?;
        let classifier = DuplicateClassifier::new(&config);

        let store_peers = if config.compare_scope.includes_store() && !objects.is_empty() {
            self.store_peers(&classifier)?
        } else {
            Vec::new()
        };
        let mut batch_peers: Vec<IndexedPeer> = Vec::new();

        let mut items = Vec::with_capacity(objects.len());
        let (mut accepted, mut duplicates_found, mut errors) = (0usize, 0usize, 0usize);

        for (index, object) in objects.iter().enumerate() {
            let peer = match classifier.index(object, PeerOrigin::Batch, Some(index)) {
                Ok(peer) => peer,
                Err(e) => {
                    tracing::warn!(index, object_id = %object.id, error = %e, "Batch item rejected");
                    errors += 1;
                    metrics::counter!("dedup_batch_items_total", "outcome" => "error").increment(1);
                    items.push(BatchItemResult {
                        index,
                        object_id: object.id.clone(),
                        outcome: BatchOutcome::Error,
                        verdict: None,
                        error: Some(BatchItemError::from(&e)),
                        matched_batch_index: None,
                    });
                    continue;
                },
            };

            let classification =
                classifier.classify_fingerprint(object, &peer.fingerprint, store_peers.iter().chain(&batch_peers));
            let outcome = if classification.verdict.is_duplicate {
                duplicates_found += 1;
                BatchOutcome::Duplicate
            } else {
                accepted += 1;
                if config.compare_scope.includes_batch() {
                    batch_peers.push(peer);
                }
                BatchOutcome::Accepted
            };
            metrics::counter!("dedup_batch_items_total", "outcome" => outcome.as_str()).increment(1);

            items.push(BatchItemResult {
                index,
                object_id: object.id.clone(),
                outcome,
                verdict: Some(classification.verdict),
                error: None,
                matched_batch_index: classification.matched_batch_index,
            });
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            accepted,
            duplicates_found,
            errors,
            store_peers = store_peers.len(),
            duration_ms,
            "Batch deduplication complete"
        );
        Ok(BatchResult {
            items,
            accepted,
            duplicates_found,
            errors,
            config_fingerprint: config.fingerprint(),
            duration_ms,
        })
    }

    /// Reduces every duplicate cluster in the store to one survivor.
    ///
    /// Equivalent to [`Self::cleanup_duplicates_with`] with default options.
    ///
    /// # Errors
    ///
    /// See [`Self::cleanup_duplicates_with`].
    pub fn cleanup_duplicates(&self, strategy: CleanupStrategy) -> Result<CleanupResult> {
        self.cleanup_duplicates_with(strategy, &CleanupOptions::default())
    }

    /// Reduces every duplicate cluster among the filtered objects to one
    /// survivor chosen by `strategy`.
    ///
    /// Objects are clustered transitively: two objects share a cluster when a
    /// chain of pairwise exact or near verdicts connects them. Non-survivors
    /// are removed through the store in one request unless `dry_run` is set.
    ///
    /// # Errors
    ///
    /// - [`Error::ConcurrentCleanupInProgress`] if another cleanup is running
    /// - [`Error::Cancelled`] if [`Self::cancel_cleanup`] was called before
    ///   removals were issued
    /// - [`Error::StoreUnavailable`] if the store cannot list or remove
    #[allow(clippy::cast_possible_truncation)] // Duration in ms won't exceed u64::MAX
    #[instrument(
        skip(self, strategy, options),
        fields(
            operation = "cleanup_duplicates",
            strategy = %strategy,
            dry_run = options.dry_run
        )
    )]
    pub fn cleanup_duplicates_with(
        &self,
        strategy: CleanupStrategy,
        options: &CleanupOptions,
    ) -> Result<CleanupResult> {
        let _run = self.begin_cleanup()?;

        let start = Instant::now();
        let config = self.snapshot();
        let classifier = DuplicateClassifier::new(&config);

        let objects = self.list(&options.filter)?;
        self.ensure_not_cancelled()?;

        let plan = plan_clusters(&classifier, &objects, strategy, || {
            self.cancel_requested.load(Ordering::SeqCst)
        })?;
        let redundant_objects = plan.redundant();

        self.ensure_not_cancelled()?;

        let objects_removed = if options.dry_run || redundant_objects == 0 {
            0
        } else {
            let ids: BTreeSet<ObjectId> = plan
                .resolutions
                .iter()
                .flat_map(|r| r.removed.iter().cloned())
                .collect();
            self.store
                .remove_objects(&ids)
                .map_err(|e| store_error("remove_objects", e))?
        };

        let completed_at = Utc::now();
        if !options.dry_run {
            *self
                .last_cleanup
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(CleanupSummary {
                completed_at,
                clusters: plan.resolutions.len(),
                redundant: redundant_objects,
            });
        }

        let result = CleanupResult {
            strategy,
            dry_run: options.dry_run,
            objects_scanned: plan.objects_scanned,
            objects_skipped: plan.objects_skipped,
            clusters_processed: plan.resolutions.len(),
            redundant_objects,
            objects_removed,
            resolutions: plan.resolutions,
            config_fingerprint: config.fingerprint(),
            completed_at,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        metrics::counter!(
            "dedup_cleanup_runs_total",
            "strategy" => strategy.as_str(),
            "dry_run" => if options.dry_run { "true" } else { "false" }
        )
        .increment(1);
        metrics::counter!("dedup_cleanup_removed_total").increment(objects_removed as u64);
        tracing::info!(summary = %result.summary(), "Cleanup complete");
        Ok(result)
    }

    fn begin_cleanup(&self) -> Result<CleanupRun<'_>> {
        let permit = self.cleanup_permit.try_acquire().map_err(|_| {
            tracing::warn!("Cleanup requested while another cleanup is running");
            Error::ConcurrentCleanupInProgress
        })?;
        Ok(CleanupRun {
            permit: Some(permit),
            cancel_requested: &self.cancel_requested,
        })
    }

    fn ensure_not_cancelled(&self) -> Result<()> {
        if self.cancel_requested.load(Ordering::SeqCst) {
            tracing::info!("Cleanup cancelled before removals were issued");
            return Err(Error::Cancelled("cleanup".to_string()));
        }
        Ok(())
    }

    /// Asks a running cleanup to stop before it issues removals.
    ///
    /// Returns false if no cleanup is running.
    pub fn cancel_cleanup(&self) -> bool {
        if !self.is_cleanup_running() {
            return false;
        }
        self.cancel_requested.store(true, Ordering::SeqCst);
        true
    }

    /// Returns true while a cleanup holds the permit.
    pub fn is_cleanup_running(&self) -> bool {
        self.cleanup_permit.available_permits() == 0
    }

    /// Returns engine statistics over the whole store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the store cannot be read.
    pub fn get_deduplication_stats(&self, scan: bool) -> Result<DeduplicationStats> {
        self.get_deduplication_stats_in(&ObjectFilter::default(), scan)
    }

    /// Returns engine statistics over objects matching `filter`.
    ///
    /// With `scan`, clusters are computed on demand (read-only); otherwise the
    /// counts come from the last live cleanup, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the store cannot be read.
    #[instrument(skip(self, filter), fields(operation = "get_deduplication_stats"))]
    pub fn get_deduplication_stats_in(
        &self,
        filter: &ObjectFilter,
        scan: bool,
    ) -> Result<DeduplicationStats> {
        let config = self.snapshot();
        let last = *self
            .last_cleanup
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let (total_objects, clusters, redundant, source) = if scan {
            let objects = self.list(filter)?;
            let classifier = DuplicateClassifier::new(&config);
            let plan = plan_clusters(&classifier, &objects, CleanupStrategy::Newest, || false)?;
            (
                objects.len(),
                Some(plan.resolutions.len()),
                Some(plan.redundant()),
                Some(StatsSource::Scan),
            )
        } else {
            let total = self
                .store
                .count(filter)
                .map_err(|e| store_error("count", e))?;
            match last {
                Some(summary) => (
                    total,
                    Some(summary.clusters),
                    Some(summary.redundant),
                    Some(StatsSource::LastCleanup),
                ),
                None => (total, None, None, None),
            }
        };

        Ok(DeduplicationStats {
            total_objects,
            duplicate_clusters: clusters,
            redundant_objects: redundant,
            source,
            last_cleanup_at: last.map(|s| s.completed_at),
            config_fingerprint: config.fingerprint(),
            config: config.as_ref().clone(),
        })
    }
}

impl<S: KnowledgeStore + ?Sized> Deduplicator for DeduplicationEngine<S> {
    fn check(&self, object: &KnowledgeObject) -> Result<DuplicateVerdict> {
        self.check_duplicate(object, None)
    }

    fn fingerprint(&self, content: &str) -> Result<Fingerprint> {
        self.generate_fingerprint(content)
    }
}

/// Fingerprints, clusters, and resolves `objects`.
fn plan_clusters(
    classifier: &DuplicateClassifier,
    objects: &[KnowledgeObject],
    strategy: CleanupStrategy,
    cancelled: impl Fn() -> bool,
) -> Result<ClusterPlan> {
    let mut indexed: Vec<(&KnowledgeObject, Fingerprint)> = Vec::with_capacity(objects.len());
    for object in objects {
        match classifier.fingerprint(&object.content) {
            Ok(fp) => indexed.push((object, fp)),
            Err(e) => {
                tracing::warn!(object_id = %object.id, error = %e, "Skipping object with invalid content");
            },
        }
    }
    let objects_skipped = objects.len() - indexed.len();
    indexed.sort_by(|(a, _), (b, _)| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

    let fingerprints: Vec<Fingerprint> = indexed.iter().map(|(_, fp)| fp.clone()).collect();
    let clusters = find_clusters(&fingerprints, classifier.threshold(), cancelled)?;

    let mut resolutions = Vec::with_capacity(clusters.len());
    for cluster in clusters {
        let members: Vec<&KnowledgeObject> = cluster.iter().map(|&i| indexed[i].0).collect();
        let Some(survivor) = strategy.select_survivor(&members) else {
            continue;
        };
        let mut removed: Vec<ObjectId> = members
            .iter()
            .filter(|m| m.id != survivor.id)
            .map(|m| m.id.clone())
            .collect();
        removed.sort();
        tracing::debug!(
            survivor = %survivor.id,
            removed = removed.len(),
            "Resolved duplicate cluster"
        );
        resolutions.push(ClusterResolution {
            survivor: survivor.id.clone(),
            removed,
        });
    }

    Ok(ClusterPlan {
        objects_scanned: objects.len(),
        objects_skipped,
        resolutions,
    })
}

/// Maps any store failure to [`Error::StoreUnavailable`].
fn store_error(operation: &str, err: Error) -> Error {
    match err {
        Error::StoreUnavailable { .. } => err,
        other => Error::StoreUnavailable {
            operation: operation.to_string(),
            cause: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::deduplication::{CompareScope, MatchType};
    use crate::storage::InMemoryStore;
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn obj(id: &str, content: &str, minutes: i64) -> KnowledgeObject {
        KnowledgeObject::new(id, content).with_created_at(at(minutes))
    }

    fn engine(objects: Vec<KnowledgeObject>) -> DeduplicationEngine<InMemoryStore> {
        DeduplicationEngine::new(
            Arc::new(InMemoryStore::with_objects(objects)),
            DeduplicationConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = DeduplicationEngine::new(
            Arc::new(InMemoryStore::new()),
            DeduplicationConfig::default().with_threshold(0.0),
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_check_exact_against_store() {
        let engine = engine(vec![obj("kb-1", "Report wire transfers above the limit.", 0)]);
        let candidate = KnowledgeObject::new("new", "report wire transfers above the limit");

        let verdict = engine.check_duplicate(&candidate, None).unwrap();
        assert_eq!(verdict.match_type, MatchType::Exact);
        assert_eq!(verdict.matched_object_id, Some(ObjectId::new("kb-1")));
        assert_eq!(verdict.config_fingerprint, engine.get_config().fingerprint());
    }

    #[test]
    fn test_check_with_within_batch_scope_has_no_peers() {
        let engine = engine(vec![obj("kb-1", "Report wire transfers", 0)]);
        let patch = ConfigPatch::new().compare_scope(CompareScope::WithinBatch);
        let verdict = engine
            .check_duplicate(&KnowledgeObject::new("x", "Report wire transfers"), Some(&patch))
            .unwrap();
        assert_eq!(verdict.match_type, MatchType::None);
        assert_eq!(engine.get_config().compare_scope, CompareScope::Both);
    }

    #[test]
    fn test_override_is_validated() {
        let engine = engine(Vec::new());
        let patch = ConfigPatch::new().threshold(2.0);
        let err = engine
            .check_duplicate(&KnowledgeObject::new("x", "text"), Some(&patch))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_update_config_is_atomic() {
        let engine = engine(Vec::new());
        engine
            .update_config(&ConfigPatch::new().threshold(0.9))
            .unwrap();

        let err = engine
            .update_config(&ConfigPatch::new().shingle_size(2).threshold(1.5))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let config = engine.get_config();
        assert!((config.near_duplicate_threshold - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.shingle_size, 3);
    }

    #[test]
    fn test_batch_internal_duplicates() {
        let engine = engine(Vec::new());
        let batch = vec![
            KnowledgeObject::new("b-0", "Firms must report suspicious transactions within 30 days"),
            KnowledgeObject::new("b-1", "Firms must report suspicious transactions within 30 days."),
            KnowledgeObject::new("b-2", ""),
        ];
        let result = engine.batch_deduplicate(&batch, None).unwrap();

        assert_eq!(result.accepted, 1);
        assert_eq!(result.duplicates_found, 1);
        assert_eq!(result.errors, 1);
        assert_eq!(result.items[1].matched_batch_index, Some(0));
        assert_eq!(result.items[2].outcome, BatchOutcome::Error);
        assert_eq!(
            result.items[2].error.as_ref().map(|e| e.kind.as_str()),
            Some("invalid_input")
        );
    }

    #[test]
    fn test_cleanup_removes_redundant_and_records_summary() {
        let engine = engine(vec![
            obj("a", "Keep customer records for five years.", 0),
            obj("b", "keep customer records for five years", 5),
            obj("c", "Appoint a money laundering reporting officer", 1),
        ]);

        let result = engine.cleanup_duplicates(CleanupStrategy::Newest).unwrap();
        assert_eq!(result.clusters_processed, 1);
        assert_eq!(result.objects_removed, 1);
        assert_eq!(result.resolutions[0].survivor, ObjectId::new("b"));
        assert_eq!(result.resolutions[0].removed, vec![ObjectId::new("a")]);

        let stats = engine.get_deduplication_stats(false).unwrap();
        assert_eq!(stats.total_objects, 2);
        assert_eq!(stats.duplicate_clusters, Some(1));
        assert_eq!(stats.source, Some(StatsSource::LastCleanup));
        assert!(stats.last_cleanup_at.is_some());
        assert!(!engine.is_cleanup_running());
    }

    #[test]
    fn test_dry_run_leaves_store_untouched() {
        let engine = engine(vec![obj("a", "Same text here", 0), obj("b", "same text here!", 1)]);
        let result = engine
            .cleanup_duplicates_with(CleanupStrategy::Oldest, &CleanupOptions::new().with_dry_run(true))
            .unwrap();
        assert_eq!(result.redundant_objects, 1);
        assert_eq!(result.objects_removed, 0);
        assert_eq!(engine.store().len(), 2);
        assert!(engine.get_deduplication_stats(false).unwrap().last_cleanup_at.is_none());
    }

    #[test]
    fn test_cancel_without_running_cleanup() {
        let engine = engine(Vec::new());
        assert!(!engine.cancel_cleanup());
    }

    #[test]
    fn test_cancel_right_after_permit_is_honored() {
        let engine = engine(vec![obj("a", "Same text here", 0), obj("b", "same text here!", 1)]);

        let run = engine.begin_cleanup().unwrap();
        assert!(engine.cancel_cleanup());
        assert!(matches!(engine.ensure_not_cancelled(), Err(Error::Cancelled(_))));
        drop(run);

        assert!(!engine.is_cleanup_running());
        assert!(!engine.cancel_cleanup());
        assert!(engine.ensure_not_cancelled().is_ok());
        let result = engine.cleanup_duplicates(CleanupStrategy::Newest).unwrap();
        assert_eq!(result.objects_removed, 1);
    }

    #[test]
    fn test_deduplicator_trait() {
        let engine = engine(vec![obj("kb-1", "Disclose fees before onboarding", 0)]);
        let dedup: &dyn Deduplicator = &engine;
        let verdict = dedup
            .check(&KnowledgeObject::new("x", "disclose fees before onboarding"))
            .unwrap();
        assert!(verdict.is_duplicate);
        assert_eq!(dedup.fingerprint("a b c").unwrap().shingles.len(), 1);
    }
}
