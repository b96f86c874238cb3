//! Duplicate classification.
//!
//! Compares a candidate fingerprint against an ordered sequence of peers and
//! turns the best match into a [`DuplicateVerdict`].
//!
//! # Algorithm
//!
//! 1. Peers with the candidate's own id are skipped.
//! 2. The first peer (in the caller's order) with the same exact hash wins
//!    immediately with `match_type = exact`.
//! 3. Otherwise the highest-scoring peer is tracked. Ties go to the peer with
//!    the earliest `created_at`, then the smallest `id`.
//! 4. A best score at or above the threshold yields `near`; anything else is
//!    `none`.

use crate::models::KnowledgeObject;
use crate::{Error, Result};
use std::cmp::Ordering;

use super::config::DeduplicationConfig;
use super::fingerprint::{Fingerprint, FingerprintGenerator};
use super::similarity::{self, SimilarityBreakdown};
use super::types::{DuplicateVerdict, MatchSignal, MetadataField, PeerOrigin, VerdictReason};

/// A peer with its precomputed fingerprint.
#[derive(Debug, Clone)]
pub struct IndexedPeer {
    /// The peer object.
    pub object: KnowledgeObject,
    /// Its fingerprint under the current shingle size.
    pub fingerprint: Fingerprint,
    /// Where it came from.
    pub origin: PeerOrigin,
    /// Input position, for batch peers.
    pub batch_index: Option<usize>,
}

/// Verdict plus the batch position of the matched peer.
#[derive(Debug, Clone)]
pub struct Classification {
    /// The verdict.
    pub verdict: DuplicateVerdict,
    /// Set when the matched peer is an earlier batch item.
    pub matched_batch_index: Option<usize>,
}

/// Applies a configuration snapshot to fingerprints.
#[derive(Debug, Clone)]
pub struct DuplicateClassifier {
    generator: FingerprintGenerator,
    threshold: f64,
    max_content_bytes: usize,
    config_fingerprint: String,
}

impl DuplicateClassifier {
    /// Creates a classifier bound to `config`.
    ///
    /// The config is assumed valid; the engine validates it on every update.
    #[must_use]
    pub fn new(config: &DeduplicationConfig) -> Self {
        Self {
            generator: FingerprintGenerator::new(config.shingle_size),
            threshold: config.near_duplicate_threshold,
            max_content_bytes: config.max_content_bytes,
            config_fingerprint: config.fingerprint(),
        }
    }

    /// Returns the threshold in effect.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Validates content and returns its fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the content is empty, contains NUL
    /// bytes, exceeds the size limit, or has no comparable tokens.
    pub fn fingerprint(&self, content: &str) -> Result<Fingerprint> {
        if content.trim().is_empty() {
            return Err(Error::InvalidInput("content is empty".to_string()));
        }
        if content.contains('\0') {
            return Err(Error::InvalidInput("content contains NUL bytes".to_string()));
        }
        if content.len() > self.max_content_bytes {
            return Err(Error::InvalidInput(format!(
                "content is {} bytes, limit is {}",
                content.len(),
                self.max_content_bytes
            )));
        }
        let canonical = self.generator.canonicalize(content);
        if canonical.is_empty() {
            return Err(Error::InvalidInput(
                "content has no comparable tokens".to_string(),
            ));
        }
        Ok(self.generator.fingerprint_canonical(&canonical))
    }

    /// Fingerprints `object` for use as a peer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the object's content is invalid.
    pub fn index(
        &self,
        object: &KnowledgeObject,
        origin: PeerOrigin,
        batch_index: Option<usize>,
    ) -> Result<IndexedPeer> {
        Ok(IndexedPeer {
            fingerprint: self.fingerprint(&object.content)?,
            object: object.clone(),
            origin,
            batch_index,
        })
    }

    /// Classifies `candidate` against `peers`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the candidate's content is invalid.
    pub fn classify<'a>(
        &self,
        candidate: &KnowledgeObject,
        peers: impl IntoIterator<Item = &'a IndexedPeer>,
    ) -> Result<Classification> {
        let fingerprint = self.fingerprint(&candidate.content)?;
        Ok(self.classify_fingerprint(candidate, &fingerprint, peers))
    }

    /// Classifies an already fingerprinted candidate. Never fails.
    #[must_use]
    pub fn classify_fingerprint<'a>(
        &self,
        candidate: &KnowledgeObject,
        fingerprint: &Fingerprint,
        peers: impl IntoIterator<Item = &'a IndexedPeer>,
    ) -> Classification {
        let mut compared = 0usize;
        let mut best: Option<(&IndexedPeer, SimilarityBreakdown)> = None;
        let mut tied = 0usize;

        for peer in peers {
            // Batch peers are earlier items; drafts often share a placeholder id.
            if peer.origin == PeerOrigin::Store && peer.object.id == candidate.id {
                continue;
            }
            compared += 1;

            if fingerprint.is_exact_match(&peer.fingerprint) {
                let breakdown = similarity::compare(fingerprint, &peer.fingerprint);
                let reason = self.reason(
                    MatchSignal::ExactHash,
                    candidate,
                    fingerprint,
                    Some((peer, breakdown)),
                    compared,
                    1,
                );
                return Classification {
                    verdict: DuplicateVerdict::exact(
                        peer.object.id.clone(),
                        reason,
                        self.config_fingerprint.clone(),
                    ),
                    matched_batch_index: peer.batch_index,
                };
            }

            let breakdown = similarity::compare(fingerprint, &peer.fingerprint);
            match best {
                None => {
                    best = Some((peer, breakdown));
                    tied = 1;
                },
                Some((current, current_breakdown)) => {
                    match breakdown.cmp_score(&current_breakdown) {
                        Ordering::Greater => {
                            best = Some((peer, breakdown));
                            tied = 1;
                        },
                        Ordering::Equal => {
                            tied += 1;
                            if precedes(peer, current) {
                                best = Some((peer, breakdown));
                            }
                        },
                        Ordering::Less => {},
                    }
                },
            }
        }

        let Some((peer, breakdown)) = best else {
            let reason = VerdictReason::no_peers(
                fingerprint.exact_hash.clone(),
                self.threshold,
                self.generator.shingle_size(),
            );
            return Classification {
                verdict: DuplicateVerdict::not_duplicate(
                    0.0,
                    reason,
                    self.config_fingerprint.clone(),
                ),
                matched_batch_index: None,
            };
        };

        if breakdown.score >= self.threshold {
            let reason = self.reason(
                MatchSignal::ShingleSimilarity,
                candidate,
                fingerprint,
                Some((peer, breakdown)),
                compared,
                tied,
            );
            Classification {
                verdict: DuplicateVerdict::near(
                    peer.object.id.clone(),
                    breakdown.score,
                    reason,
                    self.config_fingerprint.clone(),
                ),
                matched_batch_index: peer.batch_index,
            }
        } else {
            let reason = self.reason(
                MatchSignal::BelowThreshold,
                candidate,
                fingerprint,
                Some((peer, breakdown)),
                compared,
                tied,
            );
            Classification {
                verdict: DuplicateVerdict::not_duplicate(
                    breakdown.score,
                    reason,
                    self.config_fingerprint.clone(),
                ),
                matched_batch_index: None,
            }
        }
    }

    /// Returns true if two fingerprints are duplicates under this snapshot.
    #[must_use]
    pub fn is_duplicate_pair(&self, a: &Fingerprint, b: &Fingerprint) -> bool {
        a.is_exact_match(b) || similarity::jaccard_similarity(a, b) >= self.threshold
    }

    fn reason(
        &self,
        signal: MatchSignal,
        candidate: &KnowledgeObject,
        fingerprint: &Fingerprint,
        best: Option<(&IndexedPeer, SimilarityBreakdown)>,
        peers_compared: usize,
        tied_peers: usize,
    ) -> VerdictReason {
        let mut reason = VerdictReason::no_peers(
            fingerprint.exact_hash.clone(),
            self.threshold,
            self.generator.shingle_size(),
        );
        reason.signal = signal;
        reason.peers_compared = peers_compared;
        reason.tied_peers = tied_peers;
        if let Some((peer, breakdown)) = best {
            reason.matched_hash = Some(peer.fingerprint.exact_hash.clone());
            reason.peer_origin = Some(peer.origin);
            reason.shared_shingles = breakdown.shared;
            reason.union_shingles = breakdown.union;
            reason.metadata_agreement = metadata_agreement(candidate, &peer.object);
        }
        reason
    }
}

/// Near-tie order: earliest `created_at`, then smallest `id`.
fn precedes(a: &IndexedPeer, b: &IndexedPeer) -> bool {
    a.object
        .created_at
        .cmp(&b.object.created_at)
        .then_with(|| a.object.id.cmp(&b.object.id))
        == Ordering::Less
}

/// Metadata fields present on both objects with equal values.
#[must_use]
pub fn metadata_agreement(a: &KnowledgeObject, b: &KnowledgeObject) -> Vec<MetadataField> {
    let mut agreed = Vec::new();
    let text_fields = [
        (MetadataField::Topic, &a.topic, &b.topic),
        (MetadataField::Category, &a.category, &b.category),
        (MetadataField::Country, &a.country, &b.country),
        (
            MetadataField::RegulationType,
            &a.regulation_type,
            &b.regulation_type,
        ),
    ];
    for (field, left, right) in text_fields {
        if let (Some(l), Some(r)) = (left, right)
            && l.trim().eq_ignore_ascii_case(r.trim())
        {
            agreed.push(field);
        }
    }
    if let (Some(l), Some(r)) = (a.effective_date, b.effective_date)
        && l == r
    {
        agreed.push(MetadataField::EffectiveDate);
    }
    agreed
}
