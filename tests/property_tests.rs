//! Property-based tests for fingerprinting and classification.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Canonicalization is idempotent
//! - Fingerprints are deterministic and depend only on canonical content
//! - Similarity is symmetric and bounded
//! - Exact matches always win over near matches
//! - Cleanup leaves no duplicate pair behind

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use regdedup::services::deduplication::{
    DuplicateClassifier, FingerprintGenerator, PeerOrigin, canonicalize, jaccard_similarity,
};
use regdedup::storage::InMemoryStore;
use regdedup::{
    CleanupStrategy, DeduplicationConfig, DeduplicationEngine, KnowledgeObject, KnowledgeStore,
    MatchType, ObjectFilter,
};
use std::sync::Arc;

/// Short regulatory-flavoured sentences with punctuation and numbers.
fn content() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(vec![
            "report", "all", "cash", "transactions", "over", "$10,000", "within", "30",
            "days", "§", "5.3", "must", "be", "retained", "Banks", "SHALL", "file.", "wire,",
        ]),
        1..16,
    )
    .prop_map(|words| words.join(" "))
}

proptest! {
    /// Property: canonicalize(canonicalize(x)) == canonicalize(x).
    #[test]
    fn prop_canonicalize_idempotent(s in "\\PC{0,200}") {
        let once = canonicalize(&s);
        prop_assert_eq!(canonicalize(&once), once);
    }

    /// Property: the same content always yields the same fingerprint.
    #[test]
    fn prop_fingerprint_deterministic(s in content(), size in 1usize..6) {
        let generator = FingerprintGenerator::new(size);
        prop_assert_eq!(generator.fingerprint(&s), generator.fingerprint(&s));
    }

    /// Property: contents with the same canonical form share an exact hash.
    #[test]
    fn prop_case_and_spacing_do_not_change_hash(s in content()) {
        let generator = FingerprintGenerator::new(3);
        let noisy = format!("  {}  ", s.to_uppercase().replace(' ', "   "));
        prop_assert_eq!(
            generator.fingerprint(&s).exact_hash,
            generator.fingerprint(&noisy).exact_hash
        );
    }

    /// Property: similarity is symmetric and within [0, 1].
    #[test]
    fn prop_similarity_symmetric_and_bounded(a in content(), b in content(), size in 1usize..5) {
        let generator = FingerprintGenerator::new(size);
        let (fa, fb) = (generator.fingerprint(&a), generator.fingerprint(&b));
        let ab = jaccard_similarity(&fa, &fb);
        let ba = jaccard_similarity(&fb, &fa);
        prop_assert!((ab - ba).abs() < f64::EPSILON);
        prop_assert!((0.0..=1.0).contains(&ab));
    }

    /// Property: identical canonical content scores 1.0.
    #[test]
    fn prop_self_similarity_is_one(a in content()) {
        let generator = FingerprintGenerator::new(3);
        let fp = generator.fingerprint(&a);
        prop_assert!((jaccard_similarity(&fp, &fp) - 1.0).abs() < f64::EPSILON);
    }

    /// Property: an exact peer is reported even when a near peer comes first.
    #[test]
    fn prop_exact_match_has_priority(base in content(), extra in content()) {
        let classifier = DuplicateClassifier::new(&DeduplicationConfig::default().with_threshold(0.01));
        let candidate = KnowledgeObject::new("candidate", base.clone());
        prop_assume!(classifier.fingerprint(&base).is_ok());

        let near = KnowledgeObject::new("near", format!("{base} {extra}"));
        let exact = KnowledgeObject::new("exact", base.to_uppercase());
        prop_assume!(
            classifier.fingerprint(&near.content).unwrap().exact_hash
                != classifier.fingerprint(&base).unwrap().exact_hash
        );

        let peers = vec![
            classifier.index(&near, PeerOrigin::Store, None).unwrap(),
            classifier.index(&exact, PeerOrigin::Store, None).unwrap(),
        ];
        let verdict = classifier.classify(&candidate, &peers).unwrap().verdict;
        prop_assert_eq!(verdict.match_type, MatchType::Exact);
        let matched_object_id = verdict.matched_object_id.unwrap();
        prop_assert_eq!(matched_object_id.as_str(), "exact");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: after cleanup no remaining pair is a duplicate, and a second
    /// cleanup removes nothing.
    #[test]
    fn prop_cleanup_idempotent(contents in prop::collection::vec(content(), 1..12)) {
        let store = Arc::new(InMemoryStore::new());
        for c in &contents {
            let _ = store.create(KnowledgeObject::new("draft", c.clone()));
        }
        let config = DeduplicationConfig::default();
        let engine = DeduplicationEngine::new(Arc::clone(&store), config.clone()).unwrap();

        engine.cleanup_duplicates(CleanupStrategy::Newest).unwrap();
        let second = engine.cleanup_duplicates(CleanupStrategy::Newest).unwrap();
        prop_assert_eq!(second.objects_removed, 0);
        prop_assert_eq!(second.clusters_processed, 0);

        let classifier = DuplicateClassifier::new(&config);
        let remaining = store.list_objects(&ObjectFilter::default()).unwrap();
        for (i, a) in remaining.iter().enumerate() {
            for b in &remaining[i + 1..] {
                if let (Ok(fa), Ok(fb)) = (classifier.fingerprint(&a.content), classifier.fingerprint(&b.content)) {
                    prop_assert!(!classifier.is_duplicate_pair(&fa, &fb));
                }
            }
        }
    }
}
