//! Shingle-set similarity scoring.
//!
//! Near-duplicate detection uses the Jaccard index of two shingle sets:
//! `|A ∩ B| / |A ∪ B|`. Two empty sets are identical (score 1.0).
//!
//! Smaller shingle sizes make the score more forgiving: a single changed word
//! invalidates `shingle_size` windows, so lowering the size raises the score
//! of lightly edited text. Fingerprints are only comparable when they were
//! built with the same shingle size.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::fingerprint::Fingerprint;

/// Intersection and union counts behind a similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityBreakdown {
    /// Jaccard index in `[0, 1]`.
    pub score: f64,
    /// Shingles present in both sets.
    pub shared: usize,
    /// Shingles present in either set.
    pub union: usize,
}

impl SimilarityBreakdown {
    /// Orders two breakdowns by score using exact integer cross-multiplication,
    /// so ties are detected without float rounding.
    #[must_use]
    pub fn cmp_score(&self, other: &Self) -> Ordering {
        let (a_num, a_den) = self.fraction();
        let (b_num, b_den) = other.fraction();
        (a_num * b_den).cmp(&(b_num * a_den))
    }

    const fn fraction(&self) -> (u128, u128) {
        if self.union == 0 {
            (1, 1)
        } else {
            (self.shared as u128, self.union as u128)
        }
    }
}

/// Compares two fingerprints and returns the score with its counts.
///
/// Symmetric: `compare(a, b) == compare(b, a)`.
#[must_use]
pub fn compare(a: &Fingerprint, b: &Fingerprint) -> SimilarityBreakdown {
    let (small, large) = if a.shingles.len() <= b.shingles.len() {
        (&a.shingles, &b.shingles)
    } else {
        (&b.shingles, &a.shingles)
    };

    let shared = small.iter().filter(|s| large.contains(*s)).count();
    let union = a.shingles.len() + b.shingles.len() - shared;

    let score = if union == 0 {
        1.0
    } else {
        ratio(shared, union)
    };

    SimilarityBreakdown {
        score,
        shared,
        union,
    }
}

/// Jaccard similarity of two fingerprints' shingle sets.
///
/// # Example
///
/// ```rust
/// use regdedup::services::deduplication::{jaccard_similarity, FingerprintGenerator};
///
/// let generator = FingerprintGenerator::new(1);
/// let a = generator.fingerprint("report large cash deposits");
/// let b = generator.fingerprint("report large cash withdrawals");
/// assert!((jaccard_similarity(&a, &b) - 0.6).abs() < 1e-12);
/// ```
#[must_use]
pub fn jaccard_similarity(a: &Fingerprint, b: &Fingerprint) -> f64 {
    compare(a, b).score
}

#[allow(clippy::cast_precision_loss)] // shingle counts stay far below 2^52
fn ratio(numerator: usize, denominator: usize) -> f64 {
    numerator as f64 / denominator as f64
}
