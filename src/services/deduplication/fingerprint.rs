//! Content fingerprinting for deduplication.
//!
//! A fingerprint pairs a SHA256 digest of the canonical content (exact match
//! detection) with the set of word shingles of the canonical content (near
//! duplicate detection). Fingerprinting is a pure function of the content and
//! the shingle size, so identical canonical content yields identical
//! fingerprints across runs and machines.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use super::canonicalizer::Canonicalizer;

/// Default token n-gram length.
pub const DEFAULT_SHINGLE_SIZE: usize = 3;

/// Exact digest plus shingle set of a piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Lowercase hex SHA256 of the canonical content (64 characters).
    pub exact_hash: String,
    /// Space-joined token n-grams of the canonical content.
    pub shingles: BTreeSet<String>,
    /// Number of whitespace-separated tokens in the canonical content.
    pub token_count: usize,
    /// Shingle size the set was built with.
    pub shingle_size: usize,
}

impl Fingerprint {
    /// Returns the short tag form of the exact hash: `sha256:<16-char-prefix>`.
    #[must_use]
    pub fn hash_tag(&self) -> String {
        let prefix_len = self.exact_hash.len().min(16);
        format!("sha256:{}", &self.exact_hash[..prefix_len])
    }

    /// Returns true if both fingerprints carry the same exact digest.
    #[must_use]
    pub fn is_exact_match(&self, other: &Self) -> bool {
        self.exact_hash == other.exact_hash
    }
}

/// Produces fingerprints from raw content.
///
/// # Example
///
/// ```rust
/// use regdedup::services::deduplication::FingerprintGenerator;
///
/// let generator = FingerprintGenerator::new(3);
/// let fp = generator.fingerprint("Banks must report cash deposits.");
/// assert_eq!(fp.exact_hash.len(), 64);
/// assert_eq!(fp.token_count, 5);
/// assert!(fp.shingles.contains("banks must report"));
///
/// // Canonically equal content yields the same digest.
/// let again = generator.fingerprint("  BANKS must report cash deposits ");
/// assert_eq!(fp.exact_hash, again.exact_hash);
/// ```
#[derive(Debug, Clone)]
pub struct FingerprintGenerator {
    canonicalizer: Canonicalizer,
    shingle_size: usize,
}

impl FingerprintGenerator {
    /// Creates a generator with the default canonicalizer.
    ///
    /// A shingle size of zero is treated as one.
    #[must_use]
    pub fn new(shingle_size: usize) -> Self {
        Self {
            canonicalizer: Canonicalizer::default(),
            shingle_size: shingle_size.max(1),
        }
    }

    /// Replaces the canonicalizer.
    #[must_use]
    pub fn with_canonicalizer(mut self, canonicalizer: Canonicalizer) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    /// Returns the shingle size in use.
    #[must_use]
    pub const fn shingle_size(&self) -> usize {
        self.shingle_size
    }

    /// Returns the canonical form of `content`.
    #[must_use]
    pub fn canonicalize(&self, content: &str) -> String {
        self.canonicalizer.canonicalize(content)
    }

    /// Fingerprints raw content.
    #[must_use]
    pub fn fingerprint(&self, content: &str) -> Fingerprint {
        let canonical = self.canonicalize(content);
        self.fingerprint_canonical(&canonical)
    }

    /// Fingerprints content that is already canonical.
    #[must_use]
    pub fn fingerprint_canonical(&self, canonical: &str) -> Fingerprint {
        let tokens: Vec<&str> = canonical.split_whitespace().collect();
        Fingerprint {
            exact_hash: hash(canonical),
            shingles: shingles(&tokens, self.shingle_size),
            token_count: tokens.len(),
            shingle_size: self.shingle_size,
        }
    }
}

impl Default for FingerprintGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SHINGLE_SIZE)
    }
}

/// Lowercase hex SHA256 of `canonical`.
#[must_use]
pub fn hash(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Overlapping `size`-token windows of `tokens`.
///
/// Fewer tokens than `size` yields a single shingle of all tokens; no tokens
/// yields an empty set.
#[must_use]
pub fn shingles(tokens: &[&str], size: usize) -> BTreeSet<String> {
    if tokens.is_empty() {
        return BTreeSet::new();
    }
    let size = size.max(1);
    if tokens.len() < size {
        return BTreeSet::from([tokens.join(" ")]);
    }
    tokens.windows(size).map(|window| window.join(" ")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_produces_64_char_hex() {
        let fp = FingerprintGenerator::default().fingerprint("test content");
        assert_eq!(fp.exact_hash.len(), 64);
        assert!(fp.exact_hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_same_content_same_fingerprint() {
        let generator = FingerprintGenerator::new(2);
        let a = generator.fingerprint("Report all wire transfers");
        let b = generator.fingerprint("Report all wire transfers");
        assert_eq!(a, b);
    }

    #[test]
    fn test_canonical_equivalents_share_hash() {
        let generator = FingerprintGenerator::default();
        let a = generator.fingerprint("All transactions over $10,000 must be reported");
        let b = generator.fingerprint("All transactions over $10,000 must be reported.");
        assert!(a.is_exact_match(&b));
        assert_eq!(a.shingles, b.shingles);
    }

    #[test]
    fn test_different_content_different_hash() {
        let generator = FingerprintGenerator::default();
        let a = generator.fingerprint("Retain records for five years");
        let b = generator.fingerprint("Retain records for seven years");
        assert!(!a.is_exact_match(&b));
    }

    #[test]
    fn test_shingle_windows() {
        let set = shingles(&["a", "b", "c", "d"], 2);
        let expected: BTreeSet<String> = ["a b", "b c", "c d"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(set, expected);
    }

    #[test]
    fn test_short_content_is_single_shingle() {
        let fp = FingerprintGenerator::new(5).fingerprint("Know your customer");
        assert_eq!(fp.token_count, 3);
        assert_eq!(fp.shingles.len(), 1);
        assert!(fp.shingles.contains("know your customer"));
    }

    #[test]
    fn test_exact_length_content_is_single_window() {
        let set = shingles(&["a", "b", "c"], 3);
        assert_eq!(set.len(), 1);
        assert!(set.contains("a b c"));
    }

    #[test]
    fn test_empty_content_has_no_shingles() {
        let fp = FingerprintGenerator::default().fingerprint("  ...  ");
        assert_eq!(fp.token_count, 0);
        assert!(fp.shingles.is_empty());
        assert_eq!(fp.exact_hash.len(), 64);
    }

    #[test]
    fn test_repeated_windows_collapse() {
        let set = shingles(&["a", "a", "a", "a"], 2);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_zero_shingle_size_treated_as_one() {
        let generator = FingerprintGenerator::new(0);
        assert_eq!(generator.shingle_size(), 1);
        let fp = generator.fingerprint("one two");
        assert_eq!(fp.shingles.len(), 2);
    }

    #[test]
    fn test_hash_tag_format() {
        let fp = FingerprintGenerator::default().fingerprint("test");
        let tag = fp.hash_tag();
        assert!(tag.starts_with("sha256:"));
        assert_eq!(tag.len(), "sha256:".len() + 16);
    }

    #[test]
    fn test_known_digest_of_empty_canonical() {
        assert_eq!(
            hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
