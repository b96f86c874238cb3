//! Content canonicalization.
//!
//! Turns raw regulatory text into the comparison-ready form that both the
//! exact digest and the shingle set are computed from.

use std::collections::BTreeSet;

/// Characters kept verbatim by default.
pub const DEFAULT_KEEP: [char; 3] = ['%', '§', '$'];

/// Separators kept only between two ASCII digits (`10,000`, `3.5`).
pub const DEFAULT_NUMERIC_SEPARATORS: [char; 2] = ['.', ','];

/// Normalizes content for fingerprinting.
///
/// # Normalization
///
/// 1. Lower-cases the text (Unicode aware)
/// 2. Keeps letters, digits, combining marks and the allow-listed symbols
/// 3. Keeps numeric separators only when both neighbours are ASCII digits
/// 4. Replaces everything else with whitespace
/// 5. Collapses whitespace runs to one space and trims
///
/// The function is total and idempotent:
/// `canonicalize(canonicalize(x)) == canonicalize(x)`.
///
/// # Example
///
/// ```rust
/// use regdedup::services::deduplication::Canonicalizer;
///
/// let canonicalizer = Canonicalizer::default();
/// assert_eq!(
///     canonicalizer.canonicalize("  All transactions over $10,000 must be REPORTED. "),
///     "all transactions over $10,000 must be reported"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonicalizer {
    keep: BTreeSet<char>,
    numeric_separators: BTreeSet<char>,
}

impl Canonicalizer {
    /// Creates a canonicalizer with a custom allow-list.
    #[must_use]
    pub fn new(
        keep: impl IntoIterator<Item = char>,
        numeric_separators: impl IntoIterator<Item = char>,
    ) -> Self {
        Self {
            keep: keep.into_iter().collect(),
            numeric_separators: numeric_separators.into_iter().collect(),
        }
    }

    /// Returns the canonical form of `content`.
    #[must_use]
    pub fn canonicalize(&self, content: &str) -> String {
        let lowered: Vec<char> = content.to_lowercase().chars().collect();
        let mut out = String::with_capacity(lowered.len());
        let mut pending_space = false;

        for (i, &c) in lowered.iter().enumerate() {
            if self.is_kept(&lowered, i, c) {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
            } else {
                pending_space = true;
            }
        }

        out
    }

    fn is_kept(&self, chars: &[char], i: usize, c: char) -> bool {
        if c.is_alphanumeric() || is_combining_mark(c) || self.keep.contains(&c) {
            return true;
        }
        if !self.numeric_separators.contains(&c) {
            return false;
        }
        let before = i.checked_sub(1).and_then(|j| chars.get(j));
        let after = chars.get(i + 1);
        matches!((before, after), (Some(b), Some(a)) if b.is_ascii_digit() && a.is_ascii_digit())
    }
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::new(DEFAULT_KEEP, DEFAULT_NUMERIC_SEPARATORS)
    }
}

const fn is_combining_mark(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036F}')
}

/// Canonicalizes with the default allow-list.
#[must_use]
pub fn canonicalize(content: &str) -> String {
    Canonicalizer::default().canonicalize(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_and_whitespace_collapse() {
        assert_eq!(canonicalize("  Hello   WORLD  "), "hello world");
        assert_eq!(canonicalize("line one\nline\ttwo"), "line one line two");
    }

    #[test]
    fn test_trailing_period_is_stripped() {
        let a = canonicalize("All transactions over $10,000 must be reported");
        let b = canonicalize("All transactions over $10,000 must be reported.");
        assert_eq!(a, b);
        assert_eq!(a, "all transactions over $10,000 must be reported");
    }

    #[test]
    fn test_numeric_separators_survive_between_digits() {
        assert_eq!(canonicalize("Rate: 3.5% p.a."), "rate 3.5% p a");
        assert_eq!(canonicalize("1, 2, 3"), "1 2 3");
        assert_eq!(canonicalize("v1.x"), "v1 x");
    }

    #[test]
    fn test_section_sign_is_kept() {
        assert_eq!(canonicalize("See §12(b)(3)."), "see §12 b 3");
    }

    #[test]
    fn test_punctuation_only_is_empty() {
        assert_eq!(canonicalize("--- ... !!!"), "");
        assert_eq!(canonicalize(""), "");
    }

    #[test]
    fn test_unicode_letters_preserved() {
        assert_eq!(canonicalize("Straße – GEBÜHR"), "straße gebühr");
        assert_eq!(canonicalize("数据 保护"), "数据 保护");
    }

    #[test]
    fn test_idempotent_on_samples() {
        for sample in [
            "All transactions over $10,000 must be reported.",
            "  Art. 5(1)(a) GDPR: lawfulness, fairness & transparency ",
            "1.2.3 -- 4,5 ; 6..7",
            "İstanbul ΑΣ-Β",
        ] {
            let once = canonicalize(sample);
            assert_eq!(canonicalize(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn test_custom_allow_list() {
        let canonicalizer = Canonicalizer::new(['#'], std::iter::empty());
        assert_eq!(canonicalizer.canonicalize("Rule #4: 3.5%"), "rule #4 3 5");
    }
}
