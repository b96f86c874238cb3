//! Cleanup retention strategies.

use crate::models::{Confidence, KnowledgeObject};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Policy that picks the one survivor of a duplicate cluster.
///
/// | Strategy | Primary key | Tie-breaks |
/// |----------|-------------|------------|
/// | `newest` | max `created_at` | max `id` |
/// | `oldest` | min `created_at` | max `id` |
/// | `highest-trust` | max confidence rank, then max status rank | max `created_at`, then max `id` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupStrategy {
    /// Keep the most recently created object.
    Newest,
    /// Keep the earliest created object.
    Oldest,
    /// Keep the most trusted object.
    #[serde(alias = "highest_trust", alias = "highestTrust")]
    HighestTrust,
}

impl CleanupStrategy {
    /// Returns the strategy as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::HighestTrust => "highest-trust",
        }
    }

    /// Picks the survivor among `members`.
    ///
    /// Returns `None` only for an empty slice.
    #[must_use]
    pub fn select_survivor<'a>(&self, members: &[&'a KnowledgeObject]) -> Option<&'a KnowledgeObject> {
        members
            .iter()
            .copied()
            .max_by(|a, b| self.compare(a, b))
    }

    /// Orders two objects so that the preferred survivor is the greater one.
    fn compare(&self, a: &KnowledgeObject, b: &KnowledgeObject) -> Ordering {
        match self {
            Self::Newest => a
                .created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id)),
            Self::Oldest => b
                .created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id)),
            Self::HighestTrust => trust_rank(a)
                .cmp(&trust_rank(b))
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id)),
        }
    }
}

/// Ordinal trust score: confidence rank first, status rank second.
#[must_use]
pub const fn trust_rank(object: &KnowledgeObject) -> (u8, u8) {
    (Confidence::rank(object.confidence), object.status.rank())
}

impl fmt::Display for CleanupStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CleanupStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "highest-trust" | "highest_trust" | "highesttrust" => Ok(Self::HighestTrust),
            other => Err(Error::InvalidInput(format!(
                "unknown cleanup strategy '{other}' (expected newest, oldest, highest-trust)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ObjectStatus;
    use chrono::{Duration, TimeZone, Utc};
    use test_case::test_case;

    fn at(minutes: i64) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn obj(id: &str, minutes: i64) -> KnowledgeObject {
        KnowledgeObject::new(id, "content").with_created_at(at(minutes))
    }

    #[test_case("newest", CleanupStrategy::Newest)]
    #[test_case("OLDEST", CleanupStrategy::Oldest)]
    #[test_case("highest-trust", CleanupStrategy::HighestTrust)]
    #[test_case("highest_trust", CleanupStrategy::HighestTrust)]
    fn test_parse(input: &str, expected: CleanupStrategy) {
        assert_eq!(input.parse::<CleanupStrategy>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_is_invalid_input() {
        let err = "largest".parse::<CleanupStrategy>().unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_newest_and_oldest() {
        let a = obj("a", 1);
        let b = obj("b", 5);
        let c = obj("c", 3);
        let members = [&a, &b, &c];

        assert_eq!(
            CleanupStrategy::Newest.select_survivor(&members).unwrap().id.as_str(),
            "b"
        );
        assert_eq!(
            CleanupStrategy::Oldest.select_survivor(&members).unwrap().id.as_str(),
            "a"
        );
    }

    #[test]
    fn test_timestamp_ties_break_on_max_id() {
        let a = obj("kb-a", 1);
        let z = obj("kb-z", 1);
        let members = [&a, &z];

        assert_eq!(
            CleanupStrategy::Newest.select_survivor(&members).unwrap().id.as_str(),
            "kb-z"
        );
        assert_eq!(
            CleanupStrategy::Oldest.select_survivor(&members).unwrap().id.as_str(),
            "kb-z"
        );
    }

    #[test]
    fn test_highest_trust_confidence_beats_status() {
        let medium = obj("medium", 10)
            .with_confidence(Confidence::Medium)
            .with_status(ObjectStatus::Validated);
        let high = obj("high", 1)
            .with_confidence(Confidence::High)
            .with_status(ObjectStatus::PendingReview);

        let survivor = CleanupStrategy::HighestTrust
            .select_survivor(&[&medium, &high])
            .unwrap();
        assert_eq!(survivor.id.as_str(), "high");
    }

    #[test]
    fn test_highest_trust_falls_back_to_status_then_recency() {
        let deployed = obj("deployed", 1).with_status(ObjectStatus::Deployed);
        let pending = obj("pending", 9);
        assert_eq!(
            CleanupStrategy::HighestTrust
                .select_survivor(&[&pending, &deployed])
                .unwrap()
                .id
                .as_str(),
            "deployed"
        );

        let older = obj("older", 1).with_confidence(Confidence::Medium);
        let newer = obj("newer", 2).with_confidence(Confidence::Medium);
        assert_eq!(
            CleanupStrategy::HighestTrust
                .select_survivor(&[&older, &newer])
                .unwrap()
                .id
                .as_str(),
            "newer"
        );
    }

    #[test]
    fn test_absent_confidence_ranks_lowest() {
        let unrated = obj("unrated", 5).with_status(ObjectStatus::Deployed);
        let medium = obj("medium", 1);
        let medium = medium.with_confidence(Confidence::Medium);
        assert_eq!(
            CleanupStrategy::HighestTrust
                .select_survivor(&[&unrated, &medium])
                .unwrap()
                .id
                .as_str(),
            "medium"
        );
    }

    #[test]
    fn test_empty_members() {
        assert!(CleanupStrategy::Newest.select_survivor(&[]).is_none());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&CleanupStrategy::HighestTrust).unwrap(),
            "\"highest-trust\""
        );
        let parsed: CleanupStrategy = serde_json::from_str("\"highest_trust\"").unwrap();
        assert_eq!(parsed, CleanupStrategy::HighestTrust);
    }
}
