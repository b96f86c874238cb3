//! Confidence and review status of knowledge objects.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence level attached to a knowledge object by its source.
///
/// An object without a confidence is treated as low confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Medium confidence.
    #[serde(alias = "Medium", alias = "MEDIUM")]
    Medium,
    /// High confidence.
    #[serde(alias = "High", alias = "HIGH")]
    High,
}

impl Confidence {
    /// Returns the confidence as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Ordinal rank used by trust ordering. Absent confidence ranks lowest.
    #[must_use]
    pub const fn rank(confidence: Option<Self>) -> u8 {
        match confidence {
            None => 0,
            Some(Self::Medium) => 1,
            Some(Self::High) => 2,
        }
    }

    /// Parses a confidence from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Review lifecycle of a knowledge object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStatus {
    /// Ingested, not yet reviewed.
    #[default]
    #[serde(alias = "pending-review", alias = "pending")]
    PendingReview,
    /// Reviewed and approved.
    Validated,
    /// Serving downstream compliance workflows.
    Deployed,
}

impl ObjectStatus {
    /// Returns the status as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PendingReview => "pending_review",
            Self::Validated => "validated",
            Self::Deployed => "deployed",
        }
    }

    /// Ordinal rank used by trust ordering: deployed > validated > pending review.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::PendingReview => 0,
            Self::Validated => 1,
            Self::Deployed => 2,
        }
    }

    /// Parses a status from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending_review" | "pending-review" | "pending" => Some(Self::PendingReview),
            "validated" => Some(Self::Validated),
            "deployed" => Some(Self::Deployed),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
