//! Knowledge object types and identifiers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Confidence, ObjectStatus};

/// Opaque identifier of a knowledge object, assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Creates a new object ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a time-ordered identifier.
    ///
    /// Only store implementations call this; the engine never mints ids.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A regulatory knowledge object: the unit of deduplication.
///
/// `content` is the only input to fingerprinting. The classification metadata
/// (`topic`, `category`, `country`, `regulation_type`, `effective_date`) is
/// reported in verdict traces but never creates or breaks a duplicate verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeObject {
    /// Store-assigned identifier; drafts without one get a fresh id.
    #[serde(default = "ObjectId::generate")]
    pub id: ObjectId,
    /// Text body.
    pub content: String,
    /// Subject area.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Classification category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Jurisdiction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Kind of regulation (statute, guidance, interpretation, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regulation_type: Option<String>,
    /// Date the regulation takes effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<NaiveDate>,
    /// Source confidence; absent means low.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    /// Review status.
    #[serde(default)]
    pub status: ObjectStatus,
    /// Creation timestamp, assigned by the store.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Last update timestamp, assigned by the store.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeObject {
    /// Creates an object with the given id and content, timestamped now.
    #[must_use]
    pub fn new(id: impl Into<ObjectId>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            content: content.into(),
            topic: None,
            category: None,
            country: None,
            regulation_type: None,
            effective_date: None,
            confidence: None,
            status: ObjectStatus::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the topic.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Sets the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sets the country.
    #[must_use]
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// Sets the regulation type.
    #[must_use]
    pub fn with_regulation_type(mut self, regulation_type: impl Into<String>) -> Self {
        self.regulation_type = Some(regulation_type.into());
        self
    }

    /// Sets the effective date.
    #[must_use]
    pub const fn with_effective_date(mut self, date: NaiveDate) -> Self {
        self.effective_date = Some(date);
        self
    }

    /// Sets the confidence.
    #[must_use]
    pub const fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Sets the review status.
    #[must_use]
    pub const fn with_status(mut self, status: ObjectStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets both timestamps to `created_at`.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = created_at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_object_id_ordering_is_lexicographic() {
        assert!(ObjectId::new("a-2") > ObjectId::new("a-10"));
        assert_eq!(ObjectId::from("kb-1").as_str(), "kb-1");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(ObjectId::generate(), ObjectId::generate());
    }

    #[test]
    fn test_builder() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let obj = KnowledgeObject::new("kb-1", "Report suspicious activity.")
            .with_country("US")
            .with_confidence(Confidence::High)
            .with_status(ObjectStatus::Deployed)
            .with_created_at(at);

        assert_eq!(obj.country.as_deref(), Some("US"));
        assert_eq!(obj.confidence, Some(Confidence::High));
        assert_eq!(obj.status, ObjectStatus::Deployed);
        assert_eq!(obj.created_at, at);
        assert_eq!(obj.updated_at, at);
    }

    #[test]
    fn test_deserialize_camel_case_with_defaults() {
        let json = r#"{
            "id": "kb-7",
            "content": "Banks must retain records for five years.",
            "regulationType": "statute",
            "effectiveDate": "2025-01-01",
            "confidence": "Medium",
            "createdAt": "2024-05-01T00:00:00Z",
            "updatedAt": "2024-05-02T00:00:00Z"
        }"#;
        let obj: KnowledgeObject = serde_json::from_str(json).unwrap();

        assert_eq!(obj.id, ObjectId::new("kb-7"));
        assert_eq!(obj.regulation_type.as_deref(), Some("statute"));
        assert_eq!(obj.confidence, Some(Confidence::Medium));
        assert_eq!(obj.status, ObjectStatus::PendingReview);
        assert!(obj.topic.is_none());
    }

    #[test]
    fn test_deserialize_draft_without_id_or_timestamps() {
        let obj: KnowledgeObject =
            serde_json::from_str(r#"{"content": "Filings are due quarterly."}"#).unwrap();
        assert!(!obj.id.as_str().is_empty());
        assert!(obj.created_at <= Utc::now());
    }
}
