//! Store listing filters.

use serde::{Deserialize, Serialize};

use super::KnowledgeObject;

/// Filter criteria for listing knowledge objects from a store.
///
/// Each populated field must match (case-insensitive); an empty filter
/// matches every object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectFilter {
    /// Required topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Required category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Required country.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Required regulation type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regulation_type: Option<String>,
}

impl ObjectFilter {
    /// Creates an empty filter (matches all).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            topic: None,
            category: None,
            country: None,
            regulation_type: None,
        }
    }

    /// Adds a topic constraint.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Adds a category constraint.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Adds a country constraint.
    #[must_use]
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// Adds a regulation type constraint.
    #[must_use]
    pub fn with_regulation_type(mut self, regulation_type: impl Into<String>) -> Self {
        self.regulation_type = Some(regulation_type.into());
        self
    }

    /// Returns true if the filter is empty (matches all).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.topic.is_none()
            && self.category.is_none()
            && self.country.is_none()
            && self.regulation_type.is_none()
    }

    /// Returns true if `object` satisfies every populated constraint.
    #[must_use]
    pub fn matches(&self, object: &KnowledgeObject) -> bool {
        field_matches(self.topic.as_deref(), object.topic.as_deref())
            && field_matches(self.category.as_deref(), object.category.as_deref())
            && field_matches(self.country.as_deref(), object.country.as_deref())
            && field_matches(
                self.regulation_type.as_deref(),
                object.regulation_type.as_deref(),
            )
    }
}

fn field_matches(wanted: Option<&str>, actual: Option<&str>) -> bool {
    match (wanted, actual) {
        (None, _) => true,
        (Some(w), Some(a)) => w.eq_ignore_ascii_case(a),
        (Some(_), None) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = ObjectFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&KnowledgeObject::new("kb-1", "text")));
    }

    #[test]
    fn test_country_filter_is_case_insensitive() {
        let filter = ObjectFilter::new().with_country("us");
        assert!(!filter.is_empty());
        assert!(filter.matches(&KnowledgeObject::new("kb-1", "text").with_country("US")));
        assert!(!filter.matches(&KnowledgeObject::new("kb-2", "text").with_country("DE")));
        assert!(!filter.matches(&KnowledgeObject::new("kb-3", "text")));
    }

    #[test]
    fn test_combined_constraints() {
        let filter = ObjectFilter::new()
            .with_country("UK")
            .with_regulation_type("guidance");
        let hit = KnowledgeObject::new("kb-1", "text")
            .with_country("UK")
            .with_regulation_type("Guidance");
        let miss = KnowledgeObject::new("kb-2", "text").with_country("UK");

        assert!(filter.matches(&hit));
        assert!(!filter.matches(&miss));
    }
}
