//! Knowledge store trait.

use crate::Result;
use crate::models::{KnowledgeObject, ObjectFilter, ObjectId};
use std::collections::BTreeSet;

/// The persistence collaborator the engine reads peers from and asks to
/// remove redundant objects.
///
/// Implementations are the sole writers of `id`, `created_at`, and
/// `updated_at`; ids must be unique and `created_at` assigned monotonically
/// at creation. Failures of any kind should be reported as
/// [`crate::Error::StoreUnavailable`]; the engine maps anything else to it.
///
/// Calls must be bounded: a store that talks to a network or database is
/// expected to enforce its own timeout and return an error rather than block.
pub trait KnowledgeStore: Send + Sync {
    /// Short backend name used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Lists objects matching `filter`.
    fn list_objects(&self, filter: &ObjectFilter) -> Result<Vec<KnowledgeObject>>;

    /// Removes the given objects and returns how many were removed.
    ///
    /// Unknown ids are ignored.
    fn remove_objects(&self, ids: &BTreeSet<ObjectId>) -> Result<usize>;

    /// Counts objects matching `filter`.
    fn count(&self, filter: &ObjectFilter) -> Result<usize> {
        Ok(self.list_objects(filter)?.len())
    }
}
