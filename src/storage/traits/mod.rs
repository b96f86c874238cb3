//! Storage collaborator traits.

mod knowledge;

pub use knowledge::KnowledgeStore;
