//! Business logic services.
//!
//! Services orchestrate the store collaborator and provide the high-level
//! deduplication operations.

pub mod deduplication;

pub use deduplication::DeduplicationEngine;
