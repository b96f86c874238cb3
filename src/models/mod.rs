//! Data models for regdedup.
//!
//! Knowledge objects are owned by the external store; the engine only reads
//! them and asks the store to remove the ones it decides are redundant.

mod classification;
mod filter;
mod knowledge;

pub use classification::{Confidence, ObjectStatus};
pub use filter::ObjectFilter;
pub use knowledge::{KnowledgeObject, ObjectId};
