//! Storage collaborators.
//!
//! The engine only needs two things from persistence: list objects and remove
//! objects. [`KnowledgeStore`] captures that contract; the implementations
//! here cover tests, the CLI, and fault isolation:
//!
//! - [`InMemoryStore`]: map behind a lock
//! - [`FileStore`]: one JSON document on disk
//! - [`ResilientStore`]: circuit breaker around any other store

pub mod filesystem;
pub mod memory;
pub mod resilience;
pub mod traits;

pub use filesystem::FileStore;
pub use memory::InMemoryStore;
pub use resilience::{CircuitBreaker, ResilientStore, StoreResilienceConfig};
pub use traits::KnowledgeStore;

use chrono::{DateTime, Duration, Utc};

/// Next creation timestamp: now, or one microsecond after `last` if the clock
/// has not moved past it.
pub(crate) fn next_created_at(last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match last {
        Some(last) if now <= last => last + Duration::microseconds(1),
        _ => now,
    }
}
