//! Core data model definitions shared across adgate crates.
#![allow(missing_docs)]

pub mod ad;
pub mod content;
pub mod error;
pub mod ids;
pub mod queue;

// Intentionally curated re-exports for downstream consumers.
pub use ad::{
    AdDescriptor, AdRecord, MAX_OCCURRENCES, Occurrences, TimingOverrides,
};
pub use content::{ContentKind, ContentSelection};
pub use error::{ModelError, Result as ModelResult};
pub use ids::{AdId, ContentId};
pub use queue::{AdQueue, QueueEntry};
