//! Fusion layer: identity derivation and deduplicating merge
//!
//! Records from concurrent sources meet here. `identity` derives the dedup
//! key, `merge_store` folds same-identity records together. One canonical
//! algorithm for both; nothing upstream re-implements duplicate detection.

pub mod identity;
pub mod merge_store;

pub use identity::IdentityKey;
pub use merge_store::{FinalPool, MergeOutcome, MergeStore};
