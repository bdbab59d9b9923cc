//! SegAdmit Metadata Store - versioned segment records
//!
//! This crate defines the compare-and-swap store the admission protocol
//! coordinates through, plus an in-memory and a redb-backed implementation.

pub mod memory;
pub mod persistent;
pub mod store;
pub mod tables;
pub mod types;

// Re-exports
pub use memory::MemoryMetaStore;
pub use persistent::RedbMetaStore;
pub use store::{MetaStoreError, MetaStoreResult, VersionedMetadataStore};
pub use types::{CasOutcome, ExpectedVersion, SegmentRecord, StoreVersion, Versioned};
