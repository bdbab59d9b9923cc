//! SegAdmit Upload - segment admission protocol
//!
//! This crate decides, for every uploaded segment, whether it is new, a
//! refresh of an existing segment, or a conflicting concurrent upload,
//! and commits the outcome through the versioned metadata store:
//! - Conditional admission on the expected crc (`If-Match`)
//! - Upload lock kept in the segment record, with stale-lock takeover
//! - Reconciliation of content, timestamps and custom metadata
//! - Compensating lock release on every failure path

pub mod clock;
pub mod coordinator;
pub mod crc;
pub mod custom_map;
pub mod headers;
pub mod lock;
pub mod reconcile;
pub mod request;
pub mod resource;
pub mod stats;

#[cfg(test)]
mod testing;

// Re-exports
pub use clock::{Clock, SystemClock};
pub use coordinator::UploadCoordinator;
pub use custom_map::{CustomMapModifier, ModifyMode};
pub use headers::UploadHeaders;
pub use lock::{LockDecision, UploadLock};
pub use reconcile::{Classification, MetadataReconciler};
pub use request::{AdmitOutcome, AdmitRequest};
pub use resource::{LoggingResourceManager, ResourceError, ResourceManager};
pub use stats::{AdmissionStats, AdmissionStatsSnapshot};
