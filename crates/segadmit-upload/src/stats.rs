//! Admission counters.

use segadmit_common::Error;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Admission statistics
#[derive(Debug, Default)]
pub struct AdmissionStats {
    pub created: AtomicU64,
    pub refreshed: AtomicU64,
    pub metadata_updated: AtomicU64,
    pub precondition_failures: AtomicU64,
    pub conflicts: AtomicU64,
    pub storage_failures: AtomicU64,
    pub unrecoverable: AtomicU64,
    pub stale_locks_reclaimed: AtomicU64,
    pub lock_release_failures: AtomicU64,
}

/// Point-in-time copy of [`AdmissionStats`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AdmissionStatsSnapshot {
    pub created: u64,
    pub refreshed: u64,
    pub metadata_updated: u64,
    pub precondition_failures: u64,
    pub conflicts: u64,
    pub storage_failures: u64,
    pub unrecoverable: u64,
    pub stale_locks_reclaimed: u64,
    pub lock_release_failures: u64,
}

impl AdmissionStats {
    /// Count a failed admission under its error kind
    pub fn record_failure(&self, error: &Error) {
        let counter = match error {
            Error::PreconditionFailed { .. } => &self.precondition_failures,
            Error::Conflict { .. } => &self.conflicts,
            Error::Storage { .. } => &self.storage_failures,
            Error::Unrecoverable { .. } => &self.unrecoverable,
            Error::InvalidArgument(_) | Error::InvalidName(_) => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AdmissionStatsSnapshot {
        AdmissionStatsSnapshot {
            created: self.created.load(Ordering::Relaxed),
            refreshed: self.refreshed.load(Ordering::Relaxed),
            metadata_updated: self.metadata_updated.load(Ordering::Relaxed),
            precondition_failures: self.precondition_failures.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            unrecoverable: self.unrecoverable.load(Ordering::Relaxed),
            stale_locks_reclaimed: self.stale_locks_reclaimed.load(Ordering::Relaxed),
            lock_release_failures: self.lock_release_failures.load(Ordering::Relaxed),
        }
    }
}
