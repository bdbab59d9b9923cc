//! Upload lock.
//!
//! The lock is a timestamp field inside the segment record, taken and
//! cleared with compare-and-swap writes. A lock older than the timeout is
//! treated as abandoned by a crashed uploader and may be taken over.

use crate::stats::AdmissionStats;
use segadmit_common::{Error, Result, SegmentKey, Timestamp};
use segadmit_meta_store::{CasOutcome, SegmentRecord, Versioned, VersionedMetadataStore};
use std::fmt;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{error, info, warn};

/// What to do with the lock field of the current record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockDecision {
    /// Nobody holds the lock
    Acquire,
    /// The holder exceeded the timeout
    ForceAcquire {
        held_since: Timestamp,
        held_for: Duration,
    },
    /// Another upload is in progress
    Reject { held_since: Timestamp },
}

/// Decide whether an upload may take the lock at `now`.
///
/// A lock is stale only once it has been held strictly longer than
/// `timeout`.
pub fn decide(current: Option<Timestamp>, now: Timestamp, timeout: Duration) -> LockDecision {
    match current {
        None => LockDecision::Acquire,
        Some(held_since) => {
            let held_for = now.saturating_since(held_since);
            if held_for > timeout {
                LockDecision::ForceAcquire {
                    held_since,
                    held_for,
                }
            } else {
                LockDecision::Reject { held_since }
            }
        }
    }
}

/// Takes and releases upload locks in the metadata store
pub struct UploadLock<'a> {
    store: &'a dyn VersionedMetadataStore,
    timeout: Duration,
    stats: &'a AdmissionStats,
}

impl<'a> UploadLock<'a> {
    pub fn new(
        store: &'a dyn VersionedMetadataStore,
        timeout: Duration,
        stats: &'a AdmissionStats,
    ) -> Self {
        Self {
            store,
            timeout,
            stats,
        }
    }

    /// Lock `current` at `now`, returning the locked record and its version
    pub async fn acquire(
        &self,
        key: &SegmentKey,
        current: &Versioned<SegmentRecord>,
        now: Timestamp,
    ) -> Result<Versioned<SegmentRecord>> {
        match decide(current.value.upload_lock, now, self.timeout) {
            LockDecision::Acquire => {}
            LockDecision::ForceAcquire {
                held_since,
                held_for,
            } => {
                warn!(
                    table = %key.table,
                    segment = %key.segment,
                    held_since = held_since.as_millis(),
                    "Upload lock held for {}ms exceeds timeout of {}ms, taking it over",
                    held_for.as_millis(),
                    self.timeout.as_millis()
                );
                self.stats
                    .stale_locks_reclaimed
                    .fetch_add(1, Ordering::Relaxed);
            }
            LockDecision::Reject { held_since } => {
                return Err(Error::conflict(
                    key,
                    format!(
                        "another segment upload has been in progress since {held_since}, retry later"
                    ),
                ));
            }
        }

        let locked = current.value.with_lock(Some(now));
        let outcome = self
            .store
            .write_if_version(key, &locked, current.expected())
            .await
            .map_err(|e| Error::storage(key, format!("failed to lock segment: {e}")))?;
        match outcome {
            CasOutcome::Committed(version) => {
                info!("Locked {} for upload at {}", key, now);
                Ok(Versioned::new(locked, version))
            }
            CasOutcome::VersionConflict { current: found } => Err(Error::conflict(
                key,
                format!(
                    "failed to lock segment: expected version {}, found {:?}, retry later",
                    current.version, found
                ),
            )),
        }
    }

    /// Best-effort release after a failed admission.
    ///
    /// Writes `held` back without its lock. A failure is logged and
    /// counted; the lock then expires after the timeout.
    pub async fn release(
        &self,
        key: &SegmentKey,
        held: &Versioned<SegmentRecord>,
        cause: &(dyn fmt::Display + Sync),
    ) -> bool {
        let unlocked = held.value.with_lock(None);
        match self
            .store
            .write_if_version(key, &unlocked, held.expected())
            .await
        {
            Ok(CasOutcome::Committed(_)) => {
                info!("Released upload lock on {} after failure: {}", key, cause);
                true
            }
            Ok(CasOutcome::VersionConflict { current }) => {
                warn!(
                    "Could not release upload lock on {}: expected version {}, found {:?}; \
                     it expires after {}ms",
                    key,
                    held.version,
                    current,
                    self.timeout.as_millis()
                );
                self.stats
                    .lock_release_failures
                    .fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(e) => {
                error!("Failed to release upload lock on {}: {}", key, e);
                self.stats
                    .lock_release_failures
                    .fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}
