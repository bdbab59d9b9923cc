//! In-memory metadata store.
//!
//! Used by tests and by the controller's `memory` backend. A single mutex
//! linearizes writes, which is all compare-and-swap needs.

use crate::store::{MetaStoreResult, VersionedMetadataStore};
use crate::types::{CasOutcome, ExpectedVersion, SegmentRecord, Versioned};
use async_trait::async_trait;
use parking_lot::Mutex;
use segadmit_common::SegmentKey;
use std::collections::HashMap;
use tracing::debug;

/// Process-local versioned store
#[derive(Default)]
pub struct MemoryMetaStore {
    records: Mutex<HashMap<SegmentKey, Versioned<SegmentRecord>>>,
}

impl MemoryMetaStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Check if the store holds no records
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl VersionedMetadataStore for MemoryMetaStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn read(&self, key: &SegmentKey) -> MetaStoreResult<Option<Versioned<SegmentRecord>>> {
        Ok(self.records.lock().get(key).cloned())
    }

    async fn write_if_version(
        &self,
        key: &SegmentKey,
        record: &SegmentRecord,
        expected: ExpectedVersion,
    ) -> MetaStoreResult<CasOutcome> {
        let mut records = self.records.lock();
        let current = records.get(key).map(|v| v.version);
        if !expected.matches(current) {
            debug!(
                "Rejected write of {:?}: expected {}, current {:?}",
                key, expected, current
            );
            return Ok(CasOutcome::VersionConflict { current });
        }

        let version = expected.successor();
        records.insert(key.clone(), Versioned::new(record.clone(), version));
        Ok(CasOutcome::Committed(version))
    }
}
