//! Persistent metadata store backed by redb.
//!
//! Each record is stored with its version in one value. The version check
//! and the insert happen inside a single redb write transaction, and redb
//! admits one writer at a time, so the compare-and-swap is atomic.

use crate::store::{MetaStoreResult, VersionedMetadataStore};
use crate::tables;
use crate::types::{CasOutcome, ExpectedVersion, SegmentRecord, StoreVersion, Versioned};
use async_trait::async_trait;
use redb::{Database, ReadableTable};
use segadmit_common::SegmentKey;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// On-disk value of the segments table
#[derive(Deserialize)]
struct StoredSegment {
    version: StoreVersion,
    record: SegmentRecord,
}

/// Borrowed form of [`StoredSegment`] for encoding without a clone
#[derive(Serialize)]
struct StoredSegmentRef<'a> {
    version: StoreVersion,
    record: &'a SegmentRecord,
}

/// Persistent versioned store backed by redb.
pub struct RedbMetaStore {
    db: Database,
}

impl RedbMetaStore {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>) -> MetaStoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create the table eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::SEGMENTS)?;
        }
        write_txn.commit()?;

        info!("Opened segment metadata store at {}", path.display());
        Ok(Self { db })
    }

    fn read_sync(&self, key: &SegmentKey) -> MetaStoreResult<Option<Versioned<SegmentRecord>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::SEGMENTS)?;
        match table.get(key.storage_key().as_str())? {
            Some(val) => {
                let stored: StoredSegment = bincode::deserialize(val.value())?;
                Ok(Some(Versioned::new(stored.record, stored.version)))
            }
            None => Ok(None),
        }
    }

    fn write_if_version_sync(
        &self,
        key: &SegmentKey,
        record: &SegmentRecord,
        expected: ExpectedVersion,
    ) -> MetaStoreResult<CasOutcome> {
        let storage_key = key.storage_key();
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut table = write_txn.open_table(tables::SEGMENTS)?;
            // Decode the current version, then drop the guard before mutating
            let current = match table.get(storage_key.as_str())? {
                Some(val) => Some(bincode::deserialize::<StoredSegment>(val.value())?.version),
                None => None,
            };
            if expected.matches(current) {
                let version = expected.successor();
                let bytes = bincode::serialize(&StoredSegmentRef { version, record })?;
                table.insert(storage_key.as_str(), bytes.as_slice())?;
                CasOutcome::Committed(version)
            } else {
                CasOutcome::VersionConflict { current }
            }
        };

        match outcome {
            CasOutcome::Committed(_) => write_txn.commit()?,
            CasOutcome::VersionConflict { current } => {
                debug!(
                    "Rejected write of {}: expected {}, current {:?}",
                    storage_key, expected, current
                );
                write_txn.abort()?;
            }
        }
        Ok(outcome)
    }
}

#[async_trait]
impl VersionedMetadataStore for RedbMetaStore {
    fn name(&self) -> &'static str {
        "redb"
    }

    async fn read(&self, key: &SegmentKey) -> MetaStoreResult<Option<Versioned<SegmentRecord>>> {
        self.read_sync(key)
    }

    async fn write_if_version(
        &self,
        key: &SegmentKey,
        record: &SegmentRecord,
        expected: ExpectedVersion,
    ) -> MetaStoreResult<CasOutcome> {
        self.write_if_version_sync(key, record, expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segadmit_common::{SegmentName, TableName, Timestamp};

    fn key() -> SegmentKey {
        SegmentKey::new(
            TableName::new("events").unwrap(),
            SegmentName::new("seg_0").unwrap(),
        )
    }

    fn record(crc: u64) -> SegmentRecord {
        let mut record = SegmentRecord::new(
            crc,
            "file:///segments/events_OFFLINE/seg_0",
            Timestamp::from_millis(100),
            Timestamp::from_millis(200),
        );
        record.custom_map.insert("owner".to_string(), "ingest".to_string());
        record
    }

    #[tokio::test]
    async fn test_round_trip_and_versions() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbMetaStore::open(dir.path().join("meta.redb")).unwrap();

        let outcome = store
            .write_if_version(&key(), &record(1), ExpectedVersion::Absent)
            .await
            .unwrap();
        assert_eq!(outcome, CasOutcome::Committed(StoreVersion::INITIAL));

        let read = store.read(&key()).await.unwrap().unwrap();
        assert_eq!(read.value, record(1));
        assert_eq!(read.version, StoreVersion::INITIAL);

        let locked = read.value.with_lock(Some(Timestamp::from_millis(300)));
        let outcome = store
            .write_if_version(&key(), &locked, read.expected())
            .await
            .unwrap();
        assert_eq!(outcome, CasOutcome::Committed(StoreVersion::new(2)));
        assert!(store.read(&key()).await.unwrap().unwrap().value.is_locked());
    }

    #[tokio::test]
    async fn test_stale_write_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbMetaStore::open(dir.path().join("meta.redb")).unwrap();

        store
            .write_if_version(&key(), &record(1), ExpectedVersion::Absent)
            .await
            .unwrap();
        let outcome = store
            .write_if_version(&key(), &record(2), ExpectedVersion::Absent)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CasOutcome::VersionConflict {
                current: Some(StoreVersion::INITIAL)
            }
        );

        let outcome = store
            .write_if_version(
                &key(),
                &record(2),
                ExpectedVersion::Exactly(StoreVersion::new(9)),
            )
            .await
            .unwrap();
        assert!(outcome.committed().is_none());
        assert_eq!(store.read(&key()).await.unwrap().unwrap().value.crc, 1);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("meta.redb");
        {
            let store = RedbMetaStore::open(&path).unwrap();
            store
                .write_if_version(&key(), &record(42), ExpectedVersion::Absent)
                .await
                .unwrap();
        }

        let store = RedbMetaStore::open(&path).unwrap();
        let read = store.read(&key()).await.unwrap().unwrap();
        assert_eq!(read.value.crc, 42);
        assert_eq!(read.version, StoreVersion::INITIAL);
    }
}
