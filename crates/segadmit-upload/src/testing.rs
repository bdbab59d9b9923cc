//! Test doubles for admission tests.

use crate::clock::Clock;
use crate::resource::{ResourceError, ResourceManager};
use async_trait::async_trait;
use parking_lot::Mutex;
use segadmit_common::{SegmentKey, SegmentMetadata, TableName, Timestamp};
use segadmit_meta_store::{
    CasOutcome, ExpectedVersion, MemoryMetaStore, MetaStoreError, MetaStoreResult, SegmentRecord,
    Versioned, VersionedMetadataStore,
};
use segadmit_storage::{FsError, FsResult, SegmentFs};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use url::Url;

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new(millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(millis),
        }
    }

    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(u64::try_from(by.as_millis()).unwrap(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceEvent {
    Added { table: String, segment: String, crc: u64 },
    Refreshed { table: String, segment: String, previous_crc: u64, crc: u64 },
}

/// Resource manager recording every notification
#[derive(Debug, Default)]
pub struct RecordingResourceManager {
    events: Mutex<Vec<ResourceEvent>>,
    fail: AtomicBool,
}

impl RecordingResourceManager {
    pub fn events(&self) -> Vec<ResourceEvent> {
        self.events.lock().clone()
    }

    pub fn fail_notifications(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), ResourceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ResourceError("segment assignment failed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceManager for RecordingResourceManager {
    async fn add_new_segment(
        &self,
        table: &TableName,
        metadata: &SegmentMetadata,
        _download_uri: &str,
        _crypter: Option<&str>,
    ) -> Result<(), ResourceError> {
        self.check()?;
        self.events.lock().push(ResourceEvent::Added {
            table: table.to_string(),
            segment: metadata.name.to_string(),
            crc: metadata.crc,
        });
        Ok(())
    }

    async fn refresh_segment(
        &self,
        table: &TableName,
        metadata: &SegmentMetadata,
        previous: &SegmentRecord,
        _download_uri: &str,
        _crypter: Option<&str>,
    ) -> Result<(), ResourceError> {
        self.check()?;
        self.events.lock().push(ResourceEvent::Refreshed {
            table: table.to_string(),
            segment: metadata.name.to_string(),
            previous_crc: previous.crc,
            crc: metadata.crc,
        });
        Ok(())
    }
}

/// Filesystem whose copies always fail
#[derive(Debug, Default)]
pub struct FailingFs;

#[async_trait]
impl SegmentFs for FailingFs {
    fn scheme(&self) -> &str {
        "fail"
    }

    async fn copy_from_local(&self, _local: &Path, _destination: &Url) -> FsResult<()> {
        Err(FsError::Io(std::io::Error::other("disk full")))
    }

    async fn exists(&self, _uri: &Url) -> FsResult<bool> {
        Ok(false)
    }
}

/// Filesystem whose copies block until released
#[derive(Debug, Default)]
pub struct GatedFs {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl SegmentFs for GatedFs {
    fn scheme(&self) -> &str {
        "gated"
    }

    async fn copy_from_local(&self, _local: &Path, _destination: &Url) -> FsResult<()> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }

    async fn exists(&self, _uri: &Url) -> FsResult<bool> {
        Ok(false)
    }
}

/// In-memory store that fails chosen writes
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryMetaStore,
    writes: AtomicUsize,
    failing: Mutex<Vec<usize>>,
    preempt: Mutex<Option<SegmentRecord>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `nth` write from now (1-based)
    pub fn fail_write(&self, nth: usize) {
        let done = self.writes.load(Ordering::SeqCst);
        self.failing.lock().push(done + nth);
    }

    /// Let a concurrent admitter create the record just before our next create
    pub fn preempt_create(&self, record: SegmentRecord) {
        *self.preempt.lock() = Some(record);
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VersionedMetadataStore for FaultyStore {
    fn name(&self) -> &'static str {
        "faulty"
    }

    async fn read(&self, key: &SegmentKey) -> MetaStoreResult<Option<Versioned<SegmentRecord>>> {
        self.inner.read(key).await
    }

    async fn write_if_version(
        &self,
        key: &SegmentKey,
        record: &SegmentRecord,
        expected: ExpectedVersion,
    ) -> MetaStoreResult<CasOutcome> {
        let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing.lock().contains(&n) {
            return Err(MetaStoreError::Unavailable("injected write failure".to_string()));
        }
        if expected == ExpectedVersion::Absent {
            let preempt = self.preempt.lock().take();
            if let Some(winner) = preempt {
                self.inner
                    .write_if_version(key, &winner, ExpectedVersion::Absent)
                    .await?;
            }
        }
        self.inner.write_if_version(key, record, expected).await
    }
}
