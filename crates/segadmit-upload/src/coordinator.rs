//! Upload coordinator.
//!
//! Entry point of segment admission. A new segment is placed and created
//! with a single compare-and-swap against an absent record. An existing
//! segment goes through conditional admission, the upload lock and
//! reconciliation; if anything fails after the lock was taken, the record
//! is written back unlocked before the error is returned.

use crate::clock::{Clock, SystemClock};
use crate::crc::validate_expected_crc;
use crate::custom_map::CustomMapModifier;
use crate::headers::CUSTOM_MAP_MODIFIER;
use crate::lock::UploadLock;
use crate::reconcile::{self, Classification, MetadataReconciler};
use crate::request::{AdmitOutcome, AdmitRequest};
use crate::resource::ResourceManager;
use crate::stats::AdmissionStats;
use parking_lot::Mutex;
use segadmit_common::config::UploadConfig;
use segadmit_common::{Error, Result, SegmentKey};
use segadmit_meta_store::{
    CasOutcome, ExpectedVersion, SegmentRecord, Versioned, VersionedMetadataStore,
};
use segadmit_storage::SegmentPlacer;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{info, warn};

/// Record this admission must write back unlocked if it fails
type HeldLock = Mutex<Option<Versioned<SegmentRecord>>>;

/// Outcome of the new-segment path
enum NewSegment {
    Created(AdmitOutcome),
    /// Another admitter created the record first
    AlreadyExists(Versioned<SegmentRecord>),
}

/// Admits uploaded segments
pub struct UploadCoordinator {
    store: Arc<dyn VersionedMetadataStore>,
    placer: SegmentPlacer,
    resource_manager: Arc<dyn ResourceManager>,
    clock: Arc<dyn Clock>,
    config: UploadConfig,
    stats: Arc<AdmissionStats>,
}

impl UploadCoordinator {
    pub fn new(
        store: Arc<dyn VersionedMetadataStore>,
        placer: SegmentPlacer,
        resource_manager: Arc<dyn ResourceManager>,
        config: UploadConfig,
    ) -> Self {
        Self {
            store,
            placer,
            resource_manager,
            clock: Arc::new(SystemClock),
            config,
            stats: Arc::new(AdmissionStats::default()),
        }
    }

    /// Use `clock` for lock and refresh timestamps
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn stats(&self) -> &AdmissionStats {
        &self.stats
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Admit an uploaded segment, bounded by the configured deadline if any
    pub async fn admit_segment(&self, request: AdmitRequest) -> Result<AdmitOutcome> {
        self.admit(&request, self.config.admission_deadline()).await
    }

    /// Admit an uploaded segment, giving up after `deadline`
    pub async fn admit_segment_with_deadline(
        &self,
        request: AdmitRequest,
        deadline: Duration,
    ) -> Result<AdmitOutcome> {
        self.admit(&request, Some(deadline)).await
    }

    async fn admit(&self, request: &AdmitRequest, deadline: Option<Duration>) -> Result<AdmitOutcome> {
        let key = request.key();
        let held: HeldLock = Mutex::new(None);

        let result = match deadline {
            None => self.run_admission(&key, request, &held).await,
            Some(limit) => {
                let finished =
                    tokio::time::timeout(limit, self.run_admission(&key, request, &held)).await;
                match finished {
                    Ok(result) => result,
                    Err(_) => {
                        let error = Error::unrecoverable(
                            &key,
                            format!("admission did not finish within {}ms", limit.as_millis()),
                        );
                        let pending = held.lock().take();
                        if let Some(pending) = pending {
                            self.upload_lock().release(&key, &pending, &error).await;
                        }
                        Err(error)
                    }
                }
            }
        };

        match &result {
            Ok(AdmitOutcome::Created(_)) => {
                self.stats.created.fetch_add(1, Ordering::Relaxed);
            }
            Ok(AdmitOutcome::Refreshed(_)) => {
                self.stats.refreshed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(AdmitOutcome::MetadataUpdated(_)) => {
                self.stats.metadata_updated.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!(
                    table = %key.table,
                    segment = %key.segment,
                    status = e.http_status_code(),
                    "Segment admission failed: {}",
                    e
                );
                self.stats.record_failure(e);
            }
        }
        result
    }

    async fn run_admission(
        &self,
        key: &SegmentKey,
        request: &AdmitRequest,
        held: &HeldLock,
    ) -> Result<AdmitOutcome> {
        let modifier = request.headers.custom_map_modifier().map_err(|e| {
            Error::invalid_argument(format!("invalid {CUSTOM_MAP_MODIFIER} header for {key}: {e}"))
        })?;

        let existing = match self.read_record(key).await? {
            Some(existing) => existing,
            None => match self.admit_new(key, request, &modifier).await? {
                NewSegment::Created(outcome) => return Ok(outcome),
                NewSegment::AlreadyExists(existing) => existing,
            },
        };
        self.admit_existing(key, request, &modifier, existing, held)
            .await
    }

    async fn read_record(&self, key: &SegmentKey) -> Result<Option<Versioned<SegmentRecord>>> {
        self.store
            .read(key)
            .await
            .map_err(|e| Error::storage(key, format!("failed to read segment metadata: {e}")))
    }

    async fn admit_new(
        &self,
        key: &SegmentKey,
        request: &AdmitRequest,
        modifier: &CustomMapModifier,
    ) -> Result<NewSegment> {
        info!("Adding new {}", key);
        self.reconciler().place_segment(key, request).await?;

        let record = reconcile::new_record(request, modifier, self.clock.now());
        let outcome = self
            .store
            .write_if_version(key, &record, ExpectedVersion::Absent)
            .await
            .map_err(|e| Error::storage(key, format!("failed to create segment metadata: {e}")))?;

        match outcome {
            CasOutcome::Committed(version) => {
                self.resource_manager
                    .add_new_segment(
                        &request.table,
                        &request.metadata,
                        request.download_uri(),
                        request.crypter(),
                    )
                    .await
                    .map_err(|e| {
                        Error::unrecoverable(key, format!("segment metadata committed but {e}"))
                    })?;
                info!("Added {} with crc {}", key, record.crc);
                Ok(NewSegment::Created(AdmitOutcome::Created(Versioned::new(
                    record, version,
                ))))
            }
            CasOutcome::VersionConflict { .. } => {
                info!("{} was created concurrently, admitting as an existing segment", key);
                match self.read_record(key).await? {
                    Some(existing) => Ok(NewSegment::AlreadyExists(existing)),
                    None => Err(Error::conflict(
                        key,
                        "segment metadata changed concurrently, retry later",
                    )),
                }
            }
        }
    }

    async fn admit_existing(
        &self,
        key: &SegmentKey,
        request: &AdmitRequest,
        modifier: &CustomMapModifier,
        existing: Versioned<SegmentRecord>,
        held: &HeldLock,
    ) -> Result<AdmitOutcome> {
        validate_expected_crc(key, request.headers.if_match.as_deref(), existing.value.crc)?;

        let current = if request.parallel_push_protection {
            let locked = self
                .upload_lock()
                .acquire(key, &existing, self.clock.now())
                .await?;
            *held.lock() = Some(locked.clone());
            locked
        } else {
            if let Some(held_since) = existing.value.upload_lock {
                info!(
                    "Parallel push protection is disabled, clearing upload lock on {} taken at {}",
                    key, held_since
                );
                *held.lock() = Some(existing.clone());
            }
            existing
        };

        let reconciled = match self
            .reconciler()
            .reconcile(key, &current, request, modifier)
            .await
        {
            Ok(reconciled) => {
                held.lock().take();
                reconciled
            }
            Err(e) => {
                let pending = held.lock().take();
                if let Some(pending) = pending {
                    self.upload_lock().release(key, &pending, &e).await;
                }
                return Err(e);
            }
        };

        match reconciled.classification {
            Classification::DifferentContent { .. } => {
                self.resource_manager
                    .refresh_segment(
                        &request.table,
                        &request.metadata,
                        &current.value,
                        request.download_uri(),
                        request.crypter(),
                    )
                    .await
                    .map_err(|e| {
                        Error::unrecoverable(key, format!("segment metadata committed but {e}"))
                    })?;
                info!("Refreshed {} with crc {}", key, request.metadata.crc);
                Ok(AdmitOutcome::Refreshed(reconciled.committed))
            }
            _ => Ok(AdmitOutcome::MetadataUpdated(reconciled.committed)),
        }
    }

    fn upload_lock(&self) -> UploadLock<'_> {
        UploadLock::new(
            self.store.as_ref(),
            self.config.lock_timeout(),
            &self.stats,
        )
    }

    fn reconciler(&self) -> MetadataReconciler<'_> {
        MetadataReconciler::new(self.store.as_ref(), &self.placer, self.clock.as_ref())
    }
}
