//! Metadata reconciliation.
//!
//! Compares an upload with the committed record and produces the record
//! to commit. Unchanged content only bumps the refresh time and custom map;
//! changed content is placed first and then replaces crc, location and
//! creation time. Every committed record is unlocked.

use crate::clock::Clock;
use crate::custom_map::CustomMapModifier;
use crate::request::AdmitRequest;
use segadmit_common::{Error, Result, SegmentKey, Timestamp};
use segadmit_meta_store::{CasOutcome, SegmentRecord, Versioned, VersionedMetadataStore};
use segadmit_storage::SegmentPlacer;
use std::collections::BTreeMap;
use tracing::info;

/// How an upload relates to the committed record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    Absent,
    SameContent,
    DifferentContent { previous_crc: u64 },
}

pub fn classify(existing: Option<&SegmentRecord>, new_crc: u64) -> Classification {
    match existing {
        None => Classification::Absent,
        Some(record) if record.crc == new_crc => Classification::SameContent,
        Some(record) => Classification::DifferentContent {
            previous_crc: record.crc,
        },
    }
}

/// Record for a segment admitted for the first time
pub fn new_record(
    request: &AdmitRequest,
    modifier: &CustomMapModifier,
    now: Timestamp,
) -> SegmentRecord {
    let mut record = SegmentRecord::new(
        request.metadata.crc,
        request.download_uri(),
        request.metadata.creation_time,
        now,
    );
    record.custom_map = modifier.modify(&BTreeMap::new());
    record.crypter = request.headers.crypter.clone();
    record
}

/// Result of reconciling an upload with an existing record
#[derive(Clone, Debug)]
pub struct Reconciled {
    pub classification: Classification,
    pub committed: Versioned<SegmentRecord>,
}

/// Reconciles uploads against locked segment records
pub struct MetadataReconciler<'a> {
    store: &'a dyn VersionedMetadataStore,
    placer: &'a SegmentPlacer,
    clock: &'a dyn Clock,
}

impl<'a> MetadataReconciler<'a> {
    pub fn new(
        store: &'a dyn VersionedMetadataStore,
        placer: &'a SegmentPlacer,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            store,
            placer,
            clock,
        }
    }

    /// Move the staged file to its final location, unless moving is disabled
    pub async fn place_segment(&self, key: &SegmentKey, request: &AdmitRequest) -> Result<()> {
        if !request.move_to_final_location {
            info!(
                "Skipping segment move, keeping {} at {}",
                key,
                request.download_uri()
            );
            return Ok(());
        }
        self.placer
            .place(&request.staging_path, &request.final_uri)
            .await
            .map_err(|e| {
                Error::storage(
                    key,
                    format!(
                        "failed to move segment from {} to {}: {e}",
                        request.staging_path.display(),
                        request.final_uri
                    ),
                )
            })?;
        info!(
            "Moved {} from temp location {} to {}",
            key,
            request.staging_path.display(),
            request.final_uri
        );
        Ok(())
    }

    /// Reconcile `request` with `existing` and commit the result.
    ///
    /// `existing` is the record as last read or locked by this admission;
    /// the commit only succeeds if nobody wrote it since.
    pub async fn reconcile(
        &self,
        key: &SegmentKey,
        existing: &Versioned<SegmentRecord>,
        request: &AdmitRequest,
        modifier: &CustomMapModifier,
    ) -> Result<Reconciled> {
        let mut record = existing.value.with_lock(None);
        record.custom_map = modifier.modify(&existing.value.custom_map);

        let classification = classify(Some(&existing.value), request.metadata.crc);
        match classification {
            Classification::SameContent => {
                info!(
                    "New crc {} is the same as the existing crc of {}, updating metadata only",
                    request.metadata.crc, key
                );
                record.refresh_time = self.clock.now();
            }
            Classification::DifferentContent { previous_crc } => {
                info!(
                    "New crc {} differs from the existing crc {} of {}, refreshing segment",
                    request.metadata.crc, previous_crc, key
                );
                self.place_segment(key, request).await?;
                record.crc = request.metadata.crc;
                record.download_uri = request.download_uri().to_string();
                record.creation_time = request.metadata.creation_time;
                record.refresh_time = self.clock.now();
                record.crypter = request.headers.crypter.clone();
            }
            Classification::Absent => {
                return Err(Error::unrecoverable(
                    key,
                    "segment record disappeared during reconciliation",
                ));
            }
        }

        let outcome = self
            .store
            .write_if_version(key, &record, existing.expected())
            .await
            .map_err(|e| Error::storage(key, format!("failed to update segment metadata: {e}")))?;
        match outcome {
            CasOutcome::Committed(version) => Ok(Reconciled {
                classification,
                committed: Versioned::new(record, version),
            }),
            CasOutcome::VersionConflict { current } => Err(Error::conflict(
                key,
                format!(
                    "segment metadata changed concurrently: expected version {}, found {:?}",
                    existing.version, current
                ),
            )),
        }
    }
}
