//! Admission request and outcome.

use crate::headers::UploadHeaders;
use segadmit_common::{SegmentKey, SegmentMetadata, TableName};
use segadmit_meta_store::{SegmentRecord, Versioned};
use serde::Serialize;
use std::path::PathBuf;

/// One uploaded segment awaiting admission
#[derive(Clone, Debug)]
pub struct AdmitRequest {
    pub table: TableName,
    pub metadata: SegmentMetadata,
    /// Local file holding the uploaded bytes
    pub staging_path: PathBuf,
    /// Where the segment is placed
    pub final_uri: String,
    /// Where consumers fetch the segment; defaults to `final_uri`
    pub download_uri: Option<String>,
    pub move_to_final_location: bool,
    pub parallel_push_protection: bool,
    pub headers: UploadHeaders,
}

impl AdmitRequest {
    pub fn new(
        table: TableName,
        metadata: SegmentMetadata,
        staging_path: impl Into<PathBuf>,
        final_uri: impl Into<String>,
    ) -> Self {
        Self {
            table,
            metadata,
            staging_path: staging_path.into(),
            final_uri: final_uri.into(),
            download_uri: None,
            move_to_final_location: true,
            parallel_push_protection: true,
            headers: UploadHeaders::default(),
        }
    }

    #[must_use]
    pub fn with_headers(mut self, headers: UploadHeaders) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_download_uri(mut self, uri: impl Into<String>) -> Self {
        self.download_uri = Some(uri.into());
        self
    }

    #[must_use]
    pub fn with_move_to_final_location(mut self, enabled: bool) -> Self {
        self.move_to_final_location = enabled;
        self
    }

    #[must_use]
    pub fn with_parallel_push_protection(mut self, enabled: bool) -> Self {
        self.parallel_push_protection = enabled;
        self
    }

    /// Record key of the segment
    pub fn key(&self) -> SegmentKey {
        SegmentKey::new(self.table.clone(), self.metadata.name.clone())
    }

    /// Location recorded for consumers
    pub fn download_uri(&self) -> &str {
        self.download_uri.as_deref().unwrap_or(&self.final_uri)
    }

    pub fn crypter(&self) -> Option<&str> {
        self.headers.crypter.as_deref()
    }
}

/// Result of a successful admission
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "record", rename_all = "snake_case")]
pub enum AdmitOutcome {
    /// The segment did not exist and was created
    Created(Versioned<SegmentRecord>),
    /// The content changed and was replaced
    Refreshed(Versioned<SegmentRecord>),
    /// Same content re-uploaded; only metadata was updated
    MetadataUpdated(Versioned<SegmentRecord>),
}

impl AdmitOutcome {
    /// Committed record
    pub fn record(&self) -> &Versioned<SegmentRecord> {
        match self {
            Self::Created(record) | Self::Refreshed(record) | Self::MetadataUpdated(record) => {
                record
            }
        }
    }
}
