//! Resource manager notification.
//!
//! Once segment metadata is committed, the table's resource manager is told
//! to start serving a new segment or to reload a refreshed one.

use async_trait::async_trait;
use segadmit_common::{SegmentMetadata, TableName};
use segadmit_meta_store::SegmentRecord;
use thiserror::Error;
use tracing::info;

/// Resource manager failure
#[derive(Debug, Error)]
#[error("resource manager error: {0}")]
pub struct ResourceError(pub String);

/// Downstream consumer of admitted segments
#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// A segment was created
    async fn add_new_segment(
        &self,
        table: &TableName,
        metadata: &SegmentMetadata,
        download_uri: &str,
        crypter: Option<&str>,
    ) -> Result<(), ResourceError>;

    /// An existing segment's content changed
    async fn refresh_segment(
        &self,
        table: &TableName,
        metadata: &SegmentMetadata,
        previous: &SegmentRecord,
        download_uri: &str,
        crypter: Option<&str>,
    ) -> Result<(), ResourceError>;
}

/// Resource manager that only logs notifications
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingResourceManager;

#[async_trait]
impl ResourceManager for LoggingResourceManager {
    async fn add_new_segment(
        &self,
        table: &TableName,
        metadata: &SegmentMetadata,
        download_uri: &str,
        _crypter: Option<&str>,
    ) -> Result<(), ResourceError> {
        info!(
            table = %table,
            segment = %metadata.name,
            crc = metadata.crc,
            "Added new segment, download from {}",
            download_uri
        );
        Ok(())
    }

    async fn refresh_segment(
        &self,
        table: &TableName,
        metadata: &SegmentMetadata,
        previous: &SegmentRecord,
        download_uri: &str,
        _crypter: Option<&str>,
    ) -> Result<(), ResourceError> {
        info!(
            table = %table,
            segment = %metadata.name,
            previous_crc = previous.crc,
            crc = metadata.crc,
            "Refreshed segment, download from {}",
            download_uri
        );
        Ok(())
    }
}
