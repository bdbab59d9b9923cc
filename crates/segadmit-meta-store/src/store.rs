//! Versioned metadata store seam.
//!
//! Every write names the version it was based on. The store applies the
//! write only if that version is still current, so concurrent admitters
//! detect each other instead of overwriting.

use crate::types::{CasOutcome, ExpectedVersion, SegmentRecord, Versioned};
use async_trait::async_trait;
use segadmit_common::SegmentKey;

/// Error type for metadata store operations
#[derive(Debug, thiserror::Error)]
pub enum MetaStoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),
}

impl From<redb::TransactionError> for MetaStoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

pub type MetaStoreResult<T> = Result<T, MetaStoreError>;

/// Strongly consistent key/value store with compare-and-swap writes
#[async_trait]
pub trait VersionedMetadataStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Read the record for a segment together with its version
    async fn read(&self, key: &SegmentKey) -> MetaStoreResult<Option<Versioned<SegmentRecord>>>;

    /// Write the record if the stored version still matches `expected`
    async fn write_if_version(
        &self,
        key: &SegmentKey,
        record: &SegmentRecord,
        expected: ExpectedVersion,
    ) -> MetaStoreResult<CasOutcome>;
}
