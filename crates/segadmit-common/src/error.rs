//! Error types for SegAdmit
//!
//! This module defines the admission error taxonomy. Every admission
//! failure names the table and segment it concerns so conflicts can be
//! diagnosed from the response alone.

use crate::types::{NameError, SegmentKey};
use thiserror::Error;

/// Common result type for SegAdmit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for SegAdmit
#[derive(Debug, Error)]
pub enum Error {
    /// A declared expectation about the current state does not hold
    #[error("precondition failed for {key}: {reason}")]
    PreconditionFailed { key: SegmentKey, reason: String },

    /// Another admission is in progress, or a compare-and-swap lost a race
    #[error("conflict on {key}: {reason}")]
    Conflict { key: SegmentKey, reason: String },

    /// File placement or metadata store I/O failed
    #[error("storage failure for {key}: {reason}")]
    Storage { key: SegmentKey, reason: String },

    /// Any other failure during reconciliation
    #[error("unrecoverable failure for {key}: {reason}")]
    Unrecoverable { key: SegmentKey, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid name: {0}")]
    InvalidName(#[from] NameError),
}

impl Error {
    /// Create a precondition-failed error
    pub fn precondition_failed(key: &SegmentKey, reason: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            key: key.clone(),
            reason: reason.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(key: &SegmentKey, reason: impl Into<String>) -> Self {
        Self::Conflict {
            key: key.clone(),
            reason: reason.into(),
        }
    }

    /// Create a storage error
    pub fn storage(key: &SegmentKey, reason: impl Into<String>) -> Self {
        Self::Storage {
            key: key.clone(),
            reason: reason.into(),
        }
    }

    /// Create an unrecoverable error
    pub fn unrecoverable(key: &SegmentKey, reason: impl Into<String>) -> Self {
        Self::Unrecoverable {
            key: key.clone(),
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Segment the error concerns, if any
    #[must_use]
    pub fn segment_key(&self) -> Option<&SegmentKey> {
        match self {
            Self::PreconditionFailed { key, .. }
            | Self::Conflict { key, .. }
            | Self::Storage { key, .. }
            | Self::Unrecoverable { key, .. } => Some(key),
            Self::InvalidArgument(_) | Self::InvalidName(_) => None,
        }
    }

    /// Check if the caller may retry after backing off
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Get the HTTP status code reported to the uploader
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::InvalidArgument(_) | Self::InvalidName(_) => 400,

            // 409 Conflict
            Self::Conflict { .. } => 409,

            // 412 Precondition Failed
            Self::PreconditionFailed { .. } => 412,

            // 500 Internal Server Error
            Self::Storage { .. } | Self::Unrecoverable { .. } => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SegmentName, TableName};

    fn key() -> SegmentKey {
        SegmentKey::new(
            TableName::new("events").unwrap(),
            SegmentName::new("seg_1").unwrap(),
        )
    }

    #[test]
    fn test_error_retryable() {
        assert!(Error::conflict(&key(), "lock held").is_retryable());
        assert!(!Error::precondition_failed(&key(), "crc").is_retryable());
        assert!(!Error::storage(&key(), "disk").is_retryable());
    }

    #[test]
    fn test_error_http_status() {
        assert_eq!(Error::precondition_failed(&key(), "x").http_status_code(), 412);
        assert_eq!(Error::conflict(&key(), "x").http_status_code(), 409);
        assert_eq!(Error::storage(&key(), "x").http_status_code(), 500);
        assert_eq!(Error::unrecoverable(&key(), "x").http_status_code(), 500);
        assert_eq!(Error::invalid_argument("x").http_status_code(), 400);

        let name_err: Error = SegmentName::new("..").unwrap_err().into();
        assert_eq!(name_err.http_status_code(), 400);
        assert!(name_err.segment_key().is_none());
        assert!(!name_err.is_retryable());
    }

    #[test]
    fn test_error_names_table_and_segment() {
        let msg = Error::conflict(&key(), "another upload is in progress").to_string();
        assert!(msg.contains("seg_1"));
        assert!(msg.contains("events_OFFLINE"));
        assert!(Error::invalid_argument("x").segment_key().is_none());
    }
}
