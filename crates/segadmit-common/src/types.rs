//! Core type definitions for SegAdmit
//!
//! This module defines the identifiers used to address a segment record
//! (typed table name + segment name), the millisecond timestamp used by
//! the upload lock, and the metadata an uploader reports for a segment.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Suffix of offline (batch-pushed) tables
pub const OFFLINE_SUFFIX: &str = "_OFFLINE";

/// Suffix of realtime tables
pub const REALTIME_SUFFIX: &str = "_REALTIME";

/// Maximum length of a table or segment name in bytes
pub const MAX_NAME_LEN: usize = 512;

/// Milliseconds since the Unix epoch
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[display("{_0}")]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create from milliseconds since the epoch
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Current wall-clock time
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    /// Milliseconds since the epoch
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is in the future
    #[must_use]
    pub const fn saturating_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}ms)", self.0)
    }
}

/// Table name including its type suffix (e.g. `events_OFFLINE`)
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct TableName(String);

impl TableName {
    /// Create a typed table name from a raw or typed name.
    ///
    /// Names that already carry `_OFFLINE` or `_REALTIME` are kept as is;
    /// anything else is treated as an offline table.
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        validate_name(&name)?;
        if name.ends_with(OFFLINE_SUFFIX) || name.ends_with(REALTIME_SUFFIX) {
            Ok(Self(name))
        } else {
            Ok(Self(format!("{name}{OFFLINE_SUFFIX}")))
        }
    }

    /// Get the typed table name
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Table name without its type suffix
    #[must_use]
    pub fn raw_name(&self) -> &str {
        self.0
            .strip_suffix(OFFLINE_SUFFIX)
            .or_else(|| self.0.strip_suffix(REALTIME_SUFFIX))
            .unwrap_or(&self.0)
    }
}

impl fmt::Debug for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableName({:?})", self.0)
    }
}

/// Name of a segment within a table
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct SegmentName(String);

impl SegmentName {
    /// Create a new segment name
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self(name))
    }

    /// Get the segment name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SegmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SegmentName({:?})", self.0)
    }
}

fn validate_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(NameError::TooLong);
    }
    if let Some(c) = name.chars().find(|c| *c == '/' || c.is_control()) {
        return Err(NameError::InvalidChar(c));
    }
    // Dot segments are rewritten by path and URI normalization
    if name == "." || name == ".." {
        return Err(NameError::Reserved(name.to_string()));
    }
    Ok(())
}

/// Errors that can occur when creating a table or segment name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("name cannot be empty")]
    Empty,
    #[error("name cannot exceed 512 bytes")]
    TooLong,
    #[error("name contains invalid character: {0:?}")]
    InvalidChar(char),
    #[error("name is reserved: {0:?}")]
    Reserved(String),
}

/// Address of one segment record in the metadata store
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentKey {
    pub table: TableName,
    pub segment: SegmentName,
}

impl SegmentKey {
    /// Create a new segment key
    #[must_use]
    pub const fn new(table: TableName, segment: SegmentName) -> Self {
        Self { table, segment }
    }

    /// Flat key used by persistent stores
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("{}/{}", self.table, self.segment)
    }
}

impl fmt::Debug for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SegmentKey({}/{})", self.table, self.segment)
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment {} of table {}", self.segment, self.table)
    }
}

/// Metadata reported by the uploader for a segment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMetadata {
    /// Segment name
    pub name: SegmentName,
    /// Content checksum computed over the segment bytes
    pub crc: u64,
    /// When the segment's index was built
    pub creation_time: Timestamp,
}

impl SegmentMetadata {
    /// Create new segment metadata
    #[must_use]
    pub const fn new(name: SegmentName, crc: u64, creation_time: Timestamp) -> Self {
        Self {
            name,
            crc,
            creation_time,
        }
    }
}
