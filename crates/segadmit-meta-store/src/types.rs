//! Stored types for segment metadata.
//!
//! These types are serialized to redb via bincode.

use segadmit_common::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Version token returned by the store on every committed write.
///
/// The first write of a key yields [`StoreVersion::INITIAL`]; every later
/// write yields the next value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StoreVersion(u64);

impl StoreVersion {
    /// Version of a freshly created record
    pub const INITIAL: Self = Self(1);

    /// Create from a raw value
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Version following this one
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for StoreVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for StoreVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Version a writer expects the key to be at
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// The key must not exist yet
    Absent,
    /// The key must be at exactly this version
    Exactly(StoreVersion),
}

impl ExpectedVersion {
    /// Check the expectation against the version currently stored
    #[must_use]
    pub fn matches(&self, current: Option<StoreVersion>) -> bool {
        match (self, current) {
            (Self::Absent, None) => true,
            (Self::Exactly(expected), Some(current)) => *expected == current,
            _ => false,
        }
    }

    /// Version the write will produce if it commits
    #[must_use]
    pub const fn successor(&self) -> StoreVersion {
        match self {
            Self::Absent => StoreVersion::INITIAL,
            Self::Exactly(v) => v.next(),
        }
    }
}

impl fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Exactly(v) => write!(f, "version {v}"),
        }
    }
}

/// A value together with the store version it was read at
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub value: T,
    pub version: StoreVersion,
}

impl<T> Versioned<T> {
    pub const fn new(value: T, version: StoreVersion) -> Self {
        Self { value, version }
    }

    /// Expectation to use when writing over this value
    #[must_use]
    pub const fn expected(&self) -> ExpectedVersion {
        ExpectedVersion::Exactly(self.version)
    }
}

/// Result of a compare-and-swap write
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CasOutcome {
    /// The write was applied; the key is now at this version
    Committed(StoreVersion),
    /// The stored version did not match; nothing was written
    VersionConflict { current: Option<StoreVersion> },
}

impl CasOutcome {
    /// Version written, if the write committed
    #[must_use]
    pub const fn committed(&self) -> Option<StoreVersion> {
        match self {
            Self::Committed(v) => Some(*v),
            Self::VersionConflict { .. } => None,
        }
    }
}

/// Metadata record kept for one segment of one table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRecord {
    /// Checksum of the committed segment content
    pub crc: u64,
    /// Set whenever the content actually changes
    pub creation_time: Timestamp,
    /// Set on every successful admission
    pub refresh_time: Timestamp,
    /// When the current upload took the lock; `None` means unlocked
    pub upload_lock: Option<Timestamp>,
    /// Caller-extensible metadata
    pub custom_map: BTreeMap<String, String>,
    /// Where the segment bytes can be fetched from
    pub download_uri: String,
    /// Crypter the segment bytes were encrypted with
    pub crypter: Option<String>,
}

impl SegmentRecord {
    /// Create an unlocked record with an empty custom map
    pub fn new(
        crc: u64,
        download_uri: impl Into<String>,
        creation_time: Timestamp,
        refresh_time: Timestamp,
    ) -> Self {
        Self {
            crc,
            creation_time,
            refresh_time,
            upload_lock: None,
            custom_map: BTreeMap::new(),
            download_uri: download_uri.into(),
            crypter: None,
        }
    }

    /// Check whether an upload currently holds the lock
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.upload_lock.is_some()
    }

    /// Copy of this record with the lock field replaced
    #[must_use]
    pub fn with_lock(&self, lock: Option<Timestamp>) -> Self {
        Self {
            upload_lock: lock,
            ..self.clone()
        }
    }
}
