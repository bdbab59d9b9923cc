//! Configuration types for SegAdmit
//!
//! This module defines configuration structures used across components.
//! Every section has defaults so a partial TOML file is enough.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for SegAdmit
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Segment admission behaviour
    pub upload: UploadConfig,
    /// Segment file placement
    pub storage: StorageConfig,
    /// Metadata store backend
    pub metadata: MetadataConfig,
    /// Logging
    pub logging: LoggingConfig,
}

/// Segment admission configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Age after which an upload lock is considered abandoned (milliseconds)
    pub lock_timeout_ms: u64,
    /// Refuse concurrent uploads of the same segment
    pub parallel_push_protection: bool,
    /// Copy uploaded segments from staging to their final location
    pub move_to_final_location: bool,
    /// Upper bound on a whole admission call (milliseconds)
    pub admission_deadline_ms: Option<u64>,
}

impl UploadConfig {
    /// Lock timeout as a duration
    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Admission deadline as a duration
    #[must_use]
    pub fn admission_deadline(&self) -> Option<Duration> {
        self.admission_deadline_ms.map(Duration::from_millis)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 10 * 60 * 1000, // 10 minutes
            parallel_push_protection: true,
            move_to_final_location: true,
            admission_deadline_ms: None,
        }
    }
}

/// Segment storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Working directory; a relative metadata path is resolved against it
    pub data_dir: PathBuf,
    /// Root URI under which segments are placed as `<root>/<table>/<segment>`
    pub segment_root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/segadmit"),
            segment_root: "file:///var/lib/segadmit/segments".to_string(),
        }
    }
}

/// Metadata store backend selection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataBackend {
    /// Process-local map, lost on exit
    Memory,
    /// Persistent redb database
    #[default]
    Redb,
}

/// Metadata store configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub backend: MetadataBackend,
    /// Database file for the redb backend, relative to `storage.data_dir` unless absolute
    pub path: PathBuf,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            backend: MetadataBackend::Redb,
            path: PathBuf::from("/var/lib/segadmit/meta.redb"),
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
