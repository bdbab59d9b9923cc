//! Filesystem registry keyed by URI scheme.

use crate::error::{FsError, FsResult};
use crate::fs::SegmentFs;
use crate::local::LocalFs;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use url::Url;

/// Parse a segment location.
///
/// Bare absolute paths are accepted and treated as `file://` URIs.
pub fn parse_uri(location: &str) -> FsResult<Url> {
    if Path::new(location).is_absolute() {
        return Url::from_file_path(location)
            .map_err(|()| FsError::InvalidUri(location.to_string()));
    }
    Url::parse(location).map_err(|e| FsError::InvalidUri(format!("{location}: {e}")))
}

/// Maps URI schemes to the filesystem serving them
#[derive(Clone, Default)]
pub struct SegmentFsRegistry {
    filesystems: HashMap<String, Arc<dyn SegmentFs>>,
}

impl SegmentFsRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry serving `file://` from local disk
    #[must_use]
    pub fn with_local() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(LocalFs::new()));
        registry
    }

    /// Register a filesystem under its scheme, replacing any previous one
    pub fn register(&mut self, fs: Arc<dyn SegmentFs>) -> &mut Self {
        self.filesystems.insert(fs.scheme().to_ascii_lowercase(), fs);
        self
    }

    /// Filesystem serving `uri`'s scheme
    pub fn for_uri(&self, uri: &Url) -> FsResult<Arc<dyn SegmentFs>> {
        self.filesystems
            .get(uri.scheme())
            .cloned()
            .ok_or_else(|| FsError::UnsupportedScheme(uri.scheme().to_string()))
    }

    /// Registered schemes, sorted
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.filesystems.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }
}
