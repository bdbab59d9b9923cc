//! In-memory filesystem backend (`mem://` URIs).
//!
//! Holds copied segments in a map keyed by URI and counts copies, which
//! lets callers observe whether a placement happened at all.

use crate::error::{FsError, FsResult};
use crate::fs::SegmentFs;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

/// Scheme served by [`MemoryFs`]
pub const MEM_SCHEME: &str = "mem";

/// Segment filesystem held in memory
#[derive(Debug, Default)]
pub struct MemoryFs {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    copies: AtomicU64,
}

impl MemoryFs {
    /// Create an empty in-memory filesystem
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Content stored at `uri`
    pub fn get(&self, uri: &str) -> Option<Vec<u8>> {
        self.objects.read().get(uri).cloned()
    }

    /// Number of completed copies
    pub fn copies(&self) -> u64 {
        self.copies.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SegmentFs for MemoryFs {
    fn scheme(&self) -> &str {
        MEM_SCHEME
    }

    async fn copy_from_local(&self, local: &Path, destination: &Url) -> FsResult<()> {
        if destination.scheme() != MEM_SCHEME {
            return Err(FsError::UnsupportedScheme(destination.scheme().to_string()));
        }
        let data = tokio::fs::read(local).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FsError::NotFound(local.display().to_string())
            } else {
                FsError::Io(e)
            }
        })?;
        self.objects.write().insert(destination.to_string(), data);
        self.copies.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn exists(&self, uri: &Url) -> FsResult<bool> {
        Ok(self.objects.read().contains_key(uri.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copy_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("seg");
        tokio::fs::write(&staging, b"abc").await.unwrap();

        let mem = MemoryFs::new();
        let dest = Url::parse("mem://segments/t/seg").unwrap();
        mem.copy_from_local(&staging, &dest).await.unwrap();
        mem.copy_from_local(&staging, &dest).await.unwrap();

        assert_eq!(mem.get("mem://segments/t/seg"), Some(b"abc".to_vec()));
        assert_eq!(mem.copies(), 2);
        assert!(mem.exists(&dest).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_source() {
        let mem = MemoryFs::new();
        let dest = Url::parse("mem://segments/t/seg").unwrap();
        let err = mem
            .copy_from_local(Path::new("/nonexistent/segadmit/seg"), &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
        assert_eq!(mem.copies(), 0);
    }
}
