//! Segment placer.
//!
//! Copies a staged segment file to its final, addressable location through
//! the filesystem registered for the destination's scheme. The copy
//! overwrites, so re-running a placement with the same inputs is harmless.

use crate::error::{FsError, FsResult};
use crate::registry::{SegmentFsRegistry, parse_uri};
use segadmit_common::SegmentKey;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Final location of a segment under `root`: `<root>/<table>/<segment>`
pub fn final_segment_uri(root: &str, key: &SegmentKey) -> FsResult<String> {
    append_path(root, &[key.table.as_str(), key.segment.as_str()])
}

/// Append `parts` as path segments of `root`
///
/// Empty parts and the dot segments `.` and `..` are normalized away by URL
/// parsing, which would place the file somewhere other than `root/parts...`,
/// so they are rejected.
fn append_path(root: &str, parts: &[&str]) -> FsResult<String> {
    if let Some(part) = parts
        .iter()
        .find(|p| p.is_empty() || **p == "." || **p == "..")
    {
        return Err(FsError::InvalidUri(format!(
            "{root}: path segment {part:?} is not allowed"
        )));
    }
    let mut uri = parse_uri(root)?;
    uri.path_segments_mut()
        .map_err(|()| FsError::InvalidUri(root.to_string()))?
        .pop_if_empty()
        .extend(parts);
    Ok(uri.to_string())
}

/// Places staged segment files at their final location
#[derive(Clone)]
pub struct SegmentPlacer {
    registry: Arc<SegmentFsRegistry>,
}

impl SegmentPlacer {
    /// Create a placer resolving filesystems through `registry`
    #[must_use]
    pub const fn new(registry: Arc<SegmentFsRegistry>) -> Self {
        Self { registry }
    }

    /// Copy `staging` to `final_uri`, overwriting any existing segment
    pub async fn place(&self, staging: &Path, final_uri: &str) -> FsResult<()> {
        let destination = parse_uri(final_uri)?;
        let fs = self.registry.for_uri(&destination)?;

        info!(
            "Copying segment from {} to {}",
            staging.display(),
            destination
        );
        fs.copy_from_local(staging, &destination).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryFs;
    use segadmit_common::{SegmentName, TableName};

    fn key(segment: &str) -> SegmentKey {
        SegmentKey::new(
            TableName::new("events").unwrap(),
            SegmentName::new(segment).unwrap(),
        )
    }

    #[test]
    fn test_final_segment_uri() {
        assert_eq!(
            final_segment_uri("file:///data/segments", &key("seg_0")).unwrap(),
            "file:///data/segments/events_OFFLINE/seg_0"
        );
        assert_eq!(
            final_segment_uri("file:///data/segments/", &key("seg_0")).unwrap(),
            "file:///data/segments/events_OFFLINE/seg_0"
        );
        assert_eq!(
            final_segment_uri("/data/segments", &key("seg 1#a")).unwrap(),
            "file:///data/segments/events_OFFLINE/seg%201%23a"
        );
    }

    #[test]
    fn test_dot_segments_rejected() {
        for part in [".", "..", ""] {
            let err = append_path("file:///data/segments", &["events_OFFLINE", part]).unwrap_err();
            assert!(matches!(err, FsError::InvalidUri(_)), "{part:?}: {err}");
        }
        assert_eq!(
            append_path("mem://segments", &["events_OFFLINE", "..seg"]).unwrap(),
            "mem://segments/events_OFFLINE/..seg"
        );
    }

    #[tokio::test]
    async fn test_place_through_registry() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("upload.tmp");
        tokio::fs::write(&staging, b"segment").await.unwrap();

        let mem = Arc::new(MemoryFs::new());
        let mut registry = SegmentFsRegistry::with_local();
        registry.register(mem.clone());
        let placer = SegmentPlacer::new(Arc::new(registry));

        placer.place(&staging, "mem://root/events/s").await.unwrap();
        assert_eq!(mem.get("mem://root/events/s"), Some(b"segment".to_vec()));

        let local_dest = dir.path().join("final").join("s");
        placer
            .place(&staging, local_dest.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(tokio::fs::read(&local_dest).await.unwrap(), b"segment");
    }

    #[tokio::test]
    async fn test_unknown_scheme() {
        let placer = SegmentPlacer::new(Arc::new(SegmentFsRegistry::with_local()));
        let err = placer
            .place(Path::new("/tmp/x"), "gs://bucket/seg")
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::UnsupportedScheme(_)));
    }
}
