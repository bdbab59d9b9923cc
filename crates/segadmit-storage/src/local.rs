//! Local filesystem backend (`file://` URIs).

use crate::error::{FsError, FsResult};
use crate::fs::SegmentFs;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// Scheme served by [`LocalFs`]
pub const FILE_SCHEME: &str = "file";

/// Segment filesystem on local disk
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl LocalFs {
    /// Create a new local filesystem
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn to_path(uri: &Url) -> FsResult<PathBuf> {
        if uri.scheme() != FILE_SCHEME {
            return Err(FsError::UnsupportedScheme(uri.scheme().to_string()));
        }
        uri.to_file_path()
            .map_err(|()| FsError::InvalidUri(uri.to_string()))
    }

    /// Temp sibling of `path` that a copy is staged into before the rename
    fn temp_path(path: &Path) -> PathBuf {
        let temp_name = format!(".tmp.{}", Uuid::new_v4());
        path.with_file_name(
            path.file_name()
                .map(|n| format!("{}{}", n.to_string_lossy(), temp_name))
                .unwrap_or_else(|| temp_name.clone()),
        )
    }
}

#[async_trait]
impl SegmentFs for LocalFs {
    fn scheme(&self) -> &str {
        FILE_SCHEME
    }

    async fn copy_from_local(&self, local: &Path, destination: &Url) -> FsResult<()> {
        let path = Self::to_path(destination)?;
        if !fs::try_exists(local).await? {
            return Err(FsError::NotFound(local.display().to_string()));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Copy to a unique temp file, fsync, then rename over the destination
        // so readers only ever see a complete segment. The parent directory is
        // synced last so the rename itself survives a crash.
        let temp_path = Self::temp_path(&path);
        let copied = async {
            fs::copy(local, &temp_path).await?;
            fs::File::open(&temp_path).await?.sync_all().await?;
            fs::rename(&temp_path, &path).await?;
            if let Some(parent) = path.parent() {
                fs::File::open(parent).await?.sync_all().await?;
            }
            Ok::<_, std::io::Error>(())
        }
        .await;
        if let Err(e) = copied {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!("Copied {} to {}", local.display(), path.display());
        Ok(())
    }

    async fn exists(&self, uri: &Url) -> FsResult<bool> {
        let path = Self::to_path(uri)?;
        Ok(fs::try_exists(&path).await?)
    }
}
