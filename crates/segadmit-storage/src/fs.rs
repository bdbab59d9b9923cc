//! Filesystem trait for segment placement.

use crate::error::FsResult;
use async_trait::async_trait;
use std::path::Path;
use url::Url;

/// A filesystem that can receive segment files, addressed by URI scheme
#[async_trait]
pub trait SegmentFs: Send + Sync {
    /// URI scheme this filesystem serves (e.g. `file`)
    fn scheme(&self) -> &str;

    /// Copy a local file to `destination`, overwriting whatever is there.
    ///
    /// Must be safe to repeat with the same arguments.
    async fn copy_from_local(&self, local: &Path, destination: &Url) -> FsResult<()>;

    /// Check whether `uri` exists
    async fn exists(&self, uri: &Url) -> FsResult<bool>;
}
