//! Storage error types.

use thiserror::Error;

/// Errors raised while placing segment files
#[derive(Debug, Error)]
pub enum FsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid uri: {0}")]
    InvalidUri(String),

    #[error("no filesystem registered for scheme: {0}")]
    UnsupportedScheme(String),
}

pub type FsResult<T> = Result<T, FsError>;
