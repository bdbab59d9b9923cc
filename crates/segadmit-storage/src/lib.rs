//! SegAdmit Storage - segment file placement
//!
//! This crate implements the file side of segment admission:
//! - Filesystems addressed by URI scheme (local disk, in-memory)
//! - A scheme registry resolving final-location URIs
//! - The segment placer that copies staged files to their final location

pub mod error;
pub mod fs;
pub mod local;
pub mod memory;
pub mod placer;
pub mod registry;

// Re-exports
pub use error::{FsError, FsResult};
pub use fs::SegmentFs;
pub use local::LocalFs;
pub use memory::MemoryFs;
pub use placer::{SegmentPlacer, final_segment_uri};
pub use registry::{SegmentFsRegistry, parse_uri};
