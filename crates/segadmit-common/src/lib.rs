//! SegAdmit Common - Shared types and utilities
//!
//! This crate provides the segment identifiers, the admission error
//! taxonomy, configuration and checksum helpers used across all
//! SegAdmit components.

pub mod checksum;
pub mod config;
pub mod error;
pub mod types;

pub use checksum::{SegmentCrc, SegmentCrcCalculator};
pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
