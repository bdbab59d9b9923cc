//! Checksum utilities for SegAdmit
//!
//! A segment's crc is the CRC32C of its bytes widened to `u64`, which is
//! the width the metadata record stores.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read buffer used when checksumming files
const READ_BUF_SIZE: usize = 64 * 1024;

/// Checksum of a segment's content
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentCrc {
    /// Checksum value stored in the segment record
    pub value: u64,
    /// Number of bytes covered
    pub length: u64,
}

impl SegmentCrc {
    /// Compute the checksum of an in-memory buffer
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        let mut calc = SegmentCrcCalculator::new();
        calc.update(data);
        calc.finalize()
    }

    /// Compute the checksum of a file, streaming its content
    pub fn compute_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let mut calc = SegmentCrcCalculator::new();
        let mut buf = vec![0u8; READ_BUF_SIZE];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            calc.update(&buf[..n]);
        }
        Ok(calc.finalize())
    }
}

/// Streaming segment checksum calculator
#[derive(Debug, Default)]
pub struct SegmentCrcCalculator {
    crc32c: u32,
    length: u64,
}

impl SegmentCrcCalculator {
    /// Create a new calculator
    #[must_use]
    pub const fn new() -> Self {
        Self {
            crc32c: 0,
            length: 0,
        }
    }

    /// Update the calculator with more data
    pub fn update(&mut self, data: &[u8]) {
        self.crc32c = crc32c::crc32c_append(self.crc32c, data);
        self.length += data.len() as u64;
    }

    /// Finalize and return the computed checksum
    #[must_use]
    pub fn finalize(self) -> SegmentCrc {
        SegmentCrc {
            value: u64::from(self.crc32c),
            length: self.length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_streaming_matches_one_shot() {
        let expected = SegmentCrc::compute(b"segment bytes, all of them");

        let mut calc = SegmentCrcCalculator::new();
        calc.update(b"segment bytes, ");
        calc.update(b"all of them");
        let actual = calc.finalize();

        assert_eq!(expected, actual);
        assert_eq!(actual.length, 26);
        assert_eq!(actual.value, u64::from(crc32c::crc32c(b"segment bytes, all of them")));
    }

    #[test]
    fn test_compute_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data = vec![7u8; READ_BUF_SIZE * 2 + 13];
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let crc = SegmentCrc::compute_file(file.path()).unwrap();
        assert_eq!(crc, SegmentCrc::compute(&data));
    }

    #[test]
    fn test_compute_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SegmentCrc::compute_file(dir.path().join("missing")).is_err());
    }
}
