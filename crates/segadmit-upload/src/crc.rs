//! Conditional admission on the expected segment crc.
//!
//! Uploaders may send the crc they believe is currently committed in an
//! `If-Match` header. The admission only proceeds if it matches.

use segadmit_common::{Error, Result, SegmentKey};
use std::num::ParseIntError;

/// Parse an expected crc, tolerating surrounding whitespace and quotes
pub fn parse_expected_crc(raw: &str) -> std::result::Result<u64, ParseIntError> {
    raw.trim().trim_matches('"').parse::<u64>()
}

/// Check the uploader's expected crc against the committed one.
///
/// No expectation always passes. A malformed expectation fails the same
/// way a mismatch does.
pub fn validate_expected_crc(key: &SegmentKey, expected: Option<&str>, existing: u64) -> Result<()> {
    let Some(raw) = expected else {
        return Ok(());
    };
    let expected = parse_expected_crc(raw).map_err(|e| {
        Error::precondition_failed(key, format!("cannot parse expected crc \"{raw}\": {e}"))
    })?;
    if expected != existing {
        return Err(Error::precondition_failed(
            key,
            format!("expected crc {expected} does not match existing crc {existing}"),
        ));
    }
    Ok(())
}
