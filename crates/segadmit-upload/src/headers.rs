//! Upload request headers.

use crate::custom_map::CustomMapModifier;
use http::HeaderMap;
use segadmit_common::{Error, Result};

/// Expected crc of the currently committed segment
pub const IF_MATCH: &str = "If-Match";

/// JSON custom map modifier
pub const CUSTOM_MAP_MODIFIER: &str = "Segment-Custom-Map-Modifier";

/// Crypter the uploaded bytes were encrypted with
pub const CRYPTER: &str = "Crypter";

/// Admission-relevant headers of an upload request, kept raw until used
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadHeaders {
    pub if_match: Option<String>,
    pub custom_map_modifier: Option<String>,
    pub crypter: Option<String>,
}

impl UploadHeaders {
    /// Extract the upload headers from an HTTP header map
    pub fn from_header_map(headers: &HeaderMap) -> Result<Self> {
        Ok(Self {
            if_match: header_value(headers, IF_MATCH)?,
            custom_map_modifier: header_value(headers, CUSTOM_MAP_MODIFIER)?,
            crypter: header_value(headers, CRYPTER)?,
        })
    }

    #[must_use]
    pub fn with_if_match(mut self, crc: impl ToString) -> Self {
        self.if_match = Some(crc.to_string());
        self
    }

    pub fn with_custom_map_modifier(mut self, modifier: &CustomMapModifier) -> Result<Self> {
        let json = modifier
            .to_json()
            .map_err(|e| Error::invalid_argument(format!("cannot encode custom map modifier: {e}")))?;
        self.custom_map_modifier = Some(json);
        Ok(self)
    }

    #[must_use]
    pub fn with_crypter(mut self, crypter: impl Into<String>) -> Self {
        self.crypter = Some(crypter.into());
        self
    }

    /// Parsed custom map modifier.
    ///
    /// Without the header the custom map is replaced with an empty one.
    pub fn custom_map_modifier(&self) -> serde_json::Result<CustomMapModifier> {
        match &self.custom_map_modifier {
            None => Ok(CustomMapModifier::default()),
            Some(raw) => CustomMapModifier::parse(raw),
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Result<Option<String>> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::to_string)
                .map_err(|e| Error::invalid_argument(format!("invalid {name} header: {e}")))
        })
        .transpose()
}
