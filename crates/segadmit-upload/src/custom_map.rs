//! Custom map modifier.
//!
//! Uploaders attach caller-defined metadata to a segment as a JSON header:
//!
//! ```json
//! {"modifyMode": "MERGE", "customMap": {"owner": "ingest", "stale": null}}
//! ```
//!
//! `REPLACE` discards the existing map. `MERGE` overlays the given entries
//! and removes keys whose value is `null`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a modifier combines with the existing custom map
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModifyMode {
    #[default]
    Replace,
    Merge,
}

/// Caller-supplied change to a segment's custom map
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomMapModifier {
    pub modify_mode: ModifyMode,
    #[serde(default)]
    pub custom_map: Option<BTreeMap<String, Option<String>>>,
}

impl CustomMapModifier {
    /// Replace the map with `entries`
    pub fn replace<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::with_entries(
            ModifyMode::Replace,
            entries.into_iter().map(|(k, v)| (k.into(), Some(v.into()))),
        )
    }

    /// Merge `entries` into the existing map
    pub fn merge<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::with_entries(
            ModifyMode::Merge,
            entries.into_iter().map(|(k, v)| (k.into(), Some(v.into()))),
        )
    }

    fn with_entries(mode: ModifyMode, entries: impl Iterator<Item = (String, Option<String>)>) -> Self {
        Self {
            modify_mode: mode,
            custom_map: Some(entries.collect()),
        }
    }

    /// Remove `key` when merging
    #[must_use]
    pub fn removing(mut self, key: impl Into<String>) -> Self {
        self.custom_map
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), None);
        self
    }

    /// Parse the JSON wire form
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// JSON wire form
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Apply the modifier to `existing`
    pub fn modify(&self, existing: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let entries = self.custom_map.iter().flatten();
        match self.modify_mode {
            ModifyMode::Replace => entries
                .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
                .collect(),
            ModifyMode::Merge => {
                let mut merged = existing.clone();
                for (k, v) in entries {
                    match v {
                        Some(v) => {
                            merged.insert(k.clone(), v.clone());
                        }
                        None => {
                            merged.remove(k);
                        }
                    }
                }
                merged
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("owner".to_string(), "ingest".to_string()),
            ("tier".to_string(), "hot".to_string()),
        ])
    }

    #[test]
    fn test_replace_discards_existing() {
        let modifier = CustomMapModifier::replace([("source", "backfill")]);
        assert_eq!(
            modifier.modify(&existing()),
            BTreeMap::from([("source".to_string(), "backfill".to_string())])
        );
        assert!(CustomMapModifier::default().modify(&existing()).is_empty());
    }

    #[test]
    fn test_merge_overlays_and_removes() {
        let modifier = CustomMapModifier::merge([("tier", "cold"), ("source", "backfill")])
            .removing("owner");
        assert_eq!(
            modifier.modify(&existing()),
            BTreeMap::from([
                ("source".to_string(), "backfill".to_string()),
                ("tier".to_string(), "cold".to_string()),
            ])
        );
    }

    #[test]
    fn test_parse_wire_format() {
        let modifier = CustomMapModifier::parse(
            r#"{"modifyMode":"MERGE","customMap":{"tier":"cold","owner":null}}"#,
        )
        .unwrap();
        assert_eq!(modifier.modify_mode, ModifyMode::Merge);
        assert_eq!(
            modifier.modify(&existing()),
            BTreeMap::from([("tier".to_string(), "cold".to_string())])
        );

        let modifier = CustomMapModifier::parse(r#"{"modifyMode":"REPLACE"}"#).unwrap();
        assert!(modifier.modify(&existing()).is_empty());

        assert!(CustomMapModifier::parse(r#"{"modifyMode":"APPEND"}"#).is_err());
        assert!(CustomMapModifier::parse("not json").is_err());
    }

    #[test]
    fn test_json_round_trip_keeps_removals() {
        let modifier = CustomMapModifier::merge([("a", "1")]).removing("b");
        let json = modifier.to_json().unwrap();
        assert!(json.contains(r#""modifyMode":"MERGE""#));
        assert!(json.contains(r#""b":null"#));
        assert_eq!(CustomMapModifier::parse(&json).unwrap(), modifier);
    }
}
