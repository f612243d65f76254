//! Intermediate record model: the format-agnostic stream every extractor emits
//! and the mapper consumes.
//!
//! Attribute keys recognised downstream, per producer:
//!
//! | Producer  | Item       | Keys                                                        |
//! |-----------|------------|-------------------------------------------------------------|
//! | git       | step       | `phase`, `message`, `time`                                  |
//! | git       | principal  | `email`                                                     |
//! | git       | artifacts  | `content-hash`, `size`, `mode`, `message`, `author`, `time`, `role`, `index` |
//! | buildinfo | step       | `command`, `timestamp`, `architecture`, `phase`, `consumed`, `env.*` |
//! | buildinfo | principal  | `trust_level`, `builder`, `pgp_key_id`                      |
//! | buildinfo | artifacts  | `content-hash`, `size`, `version`                           |
//! | buildinfo | resources  | `uri`, `format`, `used_by`                                  |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A labeled node-to-be. IDs are namespaced by kind and globally unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    pub id: String,
    pub label: String,
    pub kind: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
}

impl Item {
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: kind.into(),
            attrs: BTreeMap::new(),
        }
    }

    /// Builder-style attribute insertion.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Attribute value, treating whitespace-only values as absent.
    pub fn attr(&self, key: &str) -> Option<&str> {
        non_blank(&self.attrs, key)
    }
}

/// Look up `key` in an attribute map, ignoring blank values.
pub(crate) fn non_blank<'a>(attrs: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    attrs
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

/// One unit of provenance evidence: who ran which step on what.
///
/// An empty step or principal ID is valid; those parts are skipped by the mapper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    pub step: Item,
    pub principal: Item,
    pub artifacts_in: Vec<Item>,
    pub artifacts_out: Vec<Item>,
    pub resources: Vec<Item>,
}

/// Full output of one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordStream {
    #[serde(rename = "mapped")]
    pub records: Vec<Record>,
    pub source: String,
    pub normalized_at: i64,
}

impl RecordStream {
    /// An empty stream stamped with the current time.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            source: source.into(),
            normalized_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_field_names() {
        let mut stream = RecordStream::new("git");
        stream.records.push(Record {
            step: Item::new("step:1", "Commit", "step").with_attr("phase", "source"),
            ..Default::default()
        });

        let json = serde_json::to_value(&stream).unwrap();
        assert_eq!(json["source"], "git");
        assert!(json["normalized_at"].as_i64().unwrap() > 0);
        let record = &json["mapped"][0];
        assert_eq!(record["step"]["id"], "step:1");
        assert_eq!(record["step"]["attrs"]["phase"], "source");
        assert!(record["artifacts_in"].as_array().unwrap().is_empty());
        assert!(record["artifacts_out"].is_array());
        assert!(record["resources"].is_array());
    }

    #[test]
    fn test_missing_fields_default() {
        let stream: RecordStream =
            serde_json::from_str(r#"{"mapped":[{"step":{"id":"s"}}],"source":"x"}"#).unwrap();
        assert_eq!(stream.normalized_at, 0);
        assert_eq!(stream.records[0].step.id, "s");
        assert!(stream.records[0].principal.id.is_empty());
        assert!(stream.records[0].step.attrs.is_empty());
    }

    #[test]
    fn test_attr_ignores_blank_values() {
        let item = Item::new("a", "a", "k")
            .with_attr("size", "  ")
            .with_attr("mode", "0100644");
        assert_eq!(item.attr("size"), None);
        assert_eq!(item.attr("mode"), Some("0100644"));
        assert_eq!(item.attr("missing"), None);
    }
}
