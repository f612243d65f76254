//! Item → typed node conversion and the attribute fallback chains.

use crate::graph::{Artifact, Principal, Resource, Step};
use crate::record::{Item, non_blank};
use std::collections::BTreeMap;

/// Trust level assigned to principals that do not declare one.
pub const DEFAULT_TRUST: &str = "unknown";

/// Step attribute listing consumed node IDs, comma separated.
pub const CONSUMED_ATTR: &str = "consumed";

/// Step attribute prefix for environment variables.
pub const ENV_PREFIX: &str = "env.";

/// Convert an item into an artifact. All attrs are kept as metadata; hash,
/// size and version are additionally promoted to typed fields.
pub fn artifact(item: &Item) -> Artifact {
    let kind = item.kind.trim();
    Artifact {
        id: item.id.clone(),
        kind: if kind.is_empty() { "artifact" } else { kind }.to_string(),
        name: item.label.clone(),
        version: item
            .attr("version")
            .map(str::to_string)
            .unwrap_or_else(|| version_from_id(&item.id)),
        hash: item.attr("content-hash").map(str::to_string),
        size: item.attr("size").and_then(|s| s.trim().parse().ok()),
        metadata: item.attrs.clone(),
    }
}

/// Best-effort version from an ID: the text after the last `@`, cut at the
/// next `:`.
///
/// `artifact:gitfile:<slug>@<hash>:<path>` and `artifact:gitcommit:<slug>@<hash>`
/// both yield `<hash>`. IDs without `@` (or ending in one) yield "".
pub fn version_from_id(id: &str) -> String {
    let Some(at) = id.rfind('@') else {
        return String::new();
    };
    let rest = &id[at + 1..];
    match rest.find(':') {
        Some(end) => rest[..end].to_string(),
        None => rest.to_string(),
    }
}

pub fn step(item: &Item) -> Step {
    let attrs = &item.attrs;
    Step {
        id: item.id.clone(),
        command: first_of(attrs, &["command", "label"]),
        timestamp: first_of(attrs, &["time", "timestamp"]),
        architecture: first_of(attrs, &["architecture"]),
        environment: attrs
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(ENV_PREFIX)
                    .filter(|key| !key.is_empty())
                    .map(|key| (key.to_string(), v.clone()))
            })
            .collect(),
        metadata: attrs.clone(),
    }
}

/// Node IDs a step declares as consumed in addition to its input artifacts.
pub fn consumed_ids(item: &Item) -> Vec<&str> {
    item.attr(CONSUMED_ATTR)
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

pub fn principal(item: &Item) -> Principal {
    Principal {
        id: item.id.clone(),
        name: item.label.clone(),
        trust_level: item.attr("trust_level").unwrap_or(DEFAULT_TRUST).to_string(),
        builder: item.attr("builder").unwrap_or_default().to_string(),
        metadata: item.attrs.clone(),
    }
}

pub fn resource(item: &Item) -> Resource {
    let kind = item.kind.trim();
    Resource {
        id: item.id.clone(),
        resource_type: if kind.is_empty() {
            item.attr("type").unwrap_or_default().to_string()
        } else {
            kind.to_string()
        },
        uri: item.attr("uri").unwrap_or_default().to_string(),
        format: resource_format(item),
        metadata: item.attrs.clone(),
    }
}

/// Explicit `format` attr, else "git" when the ID mentions git.
fn resource_format(item: &Item) -> String {
    if let Some(format) = item.attr("format") {
        return format.to_string();
    }
    if item.id.to_lowercase().contains("git") {
        return "git".to_string();
    }
    String::new()
}

fn first_of(attrs: &BTreeMap<String, String>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| non_blank(attrs, key))
        .unwrap_or_default()
        .to_string()
}
