//! Typed provenance graph: the read-only contract offered to visualization,
//! risk and condensation consumers.

pub mod dot;
pub mod index;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A versioned piece of content (file, commit, package).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Artifact {
    pub id: String,
    pub kind: String,
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub metadata: BTreeMap<String, String>,
}

/// A build action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Step {
    pub id: String,
    pub command: String,
    pub timestamp: String,
    pub architecture: String,
    pub environment: BTreeMap<String, String>,
    pub metadata: BTreeMap<String, String>,
}

/// An actor or build system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Principal {
    pub id: String,
    pub name: String,
    pub trust_level: String,
    pub builder: String,
    pub metadata: BTreeMap<String, String>,
}

/// An external dependency or tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub uri: String,
    pub format: String,
    pub metadata: BTreeMap<String, String>,
}

/// Edge relation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// step → input artifact (or consumed resource)
    Consumes,
    /// step → output artifact
    Produces,
    /// principal → resource
    Uses,
    /// resource → step
    CarriesOut,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Consumes => "consumes",
            Relation::Produces => "produces",
            Relation::Uses => "uses",
            Relation::CarriesOut => "carries_out",
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub relation: Relation,
}

impl Edge {
    /// Total ordering key: `(source, relation, target)`.
    pub fn sort_key(&self) -> (&str, &str, &str) {
        (self.source.as_str(), self.relation.as_str(), self.target.as_str())
    }
}

/// The four node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Artifact,
    Step,
    Principal,
    Resource,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Artifact => "artifact",
            NodeKind::Step => "step",
            NodeKind::Principal => "principal",
            NodeKind::Resource => "resource",
        }
    }

    /// Parse case-insensitively, accepting plural forms.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().trim_end_matches('s') {
            "artifact" => Some(NodeKind::Artifact),
            "step" => Some(NodeKind::Step),
            "principal" => Some(NodeKind::Principal),
            "resource" => Some(NodeKind::Resource),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance graph. Collections are kept in the deterministic order the
/// mapper emits: nodes by ascending ID, edges by `(source, relation, target)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Graph {
    pub artifacts: Vec<Artifact>,
    pub steps: Vec<Step>,
    pub principals: Vec<Principal>,
    pub resources: Vec<Resource>,
    pub edges: Vec<Edge>,
}

/// Optional restrictions for consumers that work on a slice of the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphFilter {
    /// Keep only nodes of this kind.
    pub kind: Option<NodeKind>,
    /// Keep only steps whose `phase` metadata matches, plus the nodes they touch.
    pub phase: Option<String>,
}

/// Node and edge counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub artifacts: usize,
    pub steps: usize,
    pub principals: usize,
    pub resources: usize,
    pub edges: usize,
}

impl Graph {
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            artifacts: self.artifacts.len(),
            steps: self.steps.len(),
            principals: self.principals.len(),
            resources: self.resources.len(),
            edges: self.edges.len(),
        }
    }

    /// Every node ID mapped to its kind.
    ///
    /// IDs are unique per kind only; when two kinds share an ID the earlier
    /// kind in `NodeKind` order is reported.
    pub fn node_kinds(&self) -> HashMap<&str, NodeKind> {
        let mut kinds = HashMap::new();
        let all = self
            .artifacts
            .iter()
            .map(|n| (n.id.as_str(), NodeKind::Artifact))
            .chain(self.steps.iter().map(|n| (n.id.as_str(), NodeKind::Step)))
            .chain(
                self.principals
                    .iter()
                    .map(|n| (n.id.as_str(), NodeKind::Principal)),
            )
            .chain(
                self.resources
                    .iter()
                    .map(|n| (n.id.as_str(), NodeKind::Resource)),
            );
        for (id, kind) in all {
            kinds.entry(id).or_insert(kind);
        }
        kinds
    }

    pub fn node_ids(&self) -> BTreeSet<&str> {
        self.node_kinds().into_keys().collect()
    }

    pub fn node_kind(&self, id: &str) -> Option<NodeKind> {
        self.node_kinds().get(id).copied()
    }

    /// Edges whose source or target has no node in the graph.
    pub fn dangling_edges(&self) -> Vec<&Edge> {
        let ids = self.node_ids();
        self.edges
            .iter()
            .filter(|e| !ids.contains(e.source.as_str()) || !ids.contains(e.target.as_str()))
            .collect()
    }

    /// A new graph restricted by `filter`. `self` is left untouched.
    ///
    /// Edges survive only when both endpoints survive; dangling edges are
    /// dropped from the result.
    pub fn filtered(&self, filter: &GraphFilter) -> Graph {
        let mut keep: BTreeSet<&str> = self.node_ids();

        if let Some(phase) = &filter.phase {
            let steps: BTreeSet<&str> = self
                .steps
                .iter()
                .filter(|s| s.metadata.get("phase").is_some_and(|p| p == phase))
                .map(|s| s.id.as_str())
                .collect();
            let mut touched = steps.clone();
            for edge in &self.edges {
                if steps.contains(edge.source.as_str()) {
                    touched.insert(edge.target.as_str());
                }
                if steps.contains(edge.target.as_str()) {
                    touched.insert(edge.source.as_str());
                }
            }
            // principals reach steps only through resources
            for edge in &self.edges {
                if edge.relation == Relation::Uses && touched.contains(edge.target.as_str()) {
                    touched.insert(edge.source.as_str());
                }
            }
            keep.retain(|id| touched.contains(id));
        }

        if let Some(kind) = filter.kind {
            let kinds = self.node_kinds();
            keep.retain(|id| kinds.get(id) == Some(&kind));
        }

        let keeps = |id: &str| keep.contains(id);
        Graph {
            artifacts: self
                .artifacts
                .iter()
                .filter(|n| keeps(n.id.as_str()))
                .cloned()
                .collect(),
            steps: self.steps.iter().filter(|n| keeps(n.id.as_str())).cloned().collect(),
            principals: self
                .principals
                .iter()
                .filter(|n| keeps(n.id.as_str()))
                .cloned()
                .collect(),
            resources: self
                .resources
                .iter()
                .filter(|n| keeps(n.id.as_str()))
                .cloned()
                .collect(),
            edges: self
                .edges
                .iter()
                .filter(|e| keeps(e.source.as_str()) && keeps(e.target.as_str()))
                .cloned()
                .collect(),
        }
    }
}
