//! Record stream → provenance graph.
//!
//! Relations emitted per record:
//!
//! ```text
//! step      --consumes-->    artifact_in   (and every ID in the step's `consumed` attr)
//! step      --produces-->    artifact_out
//! principal --uses-->        resource
//! resource  --carries_out--> step
//! ```
//!
//! Nodes are first-write-wins: once an ID is registered for a kind, later items
//! with the same ID contribute nothing. Edges are unique by
//! `(source, relation, target)`; edges with an empty endpoint are dropped.
//! Edges are not checked against the node tables, see [`Graph::dangling_edges`].

pub mod normalize;

use crate::graph::{Artifact, Edge, Graph, Principal, Relation, Resource, Step};
use crate::record::{Item, Record, RecordStream};
use std::collections::{HashMap, HashSet};

/// Append-only ID-keyed table that remembers insertion slots.
struct Table<T> {
    slots: HashMap<String, usize>,
    values: Vec<T>,
}

impl<T> Table<T> {
    fn new() -> Self {
        Self {
            slots: HashMap::new(),
            values: Vec::new(),
        }
    }

    /// Insert unless the ID is already present. Returns whether it was new.
    fn insert_with(&mut self, id: &str, make: impl FnOnce() -> T) -> bool {
        if self.slots.contains_key(id) {
            tracing::trace!(id, "duplicate node ignored");
            return false;
        }
        self.slots.insert(id.to_string(), self.values.len());
        self.values.push(make());
        true
    }

    fn into_sorted(self, key: impl Fn(&T) -> &str) -> Vec<T> {
        let mut values = self.values;
        values.sort_by(|a, b| key(a).cmp(key(b)));
        values
    }
}

/// Accumulates records into node tables and an edge set, scoped to one
/// mapping invocation.
pub struct GraphBuilder {
    artifacts: Table<Artifact>,
    steps: Table<Step>,
    principals: Table<Principal>,
    resources: Table<Resource>,
    edges: Vec<Edge>,
    edge_keys: HashSet<(String, Relation, String)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            artifacts: Table::new(),
            steps: Table::new(),
            principals: Table::new(),
            resources: Table::new(),
            edges: Vec::new(),
            edge_keys: HashSet::new(),
        }
    }

    /// Merge one record.
    pub fn ingest(&mut self, record: &Record) {
        let step_id = record.step.id.as_str();
        let principal_id = record.principal.id.as_str();

        if !principal_id.is_empty() {
            self.principals
                .insert_with(principal_id, || normalize::principal(&record.principal));
        }

        if !step_id.is_empty() {
            self.steps
                .insert_with(step_id, || normalize::step(&record.step));
        }

        for resource in non_empty(&record.resources) {
            self.resources
                .insert_with(&resource.id, || normalize::resource(resource));
        }

        for input in non_empty(&record.artifacts_in) {
            self.register_artifact(input);
            self.add_edge(step_id, Relation::Consumes, &input.id);
        }

        for consumed in normalize::consumed_ids(&record.step) {
            self.add_edge(step_id, Relation::Consumes, consumed);
        }

        for output in non_empty(&record.artifacts_out) {
            self.register_artifact(output);
            self.add_edge(step_id, Relation::Produces, &output.id);
        }

        for resource in &record.resources {
            self.add_edge(principal_id, Relation::Uses, &resource.id);
            self.add_edge(&resource.id, Relation::CarriesOut, step_id);
        }
    }

    fn register_artifact(&mut self, item: &Item) {
        self.artifacts
            .insert_with(&item.id, || normalize::artifact(item));
    }

    /// Add an edge unless an endpoint is empty or the triple already exists.
    pub fn add_edge(&mut self, source: &str, relation: Relation, target: &str) -> bool {
        if source.is_empty() || target.is_empty() {
            return false;
        }
        if !self
            .edge_keys
            .insert((source.to_string(), relation, target.to_string()))
        {
            return false;
        }
        self.edges.push(Edge {
            source: source.to_string(),
            target: target.to_string(),
            relation,
        });
        true
    }

    /// Flatten the tables and apply the total ordering.
    pub fn finish(self) -> Graph {
        let mut edges = self.edges;
        edges.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        Graph {
            artifacts: self.artifacts.into_sorted(|a| a.id.as_str()),
            steps: self.steps.into_sorted(|s| s.id.as_str()),
            principals: self.principals.into_sorted(|p| p.id.as_str()),
            resources: self.resources.into_sorted(|r| r.id.as_str()),
            edges,
        }
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(items: &[Item]) -> impl Iterator<Item = &Item> {
    items.iter().filter(|item| !item.id.is_empty())
}

/// Map a complete record stream into a graph. Total over any stream.
pub fn to_graph(stream: &RecordStream) -> Graph {
    let mut builder = GraphBuilder::new();
    for record in &stream.records {
        builder.ingest(record);
    }
    let graph = builder.finish();
    tracing::debug!(
        source = %stream.source,
        records = stream.records.len(),
        artifacts = graph.artifacts.len(),
        steps = graph.steps.len(),
        principals = graph.principals.len(),
        resources = graph.resources.len(),
        edges = graph.edges.len(),
        "mapped record stream"
    );
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn commit_record(n: &str, files: &[&str]) -> Record {
        let mut record = Record {
            step: Item::new(format!("step:commit:h/o/r@{n}"), "Commit", "step")
                .with_attr("phase", "source"),
            principal: Item::new("principal:dev@example.org", "Dev", "principal")
                .with_attr("email", "dev@example.org"),
            resources: vec![Item::new("resource:git", "git", "vcs")],
            ..Default::default()
        };
        record.artifacts_out.push(Item::new(
            format!("artifact:gitcommit:h/o/r@{n}"),
            n,
            "git-commit",
        ));
        for f in files {
            record.artifacts_out.push(
                Item::new(format!("artifact:gitfile:h/o/r@{n}:{f}"), *f, "git-file")
                    .with_attr("content-hash", format!("hash-{f}")),
            );
        }
        record
    }

    fn edge_triples(graph: &Graph) -> Vec<(String, &'static str, String)> {
        graph
            .edges
            .iter()
            .map(|e| (e.source.clone(), e.relation.as_str(), e.target.clone()))
            .collect()
    }

    #[test]
    fn test_single_commit_graph() {
        let stream = RecordStream {
            records: vec![commit_record("c1", &["b.txt", "a.txt"])],
            source: "git".into(),
            normalized_at: 1,
        };
        let graph = to_graph(&stream);

        assert_eq!(graph.principals.len(), 1);
        assert_eq!(graph.principals[0].trust_level, "unknown");
        assert_eq!(graph.steps.len(), 1);
        assert_eq!(graph.resources.len(), 1);
        assert_eq!(graph.resources[0].format, "git");
        let ids: Vec<&str> = graph.artifacts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "artifact:gitcommit:h/o/r@c1",
                "artifact:gitfile:h/o/r@c1:a.txt",
                "artifact:gitfile:h/o/r@c1:b.txt",
            ]
        );
        assert_eq!(
            edge_triples(&graph),
            vec![
                ("principal:dev@example.org".to_string(), "uses", "resource:git".to_string()),
                ("resource:git".to_string(), "carries_out", "step:commit:h/o/r@c1".to_string()),
                ("step:commit:h/o/r@c1".to_string(), "produces", "artifact:gitcommit:h/o/r@c1".to_string()),
                ("step:commit:h/o/r@c1".to_string(), "produces", "artifact:gitfile:h/o/r@c1:a.txt".to_string()),
                ("step:commit:h/o/r@c1".to_string(), "produces", "artifact:gitfile:h/o/r@c1:b.txt".to_string()),
            ]
        );
        assert!(graph.dangling_edges().is_empty());
    }

    #[test]
    fn test_first_write_wins() {
        let first = Record {
            artifacts_out: vec![Item::new("shared", "first", "git-file").with_attr("origin", "one")],
            ..Default::default()
        };
        let second = Record {
            artifacts_in: vec![
                Item::new("shared", "second", "binary")
                    .with_attr("origin", "two")
                    .with_attr("extra", "ignored"),
            ],
            ..Default::default()
        };
        let graph = to_graph(&RecordStream {
            records: vec![first, second],
            ..Default::default()
        });

        assert_eq!(graph.artifacts.len(), 1);
        let a = &graph.artifacts[0];
        assert_eq!(a.name, "first");
        assert_eq!(a.kind, "git-file");
        assert_eq!(a.metadata["origin"], "one");
        assert!(!a.metadata.contains_key("extra"));
    }

    #[test]
    fn test_empty_ids_are_skipped() {
        let record = Record {
            artifacts_in: vec![Item::new("", "nameless", "git-file")],
            artifacts_out: vec![Item::new("out", "out", "binary")],
            resources: vec![Item::new("resource:git", "git", "vcs")],
            ..Default::default()
        };
        let graph = to_graph(&RecordStream {
            records: vec![record],
            ..Default::default()
        });

        assert!(graph.steps.is_empty());
        assert!(graph.principals.is_empty());
        assert_eq!(graph.artifacts.len(), 1);
        assert_eq!(graph.resources.len(), 1);
        // every edge would have an empty endpoint
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let record = commit_record("c1", &["a.txt"]);
        let graph = to_graph(&RecordStream {
            records: vec![record.clone(), record],
            ..Default::default()
        });
        assert_eq!(graph.edges.len(), 4);
        assert_eq!(graph.artifacts.len(), 2);
    }

    #[test]
    fn test_consumed_attr_adds_edges() {
        let record = Record {
            step: Item::new("build-hello@1.0-1", "hello", "build")
                .with_attr("consumed", "libfoo@1.2,hello_1.0.orig.tar.xz"),
            resources: vec![
                Item::new("libfoo@1.2", "libfoo", "build-dependency"),
                Item::new("hello_1.0.orig.tar.xz", "hello_1.0.orig.tar.xz", "tarball"),
            ],
            ..Default::default()
        };
        let graph = to_graph(&RecordStream {
            records: vec![record],
            ..Default::default()
        });
        let consumes: Vec<&str> = graph
            .edges
            .iter()
            .filter(|e| e.relation == Relation::Consumes)
            .map(|e| e.target.as_str())
            .collect();
        assert_eq!(consumes, vec!["hello_1.0.orig.tar.xz", "libfoo@1.2"]);
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let stream = RecordStream {
            records: vec![
                commit_record("c2", &["z.txt", "m.txt"]),
                commit_record("c1", &["a.txt"]),
            ],
            source: "git".into(),
            normalized_at: 7,
        };
        let a = serde_json::to_string(&to_graph(&stream)).unwrap();
        let b = serde_json::to_string(&to_graph(&stream)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_add_edge_rejects_empty_endpoints() {
        let mut builder = GraphBuilder::new();
        assert!(!builder.add_edge("", Relation::Uses, "r"));
        assert!(!builder.add_edge("p", Relation::Uses, ""));
        assert!(builder.add_edge("p", Relation::Uses, "r"));
        assert!(!builder.add_edge("p", Relation::Uses, "r"));
        assert!(builder.add_edge("p", Relation::CarriesOut, "r"));
        assert_eq!(builder.finish().edges.len(), 2);
    }
}
