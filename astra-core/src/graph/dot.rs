//! DOT rendering of a provenance graph.

use super::{Graph, NodeKind};

fn shape(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Artifact => "ellipse",
        NodeKind::Step => "box",
        NodeKind::Principal => "house",
        NodeKind::Resource => "cylinder",
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Render `graph` as a Graphviz `digraph`. Nodes are shaped by kind and every
/// edge carries its relation as label.
pub fn to_dot(graph: &Graph) -> String {
    let mut dot = String::from("digraph provenance {\n");
    dot.push_str("  rankdir=LR;\n\n");

    let nodes = graph
        .artifacts
        .iter()
        .map(|a| (a.id.as_str(), a.name.as_str(), NodeKind::Artifact))
        .chain(
            graph
                .steps
                .iter()
                .map(|s| (s.id.as_str(), s.command.as_str(), NodeKind::Step)),
        )
        .chain(
            graph
                .principals
                .iter()
                .map(|p| (p.id.as_str(), p.name.as_str(), NodeKind::Principal)),
        )
        .chain(
            graph
                .resources
                .iter()
                .map(|r| (r.id.as_str(), r.resource_type.as_str(), NodeKind::Resource)),
        );

    for (id, name, kind) in nodes {
        let label = if name.is_empty() || name == id {
            escape(id)
        } else {
            format!("{}\\n{}", escape(name), escape(id))
        };
        dot.push_str(&format!(
            "  \"{}\" [shape={}, label=\"{}\"];\n",
            escape(id),
            shape(kind),
            label
        ));
    }

    dot.push('\n');

    for edge in &graph.edges {
        dot.push_str(&format!(
            "  \"{}\" -> \"{}\" [label=\"{}\"];\n",
            escape(&edge.source),
            escape(&edge.target),
            edge.relation
        ));
    }

    dot.push_str("}\n");
    dot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Artifact, Edge, Principal, Relation, Resource, Step};

    #[test]
    fn test_export_dot() {
        let graph = Graph {
            artifacts: vec![Artifact {
                id: "a.deb".into(),
                name: "a.deb".into(),
                ..Default::default()
            }],
            steps: vec![Step {
                id: "build-a@1".into(),
                command: "dpkg-buildpackage".into(),
                ..Default::default()
            }],
            principals: vec![Principal {
                id: "principal:dev@example.org".into(),
                name: "Dev \"Q\" Eloper".into(),
                ..Default::default()
            }],
            resources: vec![Resource {
                id: "resource:git".into(),
                resource_type: "vcs".into(),
                ..Default::default()
            }],
            edges: vec![Edge {
                source: "build-a@1".into(),
                target: "a.deb".into(),
                relation: Relation::Produces,
            }],
        };

        let dot = to_dot(&graph);
        assert!(dot.starts_with("digraph provenance {"));
        assert!(dot.contains("\"a.deb\" [shape=ellipse, label=\"a.deb\"]"));
        assert!(dot.contains("\"build-a@1\" [shape=box"));
        assert!(dot.contains("[shape=house"));
        assert!(dot.contains("Dev \\\"Q\\\" Eloper"));
        assert!(dot.contains("\"resource:git\" [shape=cylinder, label=\"vcs\\nresource:git\"]"));
        assert!(dot.contains("\"build-a@1\" -> \"a.deb\" [label=\"produces\"]"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn test_empty_graph() {
        let dot = to_dot(&Graph::default());
        assert!(dot.contains("digraph provenance"));
        assert!(!dot.contains("->"));
    }
}
