//! Traversal index over a provenance graph.
//!
//! Edges point from cause to effect (`step → produces → artifact`,
//! `resource → carries_out → step`), except `consumes`, which points from the
//! step to its input. The index re-orients `consumes` so that every petgraph
//! edge flows upstream → downstream.

use super::{Graph, Relation};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap, HashSet};

pub struct GraphIndex {
    graph: DiGraph<String, Relation>,
    ids: HashMap<String, NodeIndex>,
}

impl GraphIndex {
    pub fn build(source: &Graph) -> Self {
        let mut index = Self {
            graph: DiGraph::new(),
            ids: HashMap::new(),
        };

        for id in source.node_ids() {
            index.node(id);
        }
        for edge in &source.edges {
            let (from, to) = match edge.relation {
                Relation::Consumes => (&edge.target, &edge.source),
                _ => (&edge.source, &edge.target),
            };
            let from = index.node(from);
            let to = index.node(to);
            index.graph.add_edge(from, to, edge.relation);
        }
        index
    }

    fn node(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.ids.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.ids.insert(id.to_string(), idx);
        idx
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    /// Everything `id` transitively derives from, sorted.
    pub fn lineage(&self, id: &str) -> Vec<String> {
        self.walk(id, Direction::Incoming)
    }

    /// Everything transitively derived from `id`, sorted.
    pub fn dependents(&self, id: &str) -> Vec<String> {
        self.walk(id, Direction::Outgoing)
    }

    fn walk(&self, id: &str, direction: Direction) -> Vec<String> {
        let Some(&start) = self.ids.get(id) else {
            return Vec::new();
        };

        let mut visited = HashSet::new();
        let mut stack = vec![start];
        let mut result = BTreeSet::new();

        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            if node != start {
                result.insert(self.graph[node].clone());
            }
            stack.extend(self.graph.neighbors_directed(node, direction));
        }

        result.into_iter().collect()
    }
}
