//! Property-based tests for the record → graph mapper.

use proptest::prelude::*;

use astra_core::record::{Item, Record, RecordStream};
use astra_core::{Graph, to_graph};

// Small ID alphabets so that collisions across records are common.
fn item(prefix: &'static str) -> impl Strategy<Value = Item> {
    ("[a-d]{0,1}", "[a-z]{0,6}").prop_map(move |(id, label)| {
        let id = if id.is_empty() { id } else { format!("{prefix}{id}") };
        Item::new(id, label, "thing")
    })
}

fn record() -> impl Strategy<Value = Record> {
    (
        item("step-"),
        item("principal-"),
        prop::collection::vec(item("artifact-"), 0..4),
        prop::collection::vec(item("artifact-"), 0..4),
        prop::collection::vec(item("resource-"), 0..3),
    )
        .prop_map(|(step, principal, artifacts_in, artifacts_out, resources)| Record {
            step,
            principal,
            artifacts_in,
            artifacts_out,
            resources,
        })
}

fn stream(records: Vec<Record>) -> RecordStream {
    RecordStream {
        records,
        source: "test".into(),
        normalized_at: 0,
    }
}

fn node_ids(graph: &Graph) -> Vec<Vec<String>> {
    vec![
        graph.artifacts.iter().map(|n| n.id.clone()).collect(),
        graph.steps.iter().map(|n| n.id.clone()).collect(),
        graph.principals.iter().map(|n| n.id.clone()).collect(),
        graph.resources.iter().map(|n| n.id.clone()).collect(),
    ]
}

proptest! {
    #[test]
    fn mapping_is_deterministic(records in prop::collection::vec(record(), 0..8)) {
        let input = stream(records);
        prop_assert_eq!(to_graph(&input), to_graph(&input));
    }

    #[test]
    fn record_order_does_not_change_ids_or_edges(records in prop::collection::vec(record(), 0..8)) {
        let forward = to_graph(&stream(records.clone()));
        let mut reversed = records;
        reversed.reverse();
        let backward = to_graph(&stream(reversed));

        prop_assert_eq!(node_ids(&forward), node_ids(&backward));
        prop_assert_eq!(forward.edges, backward.edges);
    }

    #[test]
    fn edges_are_unique_sorted_and_non_empty(records in prop::collection::vec(record(), 0..8)) {
        let graph = to_graph(&stream(records));
        for pair in graph.edges.windows(2) {
            prop_assert!(pair[0].sort_key() < pair[1].sort_key());
        }
        for edge in &graph.edges {
            prop_assert!(!edge.source.is_empty());
            prop_assert!(!edge.target.is_empty());
        }
    }

    #[test]
    fn node_tables_are_sorted_without_duplicates(records in prop::collection::vec(record(), 0..8)) {
        let graph = to_graph(&stream(records));
        for ids in node_ids(&graph) {
            for pair in ids.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
            prop_assert!(ids.iter().all(|id| !id.is_empty()));
        }
    }
}
