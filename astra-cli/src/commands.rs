//! Subcommand handlers.

use crate::Commands;
use anyhow::{Context, Result, anyhow, bail};
use astra_core::store;
use astra_core::{
    AstraConfig, Format, Graph, GraphFilter, GraphIndex, NodeKind, RecordStream, to_dot, to_graph,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

pub(crate) fn handle_command(command: Commands, config: &AstraConfig) -> Result<()> {
    match command {
        Commands::Parse {
            input,
            output,
            format,
        } => {
            let stream = parse(&input, format, config)?;
            write_json(&output, &stream, config.output.pretty)?;
            println!("[OK] Parsed -> {}", output.display());
        }
        Commands::Map { input, output } => {
            let stream: RecordStream = read_json(&input)?;
            let graph = map(&stream);
            write_json(&output, &graph, config.output.pretty)?;
            println!("[OK] Mapped -> {}", output.display());
        }
        Commands::Build {
            input,
            format,
            output,
        } => {
            let graph = astra_core::build_graph(format, &input, config)
                .with_context(|| format!("failed to build a graph from '{input}'"))?;
            report(&graph);
            write_json(&output, &graph, config.output.pretty)?;
            println!("[OK] Built -> {}", output.display());
        }
        Commands::Viz {
            input,
            output,
            kind,
            phase,
        } => {
            let graph: Graph = read_json(&input)?;
            let filter = GraphFilter {
                kind: kind.as_deref().map(parse_kind).transpose()?,
                phase,
            };
            let graph = if filter == GraphFilter::default() {
                graph
            } else {
                graph.filtered(&filter)
            };
            write_text(&output, &to_dot(&graph))?;
            println!("[OK] DOT graph written to {}", output.display());
        }
        Commands::Lineage {
            input,
            node,
            dependents,
        } => {
            let graph: Graph = read_json(&input)?;
            for line in lineage(&graph, &node, dependents)? {
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn parse(input: &str, format: Format, config: &AstraConfig) -> Result<RecordStream> {
    astra_core::extract(format, input, config)
        .with_context(|| format!("failed to extract {format} input '{input}'"))
}

fn map(stream: &RecordStream) -> Graph {
    let graph = to_graph(stream);
    report(&graph);
    graph
}

/// Log graph size and any edges whose endpoints have no node.
fn report(graph: &Graph) {
    let dangling = graph.dangling_edges();
    if !dangling.is_empty() {
        tracing::warn!(count = dangling.len(), "edges reference IDs with no node");
        for edge in &dangling {
            tracing::debug!(
                source = %edge.source,
                relation = %edge.relation,
                target = %edge.target,
                "dangling edge"
            );
        }
    }
    let stats = graph.stats();
    tracing::info!(
        artifacts = stats.artifacts,
        steps = stats.steps,
        principals = stats.principals,
        resources = stats.resources,
        edges = stats.edges,
        "graph mapped"
    );
}

fn parse_kind(s: &str) -> Result<NodeKind> {
    NodeKind::from_str_loose(s).ok_or_else(|| anyhow!("unknown node kind '{s}'"))
}

/// `<kind>\t<id>` lines for every node upstream (or downstream) of `node`.
fn lineage(graph: &Graph, node: &str, dependents: bool) -> Result<Vec<String>> {
    let index = GraphIndex::build(graph);
    if !index.contains(node) {
        bail!("node '{node}' is not in the graph");
    }
    let ids = if dependents {
        index.dependents(node)
    } else {
        index.lineage(node)
    };
    Ok(ids
        .into_iter()
        .map(|id| {
            let kind = graph.node_kind(&id).map_or("?", |k| k.as_str());
            format!("{kind}\t{id}")
        })
        .collect())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    store::read_json(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    store::write_json(path, value, pretty)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    store::write_text(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
