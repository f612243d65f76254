//! AStRA core — software supply-chain provenance graphs.
//!
//! Raw build evidence is turned into a typed provenance graph in two stages:
//!
//! - **Extraction:** a format-specific [`Extractor`] (git history, Debian
//!   buildinfo, in-toto, SLSA) reads one input and emits a [`RecordStream`]
//! - **Mapping:** [`to_graph`] normalizes the records into artifacts, steps,
//!   principals and resources joined by `consumes`, `produces`, `uses` and
//!   `carries_out` edges
//!
//! The resulting [`Graph`] serializes to JSON, renders to Graphviz DOT, and can
//! be indexed for lineage queries.

pub mod config;
pub mod error;
pub mod extract;
pub mod graph;
pub mod mapper;
pub mod record;
pub mod store;

pub use config::{AstraConfig, load_config};
pub use error::{AstraError, ExtractError, FormatError, SignatureError};
pub use extract::{Extractor, Format, extract, extractor_for};
pub use graph::dot::to_dot;
pub use graph::index::GraphIndex;
pub use graph::{Edge, Graph, GraphFilter, NodeKind, Relation};
pub use mapper::{GraphBuilder, to_graph};
pub use record::{Item, Record, RecordStream};

/// Extract `input` as `format` and map the records into a graph.
pub fn build_graph(format: Format, input: &str, config: &AstraConfig) -> Result<Graph, AstraError> {
    let stream = extract(format, input, config)?;
    Ok(to_graph(&stream))
}
