//! AStRA CLI — turn raw build evidence into a provenance graph.
//!
//! `parse` runs one extractor, `map` turns records into a graph, `build` does
//! both, `viz` renders DOT and `lineage` answers upstream/downstream queries.

mod commands;

use astra_core::{AstraError, Format};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// AStRA: software supply-chain provenance graphs
#[derive(Parser, Debug)]
#[command(name = "astra", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (reads `.astra/config.toml`)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Also write JSON logs, rotated daily, into this directory
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only report errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Extract a record stream from a raw input
    Parse {
        /// Repository URL or input file
        #[arg(short, long)]
        input: String,
        /// Output record stream (JSON)
        #[arg(short, long)]
        output: PathBuf,
        /// Input format: git, in-toto, slsa, buildinfo
        #[arg(short, long, default_value = "git")]
        format: Format,
    },
    /// Map a record stream into a provenance graph
    Map {
        /// Record stream produced by `parse`
        #[arg(short, long)]
        input: PathBuf,
        /// Output graph (JSON)
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Parse and map in one run
    Build {
        #[arg(short, long)]
        input: String,
        #[arg(short, long, default_value = "git")]
        format: Format,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Render a graph as Graphviz DOT
    Viz {
        /// Graph produced by `map` or `build`
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long, default_value = "graph.dot")]
        output: PathBuf,
        /// Keep only nodes of this kind (artifact, step, principal, resource)
        #[arg(long)]
        kind: Option<String>,
        /// Keep only steps in this phase and the nodes around them
        #[arg(long)]
        phase: Option<String>,
    },
    /// Print everything a node derives from
    Lineage {
        #[arg(short, long)]
        input: PathBuf,
        /// Node ID to start from
        node: String,
        /// Walk downstream instead
        #[arg(long)]
        dependents: bool,
    },
}

fn init_tracing(verbose: u8, quiet: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let (json_layer, guard) = match log_dir {
        Some(dir) => {
            let _ = std::fs::create_dir_all(dir);
            let file_appender = tracing_appender::rolling::daily(dir, "astra.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new("debug"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();
    guard
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose, cli.quiet, cli.log_file.as_deref());

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| cli.workspace.clone());
    let config = astra_core::load_config(Some(&workspace), None).map_err(AstraError::from)?;

    commands::handle_command(cli.command, &config)
}
