//! ComptoxAI CLI
//!
//! - `build`: run the configured importers into a graph snapshot
//! - `stats`, `find`, `path`, `pagerank`: inspect a snapshot
//! - `subgraph`, `sample`: cut smaller snapshots out of a large one
//! - `export`: TSV feature tables for ML tooling
//! - `schema`: validate an ontology (and a snapshot against it)

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use comptox_graphdb::algo::ForestFireConfig;
use std::path::PathBuf;

mod build;
mod logging;
mod query;

#[derive(Parser)]
#[command(name = "comptox")]
#[command(author, version, about = "ComptoxAI: build and query the computational toxicology knowledge graph")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured importer and write the snapshot and build report.
    ///
    /// Ctrl-C stops the running importer at the next row; the partial
    /// snapshot and report are still written and `--resume` picks up there.
    Build {
        /// Pipeline config (JSON)
        #[arg(short, long)]
        config: PathBuf,
        /// Snapshot path (overrides the config)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Build report path (overrides the config)
        #[arg(long)]
        report: Option<PathBuf>,
        /// Continue from the snapshot and report of an interrupted run
        #[arg(long)]
        resume: bool,
    },

    /// Node and edge counts by label and relationship type.
    Stats {
        snapshot: PathBuf,
        #[arg(long)]
        json: bool,
    },

    /// Nodes whose property equals a value.
    Find {
        snapshot: PathBuf,
        #[arg(short, long)]
        property: String,
        value: String,
        #[arg(short, long)]
        label: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Shortest undirected path between two nodes, by local key.
    Path {
        snapshot: PathBuf,
        from: String,
        to: String,
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Top nodes by PageRank (or degree).
    Pagerank {
        snapshot: PathBuf,
        #[arg(short, long)]
        label: Option<String>,
        #[arg(short = 'n', long, default_value_t = 20)]
        top: usize,
        #[arg(long)]
        damping: Option<f64>,
        #[arg(long)]
        max_iterations: Option<usize>,
        /// Rank by total degree instead
        #[arg(long)]
        degree: bool,
    },

    /// Snapshot of everything within `--hops` of the seed nodes.
    Subgraph {
        snapshot: PathBuf,
        /// Seed local keys
        #[arg(short, long = "seed", required = true)]
        seeds: Vec<String>,
        #[arg(long, default_value_t = 1)]
        hops: usize,
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Forest-fire sample of a snapshot.
    Sample {
        snapshot: PathBuf,
        #[arg(long, default_value_t = 0.17)]
        fraction: f64,
        #[arg(long, default_value_t = 0.35)]
        forward: f64,
        #[arg(long, default_value_t = 0.20)]
        backward: f64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(short, long)]
        out: PathBuf,
    },

    /// TSV feature tables.
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },

    /// Validate an ontology file (the built-in one by default).
    Schema {
        #[arg(long)]
        ontology: Option<PathBuf>,
        /// Also check that a snapshot only uses declared labels and relationships
        #[arg(long)]
        graph: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ExportCommands {
    /// id, key, labels and the requested properties per node
    Nodes {
        snapshot: PathBuf,
        #[arg(short, long)]
        label: Option<String>,
        /// Property columns (repeatable)
        #[arg(short, long = "property")]
        properties: Vec<String>,
        #[arg(short, long)]
        out: PathBuf,
    },
    /// source key, relationship type, target key per edge
    Edges {
        snapshot: PathBuf,
        #[arg(short, long = "type")]
        rel_type: Option<String>,
        #[arg(short, long)]
        out: PathBuf,
    },
    /// 0/1 matrix of one relationship between two labels
    Incidence {
        snapshot: PathBuf,
        #[arg(long)]
        rows: String,
        #[arg(long = "type")]
        rel_type: String,
        #[arg(long)]
        columns: String,
        #[arg(short, long)]
        out: PathBuf,
    },
}

fn cmd_export(command: ExportCommands) -> Result<()> {
    let (out, written) = match command {
        ExportCommands::Nodes {
            snapshot,
            label,
            properties,
            out,
        } => {
            let db = query::open(&snapshot)?;
            let n = comptox_ingest::export::export_node_table(&db, label.as_deref(), &properties, &out)?;
            (out, format!("{n} nodes"))
        }
        ExportCommands::Edges {
            snapshot,
            rel_type,
            out,
        } => {
            let db = query::open(&snapshot)?;
            let n = comptox_ingest::export::export_edge_list(&db, rel_type.as_deref(), &out)?;
            (out, format!("{n} edges"))
        }
        ExportCommands::Incidence {
            snapshot,
            rows,
            rel_type,
            columns,
            out,
        } => {
            let db = query::open(&snapshot)?;
            let b = comptox_ingest::export::export_incidence(&db, &rows, &rel_type, &columns, &out)?;
            (out, format!("{}x{}, {} ones", b.rows.len(), b.columns.len(), b.edges.len()))
        }
    };
    eprintln!(
        "{} {} ({written})",
        "wrote".green().bold(),
        out.display().to_string().bold()
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    match cli.command {
        Commands::Build {
            config,
            out,
            report,
            resume,
        } => build::cmd_build(&build::BuildArgs {
            config,
            out,
            report,
            resume,
        }),
        Commands::Stats { snapshot, json } => query::cmd_stats(&snapshot, json),
        Commands::Find {
            snapshot,
            property,
            value,
            label,
            json,
        } => query::cmd_find(&snapshot, &property, &value, label.as_deref(), json),
        Commands::Path {
            snapshot,
            from,
            to,
            max_depth,
        } => query::cmd_path(&snapshot, &from, &to, max_depth),
        Commands::Pagerank {
            snapshot,
            label,
            top,
            damping,
            max_iterations,
            degree,
        } => query::cmd_pagerank(
            &snapshot,
            &query::RankArgs {
                label,
                top,
                damping,
                max_iterations,
                degree,
            },
        ),
        Commands::Subgraph {
            snapshot,
            seeds,
            hops,
            out,
        } => query::cmd_subgraph(&snapshot, &seeds, hops, &out),
        Commands::Sample {
            snapshot,
            fraction,
            forward,
            backward,
            seed,
            out,
        } => query::cmd_sample(
            &snapshot,
            &ForestFireConfig {
                sample_fraction: fraction,
                forward_probability: forward,
                backward_probability: backward,
                seed,
            },
            &out,
        ),
        Commands::Export { command } => cmd_export(command),
        Commands::Schema { ontology, graph } => query::cmd_schema(ontology.as_ref(), graph.as_ref()),
    }
}
