use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::EngineArgs;

/// Route way annotation CLI tool
#[derive(Parser)]
#[command(name = "annotator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Extract snapshot (.json)
    #[arg(short, long, env = "ANNOTATOR_EXTRACT", global = true)]
    extract: Option<PathBuf>,

    /// File listing the tag keys to keep, one per line
    #[arg(short, long, env = "ANNOTATOR_TAG_FILE", global = true)]
    tag_file: Option<PathBuf>,

    /// Tag lookups in flight per route
    #[arg(
        short,
        long,
        env = "ANNOTATOR_CONCURRENCY",
        default_value = "16",
        global = true
    )]
    concurrency: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate a route given as node ids
    Nodes {
        /// Comma-separated node ids, e.g. 1,2,3
        route: String,

        /// Emit an index entry for every route position
        #[arg(short, long)]
        positional: bool,

        /// Emit (maxspeed, maxspeed:conditional, tunnel, bridge) per position
        #[arg(long)]
        projected: bool,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Annotate a route given as coordinates
    Coords {
        /// Semicolon-separated lon,lat pairs, e.g. "13.38,52.51;13.39,52.52"
        route: String,

        /// Emit an index entry for every route position
        #[arg(short, long)]
        positional: bool,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Annotate every route of a CSV file
    Batch {
        /// Input CSV file with a header row
        input: PathBuf,

        /// Output file (JSON lines); defaults to <input>_annotated.jsonl
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Column holding the route as ';'-separated node ids
        #[arg(long, default_value = "nodes")]
        column: String,

        /// Emit an index entry for every route position
        #[arg(short, long)]
        positional: bool,

        /// Emit (maxspeed, maxspeed:conditional, tunnel, bridge) per position
        #[arg(long)]
        projected: bool,
    },

    /// Display information about the extract snapshot
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let engine = EngineArgs {
        extract: cli.extract,
        tag_file: cli.tag_file,
        concurrency: cli.concurrency,
    };

    match cli.command {
        Commands::Nodes {
            route,
            positional,
            projected,
            json,
        } => commands::nodes::run(&engine, &route, positional, projected, json).await,
        Commands::Coords {
            route,
            positional,
            json,
        } => commands::coords::run(&engine, &route, positional, json).await,
        Commands::Batch {
            input,
            output,
            column,
            positional,
            projected,
        } => commands::batch::run(&engine, input, output, &column, positional, projected).await,
        Commands::Info => commands::info::run(&engine),
    }
}
