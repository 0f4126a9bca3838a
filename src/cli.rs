use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Map the import graph of a polyglot codebase.
///
/// depscope walks a project (or takes an explicit file list), resolves every
/// import against that set, and emits a file-level dependency graph for
/// queries, visualization and change-impact analysis.
#[derive(Parser, Debug)]
#[command(
    name = "depscope",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for graph results.
#[derive(Clone, Debug, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable summary plus adjacency listing (default).
    #[default]
    Text,
    /// Structured JSON object suitable for programmatic consumption.
    Json,
    /// Graphviz DOT digraph, one node per file colored by language.
    Dot,
}

/// Flags shared by every graph-building command.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Path to the project root.
    pub path: PathBuf,

    /// Read the file set from a newline-separated list instead of walking
    /// the project (`-` reads from stdin). Paths are taken relative to the
    /// project root. Useful for commit-scoped graphs.
    #[arg(long, value_name = "FILE")]
    pub files_from: Option<PathBuf>,

    /// Print each discovered file and per-pass diagnostics to stderr.
    #[arg(short, long)]
    pub verbose: bool,

    /// Exclude test files (per-language path heuristics).
    #[arg(long)]
    pub skip_tests: bool,

    /// Never link a whole package when symbol narrowing finds no declaring
    /// file. Trades recall for precision on scope imports.
    #[arg(long)]
    pub no_package_fallback: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the dependency graph and print it.
    Build {
        #[command(flatten)]
        args: BuildArgs,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Write the graph to a file instead of stdout. The summary still
        /// goes to stdout.
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// List the files that transitively depend on one file.
    ///
    /// Performs reverse BFS on the dependency graph, reporting dependents
    /// sorted by depth (1 = direct importer) then path.
    Impact {
        /// File whose dependents to trace, relative to the project root.
        file: PathBuf,

        #[command(flatten)]
        args: BuildArgs,

        /// Maximum dependency depth to walk (default: unbounded).
        #[arg(long, value_name = "N")]
        depth: Option<usize>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}
