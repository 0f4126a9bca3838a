mod cli;
mod config;
mod engine;
mod fileset;
mod graph;
mod index;
mod lang;
mod output;
mod parse;
mod resolver;
mod walker;

use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail, ensure};
use clap::Parser;

use cli::{BuildArgs, Cli, Commands, OutputFormat};
use config::DepscopeConfig;
use engine::{BuildOptions, GraphBuild};
use fileset::{FileSet, FsReader, normalize};
use walker::walk_project;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            args,
            format,
            output,
        } => build_command(&args, &format, output.as_deref()),
        Commands::Impact {
            file,
            args,
            depth,
            format,
        } => impact_command(&file, &args, depth, &format),
    }
}

fn build_command(args: &BuildArgs, format: &OutputFormat, output: Option<&Path>) -> Result<()> {
    let (root, build) = run_build(args)?;

    let rendered = match format {
        OutputFormat::Text => output::render_text(&build.graph, &root),
        OutputFormat::Json => output::render_json(&build, &root)?,
        OutputFormat::Dot => output::render_dot(&build.graph, &root),
    };

    match output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            output::print_summary(&build.stats, &build.errors);
            println!("Wrote graph to {}", path.display());
        }
        None => match format {
            OutputFormat::Text => {
                output::print_summary(&build.stats, &build.errors);
                println!();
                print!("{rendered}");
            }
            // stdout carries the graph itself; keep it machine-clean.
            OutputFormat::Json | OutputFormat::Dot => {
                output::print_warnings(&build.errors);
                print!("{rendered}");
            }
        },
    }

    Ok(())
}

fn impact_command(
    file: &Path,
    args: &BuildArgs,
    depth: Option<usize>,
    format: &OutputFormat,
) -> Result<()> {
    let (root, build) = run_build(args)?;

    let target = absolute_in(file, &root);
    ensure!(
        build.graph.node_of(&target).is_some(),
        "{} is not part of the analyzed file set",
        file.display()
    );

    let dependents = build.graph.dependents_of(&target, depth);
    let rendered = match format {
        OutputFormat::Text => output::render_impact_text(&target, &dependents, &root),
        OutputFormat::Json => output::render_impact_json(&target, &dependents, &root)?,
        OutputFormat::Dot => bail!("impact supports the text and json formats"),
    };
    print!("{rendered}");

    Ok(())
}

/// The shared front half of every command: load config, collect the file
/// set, run the two-pass build, stamp the elapsed time into the stats.
fn run_build(args: &BuildArgs) -> Result<(PathBuf, GraphBuild)> {
    let root = args
        .path
        .canonicalize()
        .with_context(|| format!("cannot access project root {}", args.path.display()))?;

    let config = DepscopeConfig::load(&root);
    let mut options = BuildOptions::default();
    config.apply(&mut options);
    if args.skip_tests {
        options.skip_tests = true;
    }
    if args.no_package_fallback {
        options.package_fallback = false;
    }

    let files = match &args.files_from {
        Some(list) => read_file_list(list, &root)?,
        None => walk_project(&root, &config, args.verbose),
    };
    if args.verbose {
        eprintln!("[walk] {} file(s) in the set", files.len());
    }

    let started = Instant::now();
    let mut build = engine::build_graph(&files, &FsReader, &options);
    build.stats.elapsed_secs = started.elapsed().as_secs_f64();
    if args.verbose {
        eprintln!(
            "[build] {} node(s), {} edge(s), {} scope(s), {} unresolved internal import(s)",
            build.stats.files,
            build.stats.edges,
            build.stats.scopes,
            build.stats.unresolved_internal,
        );
    }

    Ok((root, build))
}

/// Newline-separated file list, `-` for stdin. Blank lines and `#` comments
/// are skipped; relative entries are joined to the project root.
fn read_file_list(list: &Path, root: &Path) -> Result<FileSet> {
    let contents = if list.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read file list from stdin")?;
        buf
    } else {
        std::fs::read_to_string(list)
            .with_context(|| format!("failed to read file list {}", list.display()))?
    };

    let mut files = FileSet::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        files.insert(absolute_in(Path::new(line), root));
    }
    Ok(files)
}

fn absolute_in(path: &Path, root: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&root.join(path))
    }
}
