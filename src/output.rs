use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::engine::{BuildStats, GraphBuild};
use crate::graph::{DepGraph, Dependent};

/// Print the cargo-style build summary to stdout, warnings to stderr so the
/// stdout stream stays clean for piped consumers.
pub fn print_summary(stats: &BuildStats, errors: &[(PathBuf, String)]) {
    println!("Graphed {} files in {:.2}s", stats.files, stats.elapsed_secs);
    println!(
        "  {} internal, {} external, {} stdlib imports",
        stats.internal_imports, stats.external_imports, stats.stdlib_imports,
    );
    println!(
        "  {} edges ({} unresolved internal, {} package fallbacks)",
        stats.edges, stats.unresolved_internal, stats.fallback_hits,
    );
    if stats.parse_failures > 0 {
        eprintln!("  {} files had syntax the grammar rejected", stats.parse_failures);
    }
    print_warnings(errors);
}

/// Warnings alone, for formats where stdout carries machine-readable output.
pub fn print_warnings(errors: &[(PathBuf, String)]) {
    for (path, err) in errors {
        eprintln!("warning: could not read {}: {}", path.display(), err);
    }
}

fn relative<'a>(path: &'a Path, root: &Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// The adjacency listing: one block per file with outgoing edges.
pub fn render_text(graph: &DepGraph, root: &Path) -> String {
    let mut out = String::new();
    for (from, targets) in graph.adjacency() {
        writeln!(out, "{}", relative(&from, root).display()).unwrap();
        for target in targets {
            writeln!(out, "  -> {}", relative(&target, root).display()).unwrap();
        }
    }
    out
}

pub fn render_impact_text(file: &Path, dependents: &[Dependent], root: &Path) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "{} dependents of {}",
        dependents.len(),
        relative(file, root).display()
    )
    .unwrap();
    for dep in dependents {
        writeln!(
            out,
            "  {} {}",
            dep.depth,
            relative(&dep.path, root).display()
        )
        .unwrap();
    }
    out
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct JsonFile {
    path: PathBuf,
    language: String,
    /// True when the build could not resolve one of this file's internal
    /// imports to a member of the set.
    unresolved: bool,
}

#[derive(Serialize)]
struct JsonError {
    path: PathBuf,
    error: String,
}

/// The JSON surface of a finished build: node list, edge pairs, statistics
/// and per-file read errors, all paths relative to the project root.
#[derive(Serialize)]
struct JsonGraph<'a> {
    files: Vec<JsonFile>,
    edges: Vec<(PathBuf, PathBuf)>,
    stats: &'a BuildStats,
    errors: Vec<JsonError>,
}

pub fn render_json(build: &GraphBuild, root: &Path) -> anyhow::Result<String> {
    let model = JsonGraph {
        files: build
            .graph
            .files()
            .map(|f| JsonFile {
                path: relative(&f.path, root).to_path_buf(),
                language: f.language.clone(),
                // Membership is on the absolute path, before relativization.
                unresolved: build.unresolved.contains(&f.path),
            })
            .collect(),
        edges: build
            .graph
            .edges()
            .into_iter()
            .map(|(a, b)| {
                (
                    relative(&a, root).to_path_buf(),
                    relative(&b, root).to_path_buf(),
                )
            })
            .collect(),
        stats: &build.stats,
        errors: build
            .errors
            .iter()
            .map(|(path, error)| JsonError {
                path: relative(path, root).to_path_buf(),
                error: error.clone(),
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&model)?)
}

#[derive(Serialize)]
struct JsonImpact<'a> {
    file: PathBuf,
    dependents: Vec<JsonDependent<'a>>,
}

#[derive(Serialize)]
struct JsonDependent<'a> {
    path: &'a Path,
    depth: usize,
}

pub fn render_impact_json(
    file: &Path,
    dependents: &[Dependent],
    root: &Path,
) -> anyhow::Result<String> {
    let model = JsonImpact {
        file: relative(file, root).to_path_buf(),
        dependents: dependents
            .iter()
            .map(|d| JsonDependent {
                path: relative(&d.path, root),
                depth: d.depth,
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&model)?)
}

// ---------------------------------------------------------------------------
// DOT
// ---------------------------------------------------------------------------

fn language_fillcolor(language: &str) -> &'static str {
    match language {
        "typescript" => "#AED6F1",
        "python" => "#A9DFBF",
        "go" => "#F9E79F",
        "java" => "#F1948A",
        "ruby" => "#D7BDE2",
        "rust" => "#FAD7A0",
        _ => "#EAECEE",
    }
}

/// Render the graph as DOT, one node per file colored by language. Node ids
/// are positional (`n0`, `n1`, ...), so identical graphs render identically.
pub fn render_dot(graph: &DepGraph, root: &Path) -> String {
    let mut out = String::new();
    writeln!(out, "digraph depscope {{").unwrap();
    writeln!(out, "    rankdir=LR;").unwrap();
    writeln!(out, "    node [style=filled fontname=monospace];").unwrap();

    let mut ids: std::collections::HashMap<&Path, usize> = std::collections::HashMap::new();
    for (i, file) in graph.files().enumerate() {
        ids.insert(&file.path, i);
        writeln!(
            out,
            "    n{} [label=\"{}\" fillcolor=\"{}\"];",
            i,
            relative(&file.path, root).display(),
            language_fillcolor(&file.language),
        )
        .unwrap();
    }
    for (from, to) in graph.edges() {
        if let (Some(a), Some(b)) = (ids.get(from.as_path()), ids.get(to.as_path())) {
            writeln!(out, "    n{} -> n{};", a, b).unwrap();
        }
    }

    writeln!(out, "}}").unwrap();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DepGraph {
        let mut g = DepGraph::new();
        let a = g.add_file(PathBuf::from("/p/src/app.ts"), "typescript");
        let b = g.add_file(PathBuf::from("/p/src/api.ts"), "typescript");
        let c = g.add_file(PathBuf::from("/p/cmd/main.go"), "go");
        g.add_edge(a, b);
        g.add_edge(c, b);
        g
    }

    #[test]
    fn text_lists_adjacency_with_relative_paths() {
        let text = render_text(&sample(), Path::new("/p"));
        assert!(text.contains("src/app.ts\n  -> src/api.ts\n"));
        assert!(text.contains("cmd/main.go\n  -> src/api.ts\n"));
        assert!(!text.contains("/p/"), "paths must be relative to the root");
    }

    #[test]
    fn json_flags_files_with_unresolved_imports() {
        let build = GraphBuild {
            graph: sample(),
            errors: Vec::new(),
            stats: BuildStats::default(),
            unresolved: [PathBuf::from("/p/src/app.ts")].into_iter().collect(),
        };
        let json = render_json(&build, Path::new("/p")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        let files = parsed["files"].as_array().unwrap();
        assert_eq!(files.len(), 3);
        for entry in files {
            // Only app.ts carries the failed import.
            let expected = entry["path"] == "src/app.ts";
            assert_eq!(
                entry["unresolved"].as_bool(),
                Some(expected),
                "wrong flag on {}",
                entry["path"]
            );
        }
    }

    #[test]
    fn dot_has_header_nodes_and_edges() {
        let dot = render_dot(&sample(), Path::new("/p"));
        assert!(dot.starts_with("digraph depscope {"));
        assert!(dot.contains("rankdir=LR;"));
        assert!(dot.contains("[label=\"src/app.ts\" fillcolor=\"#AED6F1\"];"));
        assert!(dot.contains("[label=\"cmd/main.go\" fillcolor=\"#F9E79F\"];"));
        assert_eq!(dot.matches("->").count(), 2);
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn impact_text_prefixes_depth() {
        let dependents = vec![
            Dependent {
                path: PathBuf::from("/p/b.ts"),
                depth: 1,
            },
            Dependent {
                path: PathBuf::from("/p/c.ts"),
                depth: 2,
            },
        ];
        let text = render_impact_text(Path::new("/p/a.ts"), &dependents, Path::new("/p"));
        assert!(text.starts_with("2 dependents of a.ts"));
        assert!(text.contains("  1 b.ts"));
        assert!(text.contains("  2 c.ts"));
    }
}
