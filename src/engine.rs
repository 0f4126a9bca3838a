//! Two-phase graph construction.
//!
//! Phase 1 extracts every file in parallel and merges the results into
//! immutable indexes: extractions by path, the export index, the scope
//! table and discovered manifests. Phase 2 classifies and resolves each
//! file's imports in parallel against those frozen indexes, producing
//! per-file edge lists merged into the graph at a single point. The split
//! is what makes phase 2 embarrassingly parallel: resolution reads
//! everything and writes nothing shared.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use rayon::prelude::*;

use crate::fileset::{ContentReader, FileSet};
use crate::graph::DepGraph;
use crate::index::{build_scope_table, ExportIndex, ScopeTable};
use crate::lang::{adapter_for, Extraction, ImportKind, LANGUAGES};
use crate::resolver::manifest::ManifestIndex;

/// Policy knobs for a build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// When symbol narrowing finds no declaring file for a scope import,
    /// link the whole scope instead of nothing. Recall over precision.
    pub package_fallback: bool,
    /// Drop files the adapters' path heuristics classify as tests before
    /// anything is indexed.
    pub skip_tests: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            package_fallback: true,
            skip_tests: false,
        }
    }
}

/// Everything resolution may consult. Built once in phase 1, then shared
/// immutably across phase 2 workers.
pub struct ResolveCtx<'a> {
    pub files: &'a FileSet,
    pub extractions: &'a HashMap<PathBuf, Extraction>,
    pub index: &'a ExportIndex,
    pub scopes: &'a ScopeTable,
    pub manifests: &'a ManifestIndex,
    pub options: &'a BuildOptions,
}

/// Aggregate counters for one build.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct BuildStats {
    /// Files in the working set (after test exclusion).
    pub files: usize,
    /// Distinct namespace scopes in the export index.
    pub scopes: usize,
    /// Files whose content could not be read.
    pub read_failures: usize,
    /// Files the grammar rejected outright.
    pub parse_failures: usize,
    pub internal_imports: usize,
    pub external_imports: usize,
    pub stdlib_imports: usize,
    /// Internal imports that mapped to no supplied file.
    pub unresolved_internal: usize,
    /// Scope imports resolved via the full-package fallback.
    pub fallback_hits: usize,
    /// Distinct edges in the finished graph.
    pub edges: usize,
    /// Wall-clock build time, filled in by the caller.
    pub elapsed_secs: f64,
}

/// The finished product of a build.
pub struct GraphBuild {
    pub graph: DepGraph,
    /// Per-file read errors, in set order. Never fatal: the rest of the
    /// set is still analyzed.
    pub errors: Vec<(PathBuf, String)>,
    pub stats: BuildStats,
    /// Files with at least one internal import that resolved to no member.
    pub unresolved: BTreeSet<PathBuf>,
}

// ---------------------------------------------------------------------------
// Phase 1: extraction and index building
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Indexes {
    extractions: HashMap<PathBuf, Extraction>,
    index: ExportIndex,
    scopes: ScopeTable,
    manifests: ManifestIndex,
    errors: Vec<(PathBuf, String)>,
    parse_failures: usize,
}

fn build_indexes(files: &FileSet, reader: &dyn ContentReader) -> Indexes {
    let paths: Vec<&PathBuf> = files.iter().collect();

    // Parallel extraction; rayon's collect keeps the sorted input order, so
    // the sequential merge below is deterministic.
    let extracted: Vec<(&PathBuf, Result<Extraction, String>)> = paths
        .par_iter()
        .filter_map(|path| {
            let adapter = adapter_for(path)?;
            let outcome = match reader.read(path) {
                Ok(bytes) => Ok(adapter.extract(path, &bytes)),
                Err(err) => Err(err.to_string()),
            };
            Some((*path, outcome))
        })
        .collect();

    let mut out = Indexes::default();
    let mut scopes_by_file: HashMap<PathBuf, String> = HashMap::new();
    for (path, outcome) in extracted {
        match outcome {
            Err(err) => out.errors.push((path.clone(), err)),
            Ok(extraction) => {
                if extraction.parse_failed {
                    out.parse_failures += 1;
                }
                if let Some(adapter) = adapter_for(path)
                    && let Some(scope) = adapter.scope_key(path, &extraction)
                {
                    out.index.insert(&scope, path, &extraction.declared);
                    scopes_by_file.insert(path.clone(), scope);
                }
                out.extractions.insert(path.clone(), extraction);
            }
        }
    }

    out.scopes = build_scope_table(files, &scopes_by_file);
    out.manifests = ManifestIndex::build(files, reader);
    out
}

// ---------------------------------------------------------------------------
// Phase 2: classification, resolution, assembly
// ---------------------------------------------------------------------------

/// One worker's private result; merged single-threaded afterwards.
#[derive(Default)]
struct FileOutcome {
    importer: PathBuf,
    edges: Vec<PathBuf>,
    internal: usize,
    external: usize,
    stdlib: usize,
    unresolved: usize,
    fallback_hits: usize,
}

/// Build the dependency graph over `files`.
///
/// The set is the resolution boundary: every edge target is a member, and
/// nothing outside it is ever consulted except through `reader`.
pub fn build_graph(files: &FileSet, reader: &dyn ContentReader, options: &BuildOptions) -> GraphBuild {
    let working: FileSet = if options.skip_tests {
        files
            .iter()
            .filter(|p| adapter_for(p).is_none_or(|a| !a.is_test_file(p)))
            .cloned()
            .collect()
    } else {
        files.clone()
    };

    let indexes = build_indexes(&working, reader);
    let ctx = ResolveCtx {
        files: &working,
        extractions: &indexes.extractions,
        index: &indexes.index,
        scopes: &indexes.scopes,
        manifests: &indexes.manifests,
        options,
    };

    let paths: Vec<&PathBuf> = working.iter().collect();
    let outcomes: Vec<FileOutcome> = paths
        .par_iter()
        .filter_map(|path| {
            let adapter = adapter_for(path)?;
            let extraction = ctx.extractions.get(*path)?;
            let mut outcome = FileOutcome {
                importer: (*path).clone(),
                ..FileOutcome::default()
            };
            for import in &extraction.imports {
                match adapter.classify(path, import, &ctx) {
                    ImportKind::External => outcome.external += 1,
                    ImportKind::Stdlib => outcome.stdlib += 1,
                    ImportKind::Internal => {
                        outcome.internal += 1;
                        let resolution = adapter.resolve(path, import, &ctx);
                        if resolution.used_fallback {
                            outcome.fallback_hits += 1;
                        }
                        if resolution.targets.is_empty() {
                            outcome.unresolved += 1;
                        }
                        outcome.edges.extend(resolution.targets);
                    }
                }
            }
            outcome.edges.extend(adapter.same_scope_links(path, &ctx));
            Some(outcome)
        })
        .collect();

    // Single merge point. Nodes cover the whole set so that edge targets
    // without an adapter (embedded assets) exist too.
    let mut graph = DepGraph::new();
    for path in &working {
        let language = adapter_for(path).map(|a| a.name()).unwrap_or("other");
        graph.add_file(path.clone(), language);
    }

    let mut stats = BuildStats {
        files: working.len(),
        scopes: indexes.index.scope_count(),
        read_failures: indexes.errors.len(),
        parse_failures: indexes.parse_failures,
        ..BuildStats::default()
    };
    let mut unresolved = BTreeSet::new();
    for outcome in outcomes {
        stats.internal_imports += outcome.internal;
        stats.external_imports += outcome.external;
        stats.stdlib_imports += outcome.stdlib;
        stats.unresolved_internal += outcome.unresolved;
        stats.fallback_hits += outcome.fallback_hits;
        if outcome.unresolved > 0 {
            unresolved.insert(outcome.importer.clone());
        }
        for target in &outcome.edges {
            graph.link(&outcome.importer, target);
        }
    }

    for lang in LANGUAGES {
        lang.finalize(&ctx, &mut graph);
    }
    stats.edges = graph.edge_count();

    GraphBuild {
        graph,
        errors: indexes.errors,
        stats,
        unresolved,
    }
}

// ---------------------------------------------------------------------------
// Test fixture
// ---------------------------------------------------------------------------

/// In-memory project builder for adapter and engine tests. Files added
/// through it run the real phase-1 pipeline, so `ctx()` hands out exactly
/// what production resolution sees.
#[cfg(test)]
pub(crate) struct CtxFixture {
    pub files: FileSet,
    pub options: BuildOptions,
    reader: crate::fileset::MemReader,
    indexes: Indexes,
}

#[cfg(test)]
impl CtxFixture {
    pub fn new() -> Self {
        Self {
            files: FileSet::default(),
            options: BuildOptions::default(),
            reader: crate::fileset::MemReader::default(),
            indexes: Indexes::default(),
        }
    }

    /// A source file: set member with readable content.
    pub fn add_file(&mut self, path: &str, source: &str) {
        self.reader.insert(path, source.as_bytes().to_vec());
        self.files.insert(path);
        self.rebuild();
    }

    /// A manifest: readable but not a set member, like go.mod on disk.
    pub fn add_manifest(&mut self, path: &str, contents: &str) {
        self.reader.insert(path, contents.as_bytes().to_vec());
        self.rebuild();
    }

    /// A set member with no adapter and no content (embedded asset).
    pub fn add_raw_file(&mut self, path: &str) {
        self.files.insert(path);
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.indexes = build_indexes(&self.files, &self.reader);
    }

    pub fn ctx(&self) -> ResolveCtx<'_> {
        ResolveCtx {
            files: &self.files,
            extractions: &self.indexes.extractions,
            index: &self.indexes.index,
            scopes: &self.indexes.scopes,
            manifests: &self.indexes.manifests,
            options: &self.options,
        }
    }

    pub fn reader(&self) -> &crate::fileset::MemReader {
        &self.reader
    }
}
