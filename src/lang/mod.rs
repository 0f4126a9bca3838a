pub mod go;
pub mod java;
pub mod python;
pub mod ruby;
pub mod rust;
pub mod typescript;

use std::path::{Path, PathBuf};

use tree_sitter::Node;

use crate::engine::ResolveCtx;
use crate::graph::DepGraph;

// ---------------------------------------------------------------------------
// Import data model
// ---------------------------------------------------------------------------

/// Where an import's target lives, relative to the supplied file set.
///
/// Only `Internal` imports are handed to resolution; `External` and `Stdlib`
/// are counted and dropped. Classification is pure: it consults the project
/// indexes but never the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportKind {
    /// Part of the analyzed project; a candidate for a graph edge.
    Internal,
    /// Third-party package (npm, PyPI, crates.io, Maven, gems, Go modules).
    External,
    /// The language's standard library or runtime builtins.
    Stdlib,
}

/// How a dependency is expressed in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportStyle {
    /// An ordinary import/require/use statement naming a target.
    #[default]
    Plain,
    /// A Rust `mod name;` declaration pulling a child module file in.
    ModDecl,
    /// A Go `//go:embed` directive; the raw text is a glob pattern.
    Embed,
    /// A qualified reference in code (e.g. a Ruby `A::B::C` constant) with no
    /// import statement behind it.
    QualifiedRef,
    /// A re-export that forwards another module's surface (`export ... from`).
    ReExport,
}

/// One dependency reference as extracted from source, before classification.
///
/// `raw` is the specifier exactly as written (`"./util"`, `"fmt"`,
/// `"com.acme.util.Strings"`, `"crate::graph"`). The flags record syntactic
/// modifiers the classifier and resolver care about; a flag irrelevant to the
/// language stays at its default.
#[derive(Debug, Clone, Default)]
pub struct RawImport {
    pub raw: String,
    pub style: ImportStyle,
    /// Names imported alongside the specifier, where the syntax carries them
    /// (`from x import a, b` → `["a", "b"]`). Empty for bare imports.
    pub symbols: Vec<String>,
    /// `import *`, `import . "pkg"`, `import a.b.*`: the whole surface.
    pub is_wildcard: bool,
    /// Specifier is written relative to the importing file.
    pub is_relative: bool,
    /// Erased at build time (`import type` in TypeScript). Still an edge:
    /// type-only dependencies break builds too.
    pub is_type_only: bool,
    /// Python relative-import level: number of leading dots. Zero for
    /// absolute imports and for other languages.
    pub level: usize,
}

impl RawImport {
    /// A plain import of `raw` with no modifiers.
    pub fn plain(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            ..Self::default()
        }
    }
}

/// Everything extraction pulls out of one source file.
///
/// A file that fails to read never gets here; a file that parses badly gets
/// a default `Extraction` with `parse_failed` set and contributes nothing.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Dependency references, in source order.
    pub imports: Vec<RawImport>,
    /// Top-level names this file declares (exported functions, types,
    /// consts). Feeds the export index for scope-based languages.
    pub declared: Vec<String>,
    /// Identifiers the file refers to. Used to narrow scope-based
    /// resolution down to the files actually used.
    pub referenced: Vec<String>,
    /// The scope this file declares itself into (a Java `package a.b;`).
    /// Directory-bound languages leave this `None` and derive the scope
    /// from the path instead.
    pub scope: Option<String>,
    /// Specifiers of `export * from "..."` statements, for barrel
    /// flattening after the graph is assembled.
    pub star_reexports: Vec<String>,
    /// The grammar could not make sense of the file. Treated as "no
    /// dependencies", never as a build error.
    pub parse_failed: bool,
}

/// The outcome of resolving one internal import.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Supplied files the import maps to. Empty means unresolved (or
    /// deliberately dropped as ambiguous). Multiple targets are legitimate
    /// for scope imports and glob patterns.
    pub targets: Vec<PathBuf>,
    /// The scope-level fallback fired: symbol narrowing found nothing and
    /// the full candidate set was returned instead.
    pub used_fallback: bool,
}

impl Resolution {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn to(targets: Vec<PathBuf>) -> Self {
        Self {
            targets,
            used_fallback: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Language adapter trait
// ---------------------------------------------------------------------------

/// Per-language capability bundle.
///
/// Each supported language implements this once, as a stateless unit struct.
/// The engine routes files to adapters by extension and drives the same
/// pipeline for every language: extract, classify, resolve, link. Everything
/// language-specific (grammar choice, stdlib tables, probing order, scope
/// semantics) lives behind this trait.
pub trait Language: Sync {
    /// Short lowercase name used in logs and DOT node colors.
    fn name(&self) -> &'static str;

    /// File extensions routed to this adapter, without dots.
    fn extensions(&self) -> &'static [&'static str];

    /// Parse `source` and pull out imports, declarations and references.
    ///
    /// Must not fail: unreadable syntax yields an `Extraction` with
    /// `parse_failed` set.
    fn extract(&self, path: &Path, source: &[u8]) -> Extraction;

    /// Sort one import into internal / external / stdlib.
    fn classify(&self, importer: &Path, import: &RawImport, ctx: &ResolveCtx) -> ImportKind;

    /// Map an internal import to supplied files. Consults only the set and
    /// the phase-one indexes; never the filesystem.
    fn resolve(&self, importer: &Path, import: &RawImport, ctx: &ResolveCtx) -> Resolution;

    /// The scope key this file contributes symbols under, if the language
    /// has scope-based resolution (Go packages, Java packages).
    fn scope_key(&self, _path: &Path, _extraction: &Extraction) -> Option<String> {
        None
    }

    /// Files this one depends on without any import statement: same-package
    /// references in Go and Java. Resolved with the same symbol narrowing as
    /// scope imports, but never with the full-scope fallback.
    fn same_scope_links(&self, _importer: &Path, _ctx: &ResolveCtx) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Path-based test-file heuristic, for builds that exclude tests.
    fn is_test_file(&self, path: &Path) -> bool;

    /// Hook run once after all edges are assembled. TypeScript uses it to
    /// flatten barrel re-export chains.
    fn finalize(&self, _ctx: &ResolveCtx, _graph: &mut DepGraph) {}
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub static LANGUAGES: &[&'static dyn Language] = &[
    &typescript::TypeScript,
    &python::Python,
    &go::Go,
    &java::Java,
    &ruby::Ruby,
    &rust::RustLang,
];

/// The adapter responsible for `path`, by extension. `None` for files no
/// adapter claims; they can still appear as edge targets (embedded assets),
/// they just never produce edges of their own.
pub fn adapter_for(path: &Path) -> Option<&'static dyn Language> {
    let ext = path.extension().and_then(|e| e.to_str())?;
    LANGUAGES
        .iter()
        .find(|lang| lang.extensions().contains(&ext))
        .copied()
}

// ---------------------------------------------------------------------------
// Shared tree-sitter helpers
// ---------------------------------------------------------------------------

/// Node text with a safe fallback for non-UTF8 slices.
pub(crate) fn node_text<'a>(node: Node<'a>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// Strip one layer of matching quotes from a string literal's text.
pub(crate) fn unquote(text: &str) -> &str {
    let t = text.trim();
    for quote in ['"', '\'', '`'] {
        if t.len() >= 2 && t.starts_with(quote) && t.ends_with(quote) {
            return &t[1..t.len() - 1];
        }
    }
    t
}
