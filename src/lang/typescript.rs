use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tree_sitter::{Node, Query, QueryCursor, StreamingIterator};

use crate::engine::ResolveCtx;
use crate::graph::DepGraph;
use crate::parse::{self, Grammar};
use crate::resolver::probe;

use super::{node_text, unquote, Extraction, ImportKind, ImportStyle, Language, RawImport, Resolution};

/// TypeScript and JavaScript, one adapter.
///
/// Grammar differs by extension (TS, TSX, plain JS) but specifier syntax,
/// classification and resolution are identical across the family. `.svelte`
/// and `.vue` are routed here so they can appear as resolution targets;
/// their markup does not survive the TS grammar and extraction degrades to
/// nothing, which is the intended behavior.
pub struct TypeScript;

/// Probing order for extensionless specifiers. TypeScript sources first,
/// JavaScript flavors after, component formats last.
const EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts", "svelte", "vue",
];

const INDEX_NAMES: &[&str] = &["index"];

/// Node.js built-in modules. Specifiers may carry the `node:` scheme prefix;
/// it is stripped before the lookup.
const NODE_BUILTINS: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
    "crypto", "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "http", "http2",
    "https", "inspector", "module", "net", "os", "path", "perf_hooks", "process", "punycode",
    "querystring", "readline", "repl", "stream", "string_decoder", "sys", "timers", "tls",
    "trace_events", "tty", "url", "util", "v8", "vm", "wasi", "worker_threads", "zlib",
];

// ---------------------------------------------------------------------------
// Query strings
// ---------------------------------------------------------------------------

/// ESM static imports: `import { X } from 'module'`, `import X from 'module'`,
/// `import * as X from 'module'`, `import 'module'`.
const IMPORT_QUERY: &str = r#"
    (import_statement
      source: (string (string_fragment) @source)) @stmt
"#;

/// CJS require calls. No #eq? predicate: tree-sitter 0.26's StreamingIterator
/// does not auto-filter custom predicates, so the "require" check happens in
/// code.
const REQUIRE_QUERY: &str = r#"
    (call_expression
      function: (identifier) @fn
      arguments: (arguments (string (string_fragment) @source)))
"#;

/// Dynamic `import('module')` calls.
const DYNAMIC_QUERY: &str = r#"
    (call_expression
      function: (import)
      arguments: (arguments (string (string_fragment) @source)))
"#;

/// Export statements; re-exports are the ones with a `source` child.
const EXPORT_QUERY: &str = r#"
    (export_statement) @stmt
"#;

struct QuerySet {
    import: Query,
    require: Query,
    dynamic: Query,
    export: Query,
}

impl QuerySet {
    fn compile(language: &tree_sitter::Language) -> Option<Self> {
        Some(Self {
            import: Query::new(language, IMPORT_QUERY).ok()?,
            require: Query::new(language, REQUIRE_QUERY).ok()?,
            dynamic: Query::new(language, DYNAMIC_QUERY).ok()?,
            export: Query::new(language, EXPORT_QUERY).ok()?,
        })
    }
}

// Queries are per-language even when the pattern text is identical, so each
// grammar in the family caches its own compiled set.
static TS_QUERIES: OnceLock<Option<QuerySet>> = OnceLock::new();
static TSX_QUERIES: OnceLock<Option<QuerySet>> = OnceLock::new();
static JS_QUERIES: OnceLock<Option<QuerySet>> = OnceLock::new();

fn query_set(grammar: Grammar) -> Option<&'static QuerySet> {
    match grammar {
        Grammar::TypeScript => TS_QUERIES
            .get_or_init(|| QuerySet::compile(&parse::typescript_language()))
            .as_ref(),
        Grammar::Tsx => TSX_QUERIES
            .get_or_init(|| QuerySet::compile(&parse::tsx_language()))
            .as_ref(),
        Grammar::JavaScript => JS_QUERIES
            .get_or_init(|| QuerySet::compile(&parse::javascript_language()))
            .as_ref(),
        _ => None,
    }
}

fn grammar_for(path: &Path) -> Grammar {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "tsx" | "jsx" => Grammar::Tsx,
        "js" | "mjs" | "cjs" => Grammar::JavaScript,
        _ => Grammar::TypeScript,
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

impl Language for TypeScript {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn extract(&self, path: &Path, source: &[u8]) -> Extraction {
        let grammar = grammar_for(path);
        let Some(tree) = parse::parse(grammar, source) else {
            return Extraction {
                parse_failed: true,
                ..Extraction::default()
            };
        };

        let mut out = Extraction::default();
        match query_set(grammar) {
            Some(queries) => {
                extract_with_queries(queries, tree.root_node(), source, &mut out);
                // Error recovery can bury nodes where the query patterns
                // no longer reach them. Queries that saw nothing in a
                // broken tree hand the file to the walk.
                if out.imports.is_empty() && tree.root_node().has_error() {
                    walk_fallback(tree.root_node(), source, &mut out);
                }
            }
            // Grammar drift can invalidate a query; fall back to a manual
            // walk over the same node kinds rather than extracting nothing.
            None => walk_fallback(tree.root_node(), source, &mut out),
        }
        out
    }

    fn classify(&self, _importer: &Path, import: &RawImport, _ctx: &ResolveCtx) -> ImportKind {
        let spec = strip_query_suffix(&import.raw);
        if import.is_relative || spec.starts_with('/') {
            return ImportKind::Internal;
        }
        let bare = spec.strip_prefix("node:").unwrap_or(spec);
        // Builtins have no subpath except `fs/promises`-style slashes.
        let root = bare.split('/').next().unwrap_or(bare);
        if NODE_BUILTINS.contains(&root) {
            return ImportKind::Stdlib;
        }
        ImportKind::External
    }

    fn resolve(&self, importer: &Path, import: &RawImport, ctx: &ResolveCtx) -> Resolution {
        let spec = strip_query_suffix(&import.raw);
        if !import.is_relative && !spec.starts_with('/') {
            return Resolution::none();
        }
        let Some(dir) = importer.parent() else {
            return Resolution::none();
        };
        Resolution::to(probe::probe(ctx.files, dir, spec, EXTENSIONS, INDEX_NAMES))
    }

    fn is_test_file(&self, path: &Path) -> bool {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.contains(".test.") || name.contains(".spec.") {
            return true;
        }
        path.components()
            .any(|c| c.as_os_str() == "__tests__")
    }

    /// Flatten barrel chains: a file importing from an `export * from`
    /// barrel depends on what the barrel forwards, transitively. The direct
    /// importer → barrel edge stays; flattened edges are added next to it.
    fn finalize(&self, ctx: &ResolveCtx, graph: &mut DepGraph) {
        // Barrel file → resolved star re-export targets.
        let mut star_targets: HashMap<PathBuf, Vec<PathBuf>> = HashMap::new();
        for path in ctx.files {
            let Some(extraction) = ctx.extractions.get(path) else {
                continue;
            };
            if extraction.star_reexports.is_empty() {
                continue;
            }
            let Some(dir) = path.parent() else { continue };
            let mut targets = Vec::new();
            for spec in &extraction.star_reexports {
                let spec = strip_query_suffix(spec);
                if spec.starts_with('.') {
                    targets.extend(probe::probe(ctx.files, dir, spec, EXTENSIONS, INDEX_NAMES));
                }
            }
            if !targets.is_empty() {
                star_targets.insert(path.clone(), targets);
            }
        }
        if star_targets.is_empty() {
            return;
        }

        // Collect first, then mutate: edges added while flattening must not
        // feed new chain walks.
        let existing: Vec<(PathBuf, PathBuf)> = graph.edges();
        for (importer, barrel) in existing {
            if !star_targets.contains_key(&barrel) {
                continue;
            }
            let mut visited: Vec<&PathBuf> = Vec::new();
            let mut queue: Vec<&PathBuf> = vec![&barrel];
            while let Some(current) = queue.pop() {
                if visited.contains(&current) {
                    continue; // re-export cycle
                }
                visited.push(current);
                let Some(forwards) = star_targets.get(current) else {
                    continue;
                };
                for target in forwards {
                    graph.link(&importer, target);
                    queue.push(target);
                }
            }
        }
    }
}

/// Drop bundler suffixes (`./logo.svg?url`, `./x#fragment`) before probing.
fn strip_query_suffix(spec: &str) -> &str {
    let end = spec.find(['?', '#']).unwrap_or(spec.len());
    &spec[..end]
}

fn extract_with_queries(queries: &QuerySet, root: Node, source: &[u8], out: &mut Extraction) {
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&queries.import, root, source);
    while let Some(m) = matches.next() {
        let mut spec: Option<String> = None;
        let mut stmt: Option<Node> = None;
        for capture in m.captures {
            let name = queries.import.capture_names()[capture.index as usize];
            match name {
                "source" => spec = Some(node_text(capture.node, source).to_owned()),
                "stmt" => stmt = Some(capture.node),
                _ => {}
            }
        }
        if let Some(spec) = spec {
            out.imports.push(import_from_statement(&spec, stmt, source));
        }
    }

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&queries.require, root, source);
    while let Some(m) = matches.next() {
        let mut is_require = false;
        let mut spec: Option<String> = None;
        for capture in m.captures {
            let name = queries.require.capture_names()[capture.index as usize];
            match name {
                "fn" => is_require = node_text(capture.node, source) == "require",
                "source" => spec = Some(node_text(capture.node, source).to_owned()),
                _ => {}
            }
        }
        if is_require && let Some(spec) = spec {
            out.imports.push(plain_import(&spec));
        }
    }

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&queries.dynamic, root, source);
    while let Some(m) = matches.next() {
        for capture in m.captures {
            let name = queries.dynamic.capture_names()[capture.index as usize];
            if name == "source" {
                out.imports.push(plain_import(node_text(capture.node, source)));
            }
        }
    }

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&queries.export, root, source);
    while let Some(m) = matches.next() {
        for capture in m.captures {
            let name = queries.export.capture_names()[capture.index as usize];
            if name == "stmt" {
                record_export(capture.node, source, out);
            }
        }
    }
}

/// Build the import record for an ESM statement: wildcard and type-only come
/// from the statement shape, imported names from its clause.
fn import_from_statement(spec: &str, stmt: Option<Node>, source: &[u8]) -> RawImport {
    let mut import = plain_import(spec);
    let Some(stmt) = stmt else { return import };

    let text = node_text(stmt, source);
    import.is_type_only = text.starts_with("import type ") || text.starts_with("import type{");
    import.is_wildcard = has_descendant_kind(stmt, "namespace_import");
    import.symbols = named_import_symbols(stmt, source);
    import
}

fn plain_import(spec: &str) -> RawImport {
    RawImport {
        is_relative: spec.starts_with('.'),
        ..RawImport::plain(spec)
    }
}

/// Re-exports are dependencies too: `export { A } from './x'` and
/// `export * from './x'` both produce an edge. Star forms are additionally
/// remembered for the barrel-flattening pass.
fn record_export(stmt: Node, source: &[u8], out: &mut Extraction) {
    let Some(source_node) = stmt.child_by_field_name("source") else {
        return; // plain `export { A }` has no dependency
    };
    let spec = unquote(node_text(source_node, source)).to_owned();
    let text = node_text(stmt, source);
    let is_star = text.starts_with("export *") || text.starts_with("export type *");

    out.imports.push(RawImport {
        raw: spec.clone(),
        style: ImportStyle::ReExport,
        is_wildcard: is_star,
        is_relative: spec.starts_with('.'),
        is_type_only: text.starts_with("export type"),
        ..RawImport::default()
    });
    if is_star {
        out.star_reexports.push(spec);
    }
}

fn named_import_symbols(stmt: Node, source: &[u8]) -> Vec<String> {
    let mut symbols = Vec::new();
    let mut stack = vec![stmt];
    while let Some(node) = stack.pop() {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "import_specifier" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        symbols.push(node_text(name, source).to_owned());
                    }
                }
                "import_clause" | "named_imports" => stack.push(child),
                _ => {}
            }
        }
    }
    symbols
}

fn has_descendant_kind(node: Node, kind: &str) -> bool {
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        if n.kind() == kind {
            return true;
        }
        let mut cursor = n.walk();
        for child in n.children(&mut cursor) {
            stack.push(child);
        }
    }
    false
}

/// Manual extraction over the same node kinds the queries target. Used when
/// a query fails to compile against the linked grammar, and as a retry when
/// the queries find nothing in a tree containing errors.
fn walk_fallback(node: Node, source: &[u8], out: &mut Extraction) {
    match node.kind() {
        "import_statement" => {
            if let Some(source_node) = node.child_by_field_name("source") {
                let spec = unquote(node_text(source_node, source)).to_owned();
                out.imports.push(import_from_statement(&spec, Some(node), source));
            }
        }
        "export_statement" => record_export(node, source, out),
        "call_expression" => {
            let callee = node.child_by_field_name("function");
            let is_require = callee
                .map(|f| f.kind() == "identifier" && node_text(f, source) == "require")
                .unwrap_or(false);
            let is_dynamic = callee.map(|f| f.kind() == "import").unwrap_or(false);
            if (is_require || is_dynamic)
                && let Some(args) = node.child_by_field_name("arguments")
                && let Some(first) = args.named_child(0)
                && first.kind() == "string"
            {
                out.imports.push(plain_import(unquote(node_text(first, source))));
            }
        }
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_fallback(child, source, out);
    }
}
