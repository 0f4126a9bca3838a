use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tree_sitter::Node;

use crate::engine::ResolveCtx;
use crate::parse::{self, Grammar};
use crate::resolver::probe;

use super::{node_text, Extraction, ImportKind, ImportStyle, Language, RawImport, Resolution};

/// Go. Imports name packages, packages are directories, and a directory's
/// files share one namespace, so resolution goes import path → directory
/// (via `go.mod`) → files, narrowed to the ones declaring the identifiers
/// the importer actually touches.
pub struct Go;

const EXTENSIONS: &[&str] = &["go"];

static EMBED_RE: OnceLock<Regex> = OnceLock::new();

fn embed_re() -> &'static Regex {
    EMBED_RE.get_or_init(|| Regex::new(r"^\s*//go:embed\s+(.+)$").unwrap())
}

/// The scope key for a Go package: its directory, as a string. Files
/// register under it during indexing and imports look it up after mapping
/// their path through the module manifest.
pub(crate) fn dir_key(dir: &Path) -> String {
    dir.display().to_string()
}

impl Language for Go {
    fn name(&self) -> &'static str {
        "go"
    }

    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn extract(&self, _path: &Path, source: &[u8]) -> Extraction {
        let Some(tree) = parse::parse(Grammar::Go, source) else {
            return Extraction {
                parse_failed: true,
                ..Extraction::default()
            };
        };

        let mut out = Extraction::default();
        let root = tree.root_node();

        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            match child.kind() {
                "package_clause" => {
                    let mut inner = child.walk();
                    for c in child.children(&mut inner) {
                        if c.kind() == "package_identifier" {
                            out.scope = Some(node_text(c, source).to_owned());
                        }
                    }
                }
                "import_declaration" => collect_imports(child, source, &mut out.imports),
                _ => collect_declarations(child, source, &mut out.declared),
            }
        }

        let mut referenced = HashSet::new();
        collect_references(root, source, &mut referenced);
        out.referenced = referenced.into_iter().collect();
        out.referenced.sort();

        // Embed directives live in comments; the grammar sees only a
        // comment token, so they come from a line scan.
        if let Ok(text) = std::str::from_utf8(source) {
            for line in text.lines() {
                let Some(caps) = embed_re().captures(line) else {
                    continue;
                };
                for pattern in caps[1].split_whitespace() {
                    out.imports.push(RawImport {
                        raw: super::unquote(pattern).to_owned(),
                        style: ImportStyle::Embed,
                        ..RawImport::default()
                    });
                }
            }
        }

        out
    }

    fn classify(&self, importer: &Path, import: &RawImport, ctx: &ResolveCtx) -> ImportKind {
        if import.style == ImportStyle::Embed {
            return ImportKind::Internal;
        }
        if let Some(dir) = importer.parent()
            && let Some(manifest) = ctx.manifests.go_module_for(dir)
            && manifest.resolve_go_dir(&import.raw).is_some()
        {
            return ImportKind::Internal;
        }
        // Module paths start with a host ("github.com/..."); the stdlib
        // has no dot in its first segment ("fmt", "net/http").
        let first = import.raw.split('/').next().unwrap_or("");
        if first.contains('.') {
            ImportKind::External
        } else {
            ImportKind::Stdlib
        }
    }

    fn resolve(&self, importer: &Path, import: &RawImport, ctx: &ResolveCtx) -> Resolution {
        let Some(importer_dir) = importer.parent() else {
            return Resolution::none();
        };

        if import.style == ImportStyle::Embed {
            return Resolution::to(probe::probe_glob(ctx.files, importer_dir, &import.raw));
        }

        let Some(manifest) = ctx.manifests.go_module_for(importer_dir) else {
            return Resolution::none();
        };
        let Some(package_dir) = manifest.resolve_go_dir(&import.raw) else {
            return Resolution::none();
        };

        resolve_scope_import(importer, &dir_key(&package_dir), ctx)
    }

    fn scope_key(&self, path: &Path, _extraction: &Extraction) -> Option<String> {
        path.parent().map(dir_key)
    }

    /// Files in the same package are reachable with no import at all.
    /// Narrowing only: a bare identifier that matches nothing stays
    /// unlinked rather than pulling in the whole directory.
    fn same_scope_links(&self, importer: &Path, ctx: &ResolveCtx) -> Vec<PathBuf> {
        let Some(dir) = importer.parent() else {
            return Vec::new();
        };
        let refs = external_references(importer, ctx);
        let mut targets = ctx.index.narrow(&dir_key(dir), &refs);
        targets.retain(|t| t != importer);
        targets
    }

    fn is_test_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with("_test.go"))
            .unwrap_or(false)
    }
}

/// Scope-import resolution shared by the plain and dot-import forms:
/// narrow the package's files to those declaring referenced identifiers,
/// fall back to the whole package when narrowing finds nothing.
fn resolve_scope_import(importer: &Path, scope: &str, ctx: &ResolveCtx) -> Resolution {
    let refs = external_references(importer, ctx);
    let mut narrowed = ctx.index.narrow(scope, &refs);
    narrowed.retain(|t| t != importer);
    if !narrowed.is_empty() {
        return Resolution::to(narrowed);
    }

    if !ctx.options.package_fallback {
        return Resolution::none();
    }
    let mut all = ctx.index.files_in_scope(scope);
    all.retain(|t| t != importer);
    Resolution {
        used_fallback: !all.is_empty(),
        targets: all,
    }
}

/// The importer's referenced identifiers minus its own declarations:
/// the names that must come from somewhere else.
fn external_references<'a>(importer: &Path, ctx: &'a ResolveCtx) -> HashSet<&'a str> {
    let Some(extraction) = ctx.extractions.get(importer) else {
        return HashSet::new();
    };
    let own: HashSet<&str> = extraction.declared.iter().map(String::as_str).collect();
    extraction
        .referenced
        .iter()
        .map(String::as_str)
        .filter(|r| !own.contains(r))
        .collect()
}

// ---------------------------------------------------------------------------
// Extraction helpers
// ---------------------------------------------------------------------------

fn collect_imports(decl: Node, source: &[u8], out: &mut Vec<RawImport>) {
    let mut stack = vec![decl];
    while let Some(node) = stack.pop() {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "import_spec" => {
                    let Some(path_node) = child.child_by_field_name("path") else {
                        continue;
                    };
                    let raw = super::unquote(node_text(path_node, source)).to_owned();
                    if raw.is_empty() {
                        continue;
                    }
                    // `import . "pkg"` spills the package into this file's
                    // namespace, a wildcard. Blank imports (`_`) still
                    // depend on the package's init side effects.
                    let is_wildcard = child
                        .child_by_field_name("name")
                        .map(|n| n.kind() == "dot")
                        .unwrap_or(false);
                    out.push(RawImport {
                        raw,
                        is_wildcard,
                        ..RawImport::default()
                    });
                }
                "import_spec_list" => stack.push(child),
                _ => {}
            }
        }
    }
}

fn collect_declarations(node: Node, source: &[u8], out: &mut Vec<String>) {
    let mut push_name = |n: Option<Node>| {
        if let Some(n) = n {
            let name = node_text(n, source);
            if !name.is_empty() {
                out.push(name.to_owned());
            }
        }
    };
    match node.kind() {
        "function_declaration" | "method_declaration" => {
            push_name(node.child_by_field_name("name"));
        }
        "type_declaration" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if matches!(child.kind(), "type_spec" | "type_alias") {
                    push_name(child.child_by_field_name("name"));
                }
            }
        }
        "const_declaration" | "var_declaration" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if matches!(child.kind(), "const_spec" | "var_spec") {
                    let mut names = child.walk();
                    for name in child.children_by_field_name("name", &mut names) {
                        push_name(Some(name));
                    }
                }
            }
        }
        _ => {}
    }
}

/// Names this file uses that resolution can match against another file's
/// declarations: selector fields (`util.Parse` → `Parse`), qualified type
/// names, and bare capitalized identifiers (dot imports, same-package use).
fn collect_references(node: Node, source: &[u8], out: &mut HashSet<String>) {
    match node.kind() {
        "selector_expression" => {
            if let Some(field) = node.child_by_field_name("field") {
                out.insert(node_text(field, source).to_owned());
            }
        }
        "qualified_type" => {
            if let Some(name) = node.child_by_field_name("name") {
                out.insert(node_text(name, source).to_owned());
            }
        }
        "identifier" | "type_identifier" => {
            let text = node_text(node, source);
            if text.chars().next().map(|c| c.is_uppercase()).unwrap_or(false) {
                out.insert(text.to_owned());
            }
        }
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_references(child, source, out);
    }
}
