use std::path::{Path, PathBuf};

use tree_sitter::Node;

use crate::engine::ResolveCtx;
use crate::fileset::FileSet;
use crate::parse::{self, Grammar};

use super::{node_text, Extraction, ImportKind, Language, RawImport, Resolution};

/// Python. Imports are dotted module paths; relative imports count leading
/// dots; packages resolve through `__init__` files. Python has no scope
/// index: every import names a module, so resolution lands on files
/// directly.
pub struct Python;

const EXTENSIONS: &[&str] = &["py", "pyi"];

/// Top-level standard-library modules. First-segment lookup; project names
/// shadow these the way a module next to your script shadows the stdlib.
const PY_STDLIB: &[&str] = &[
    "__future__", "abc", "argparse", "ast", "asyncio", "base64", "bisect", "builtins",
    "collections", "concurrent", "configparser", "contextlib", "copy", "csv", "ctypes",
    "dataclasses", "datetime", "decimal", "difflib", "dis", "email", "enum", "errno",
    "functools", "gc", "getpass", "glob", "gzip", "hashlib", "heapq", "hmac", "html", "http",
    "importlib", "inspect", "io", "itertools", "json", "logging", "math", "mimetypes",
    "multiprocessing", "operator", "os", "pathlib", "pickle", "platform", "pprint", "queue",
    "random", "re", "secrets", "select", "shlex", "shutil", "signal", "site", "socket",
    "sqlite3", "ssl", "stat", "statistics", "string", "struct", "subprocess", "sys",
    "tempfile", "textwrap", "threading", "time", "timeit", "token", "tokenize", "traceback",
    "types", "typing", "unicodedata", "unittest", "urllib", "uuid", "venv", "warnings",
    "weakref", "xml", "zipfile", "zlib",
];

impl Language for Python {
    fn name(&self) -> &'static str {
        "python"
    }

    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn extract(&self, _path: &Path, source: &[u8]) -> Extraction {
        let Some(tree) = parse::parse(Grammar::Python, source) else {
            return Extraction {
                parse_failed: true,
                ..Extraction::default()
            };
        };
        let mut out = Extraction::default();
        walk(tree.root_node(), source, &mut out);
        out
    }

    fn classify(&self, _importer: &Path, import: &RawImport, ctx: &ResolveCtx) -> ImportKind {
        if import.level > 0 {
            return ImportKind::Internal;
        }
        let first = import.raw.split('.').next().unwrap_or("");
        if first.is_empty() {
            return ImportKind::External;
        }
        // Project modules shadow the stdlib, like a sibling module at
        // runtime would.
        if ctx.scopes.is_python_root(first) {
            return ImportKind::Internal;
        }
        if PY_STDLIB.contains(&first) {
            return ImportKind::Stdlib;
        }
        ImportKind::External
    }

    fn resolve(&self, importer: &Path, import: &RawImport, ctx: &ResolveCtx) -> Resolution {
        let segments: Vec<&str> = if import.raw.is_empty() {
            Vec::new()
        } else {
            import.raw.split('.').collect()
        };

        if import.level > 0 {
            return Resolution::to(resolve_relative(importer, import, &segments, ctx.files));
        }

        // Absolute: match the dotted path as a trailing run of path
        // components anywhere in the set. Both `a/b/c.py` and
        // `a/b/c/__init__.py` spell module `a.b.c`; all matches count.
        let mut targets = Vec::new();
        for member in ctx.files {
            if !is_python_file(member) {
                continue;
            }
            if ends_with_module(member, &segments) {
                push_unique(&mut targets, member.clone());
            }
        }
        // `from a.b import c` may be importing submodule a/b/c.py.
        for symbol in &import.symbols {
            let mut extended = segments.clone();
            extended.push(symbol.as_str());
            for member in ctx.files {
                if is_python_file(member) && ends_with_module(member, &extended) {
                    push_unique(&mut targets, member.clone());
                }
            }
        }
        Resolution::to(targets)
    }

    fn is_test_file(&self, path: &Path) -> bool {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        if stem.starts_with("test_") || stem.ends_with("_test") || stem == "conftest" {
            return true;
        }
        path.components().any(|c| c.as_os_str() == "tests")
    }
}

// ---------------------------------------------------------------------------
// Extraction walk
// ---------------------------------------------------------------------------

fn walk(node: Node, source: &[u8], out: &mut Extraction) {
    match node.kind() {
        "import_statement" => {
            // `import a.b, x.y as z` produces one import per name.
            let mut cursor = node.walk();
            for child in node.children_by_field_name("name", &mut cursor) {
                let path = match child.kind() {
                    "aliased_import" => child
                        .child_by_field_name("name")
                        .map(|n| node_text(n, source))
                        .unwrap_or(""),
                    _ => node_text(child, source),
                };
                if !path.is_empty() {
                    out.imports.push(RawImport::plain(path));
                }
            }
        }
        "import_from_statement" => {
            if let Some(import) = from_import(node, source) {
                out.imports.push(import);
            }
        }
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, out);
    }
}

/// `from X import a, b as c` / `from ..pkg import d` / `from x import *`.
fn from_import(node: Node, source: &[u8]) -> Option<RawImport> {
    let module = node.child_by_field_name("module_name")?;

    let (raw, level) = match module.kind() {
        "relative_import" => {
            let mut dots = 0;
            let mut path = "";
            let mut cursor = module.walk();
            for child in module.children(&mut cursor) {
                match child.kind() {
                    "import_prefix" => dots = node_text(child, source).len(),
                    "dotted_name" => path = node_text(child, source),
                    _ => {}
                }
            }
            (path.to_owned(), dots)
        }
        _ => (node_text(module, source).to_owned(), 0),
    };

    let mut symbols = Vec::new();
    let mut is_wildcard = false;
    let mut cursor = node.walk();
    for child in node.children_by_field_name("name", &mut cursor) {
        let name = match child.kind() {
            "aliased_import" => child
                .child_by_field_name("name")
                .map(|n| node_text(n, source))
                .unwrap_or(""),
            _ => node_text(child, source),
        };
        if !name.is_empty() {
            symbols.push(name.to_owned());
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "wildcard_import" {
            is_wildcard = true;
        }
    }

    Some(RawImport {
        raw,
        symbols,
        is_wildcard,
        is_relative: level > 0,
        level,
        ..RawImport::default()
    })
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

fn resolve_relative(
    importer: &Path,
    import: &RawImport,
    segments: &[&str],
    files: &FileSet,
) -> Vec<PathBuf> {
    // Level 1 is the importer's own package; each extra dot climbs one.
    let mut base = importer.parent().map(Path::to_path_buf).unwrap_or_default();
    for _ in 1..import.level {
        base = base.parent().map(Path::to_path_buf).unwrap_or(base);
    }

    let mut targets = Vec::new();
    if segments.is_empty() {
        // `from . import x, y`: each name is a sibling module, or a name
        // inside the package's __init__.
        for symbol in &import.symbols {
            for hit in probe_module(files, &base, &[symbol.as_str()]) {
                push_unique(&mut targets, hit);
            }
        }
        if targets.is_empty() {
            for hit in probe_module(files, &base, &[]) {
                push_unique(&mut targets, hit);
            }
        }
        return targets;
    }

    for hit in probe_module(files, &base, segments) {
        push_unique(&mut targets, hit);
    }
    // `from .pkg import mod` also reaches pkg/mod.py.
    for symbol in &import.symbols {
        let mut extended = segments.to_vec();
        extended.push(symbol.as_str());
        for hit in probe_module(files, &base, &extended) {
            push_unique(&mut targets, hit);
        }
    }
    targets
}

/// Candidates for module `base/seg0/seg1/...`: the `.py`/`.pyi` file, then
/// the package `__init__`. Empty segments name the base package itself.
fn probe_module(files: &FileSet, base: &Path, segments: &[&str]) -> Vec<PathBuf> {
    let dir = segments.iter().fold(base.to_path_buf(), |d, s| d.join(s));
    let mut hits = Vec::new();
    if !segments.is_empty() {
        for ext in EXTENSIONS {
            let candidate = dir.with_extension(ext);
            if files.contains(&candidate) {
                hits.push(candidate);
            }
        }
    }
    for ext in EXTENSIONS {
        let candidate = dir.join(format!("__init__.{ext}"));
        if files.contains(&candidate) {
            hits.push(candidate);
        }
    }
    hits
}

fn is_python_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("py") | Some("pyi")
    )
}

/// Does `member`'s path end with `segments` as whole components, after
/// stripping the extension and a trailing `__init__`?
fn ends_with_module(member: &Path, segments: &[&str]) -> bool {
    if segments.is_empty() {
        return false;
    }
    let mut comps: Vec<&str> = member
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(n) => n.to_str(),
            _ => None,
        })
        .collect();
    let Some(stem) = member.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    if let Some(last) = comps.last_mut() {
        *last = stem;
    }
    if comps.last() == Some(&"__init__") {
        comps.pop();
    }
    comps.len() >= segments.len() && comps[comps.len() - segments.len()..] == *segments
}

fn push_unique(targets: &mut Vec<PathBuf>, candidate: PathBuf) {
    if !targets.contains(&candidate) {
        targets.push(candidate);
    }
}
