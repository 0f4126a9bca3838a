use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tree_sitter::Node;

use crate::engine::ResolveCtx;
use crate::parse::{self, Grammar};
use crate::resolver::{fuzzy, probe};

use super::{node_text, Extraction, ImportKind, ImportStyle, Language, RawImport, Resolution};

/// Ruby. Dependencies hide in two places: `require`/`require_relative`
/// calls, and constant references (`Acme::Widgets::Frob`) that autoloading
/// satisfies with no require at all. The latter resolve by matching the
/// constant path against file path components, and only ever to a unique
/// winner.
pub struct Ruby;

const EXTENSIONS: &[&str] = &["rb", "rake", "gemspec"];

/// Common standard-library requires. Entries with slashes match the full
/// specifier (`net/http`); the rest match its first segment.
const RUBY_STDLIB: &[&str] = &[
    "abbrev", "base64", "benchmark", "bigdecimal", "cgi", "csv", "date", "delegate", "digest",
    "English", "erb", "etc", "fileutils", "find", "forwardable", "io/console", "ipaddr", "json",
    "logger", "net/http", "net/smtp", "objspace", "open-uri", "open3", "openssl", "optparse",
    "ostruct", "pathname", "pp", "prettyprint", "pstore", "rbconfig", "resolv", "rss",
    "securerandom", "set", "shellwords", "singleton", "socket", "stringio", "strscan", "tempfile",
    "time", "timeout", "tmpdir", "tsort", "uri", "weakref", "yaml", "zlib",
];

/// Constants provided by the core runtime; references to these never leave
/// the interpreter.
const CORE_CONSTANTS: &[&str] = &[
    "ARGV", "Array", "BasicObject", "Class", "Comparable", "Complex", "Data", "Dir", "ENV",
    "Encoding", "Enumerable", "Enumerator", "Exception", "FalseClass", "File", "Float", "GC",
    "Hash", "IO", "Integer", "Kernel", "Marshal", "MatchData", "Math", "Method", "Module",
    "Mutex", "NilClass", "Numeric", "Object", "ObjectSpace", "Proc", "Process", "Queue",
    "Random", "Range", "Rational", "Regexp", "RubyVM", "Set", "Signal", "StandardError",
    "String", "Struct", "Symbol", "Thread", "Time", "TrueClass",
];

impl Language for Ruby {
    fn name(&self) -> &'static str {
        "ruby"
    }

    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn extract(&self, _path: &Path, source: &[u8]) -> Extraction {
        let Some(tree) = parse::parse(Grammar::Ruby, source) else {
            return Extraction {
                parse_failed: true,
                ..Extraction::default()
            };
        };

        let mut out = Extraction::default();
        let mut seen_refs = HashSet::new();
        walk(tree.root_node(), source, &mut out, &mut seen_refs);

        // A file referencing a constant it declares is talking to itself;
        // only the first segment matters (`Widget::Config` inside the file
        // declaring `Widget`).
        let own_roots: HashSet<&str> = out
            .declared
            .iter()
            .map(|d| d.split("::").next().unwrap_or(d.as_str()))
            .collect();
        out.imports.retain(|i| {
            i.style != ImportStyle::QualifiedRef
                || !own_roots.contains(i.raw.split("::").next().unwrap_or(""))
        });

        out
    }

    fn classify(&self, _importer: &Path, import: &RawImport, ctx: &ResolveCtx) -> ImportKind {
        if import.style == ImportStyle::QualifiedRef {
            let first = import.raw.split("::").next().unwrap_or("");
            if CORE_CONSTANTS.contains(&first) {
                return ImportKind::Stdlib;
            }
            // Gem constants look the same as project ones; an attempt that
            // matches no supplied file simply produces no edge.
            return ImportKind::Internal;
        }

        if import.is_relative {
            return ImportKind::Internal;
        }
        let first = import.raw.split('/').next().unwrap_or("");
        if RUBY_STDLIB.contains(&import.raw.as_str()) || RUBY_STDLIB.contains(&first) {
            return ImportKind::Stdlib;
        }
        if suffix_matches_any(ctx.files, &import.raw) {
            return ImportKind::Internal;
        }
        ImportKind::External
    }

    fn resolve(&self, importer: &Path, import: &RawImport, ctx: &ResolveCtx) -> Resolution {
        match import.style {
            ImportStyle::QualifiedRef => {
                let segments: Vec<&str> = import.raw.split("::").collect();
                let candidates: Vec<&PathBuf> = ctx
                    .files
                    .iter()
                    .filter(|p| is_ruby_file(p) && p.as_path() != importer)
                    .collect();
                match fuzzy::resolve_qualified(&candidates, &segments) {
                    Some(target) => Resolution::to(vec![target]),
                    None => Resolution::none(),
                }
            }
            _ if import.is_relative => {
                let Some(dir) = importer.parent() else {
                    return Resolution::none();
                };
                Resolution::to(probe::probe(ctx.files, dir, &import.raw, &["rb"], &[]))
            }
            _ => {
                let mut targets: Vec<PathBuf> = ctx
                    .files
                    .iter()
                    .filter(|p| p.as_path() != importer && suffix_matches(p, &import.raw))
                    .cloned()
                    .collect();
                targets.sort();
                Resolution::to(targets)
            }
        }
    }

    fn is_test_file(&self, path: &Path) -> bool {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.ends_with("_spec.rb") || name.ends_with("_test.rb") {
            return true;
        }
        path.components()
            .any(|c| c.as_os_str() == "spec" || c.as_os_str() == "test")
    }
}

fn is_ruby_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

/// Does any supplied file end with `spec` (plus `.rb`) as whole components?
fn suffix_matches_any(files: &crate::fileset::FileSet, spec: &str) -> bool {
    files.iter().any(|p| suffix_matches(p, spec))
}

fn suffix_matches(path: &Path, spec: &str) -> bool {
    let spec_path = Path::new(spec);
    let mut wanted: Vec<String> = spec_path
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(n) => n.to_str().map(str::to_owned),
            _ => None,
        })
        .collect();
    let Some(last) = wanted.last_mut() else {
        return false;
    };
    if !last.ends_with(".rb") {
        last.push_str(".rb");
    }

    let comps: Vec<&str> = path
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(n) => n.to_str(),
            _ => None,
        })
        .collect();
    comps.len() >= wanted.len()
        && comps[comps.len() - wanted.len()..]
            .iter()
            .zip(wanted.iter())
            .all(|(a, b)| *a == b)
}

// ---------------------------------------------------------------------------
// Extraction walk
// ---------------------------------------------------------------------------

fn walk(node: Node, source: &[u8], out: &mut Extraction, seen_refs: &mut HashSet<String>) {
    match node.kind() {
        "call" => {
            if let Some((method, spec)) = require_call(node, source) {
                out.imports.push(RawImport {
                    raw: spec,
                    is_relative: method == "require_relative",
                    ..RawImport::default()
                });
            }
        }
        "class" | "module" => {
            if let Some(name) = node.child_by_field_name("name") {
                out.declared.push(node_text(name, source).to_owned());
            }
        }
        "scope_resolution" => {
            if !is_inside_declaration_name(node) && is_topmost_scope(node) {
                push_ref(node_text(node, source), out, seen_refs);
            }
            // Children of a scope_resolution are spelled-out segments of the
            // same reference; no descent needed.
            return;
        }
        "constant" => {
            if !is_inside_declaration_name(node)
                && !parent_is(node, "scope_resolution")
                && !is_assignment_target(node)
            {
                push_ref(node_text(node, source), out, seen_refs);
            }
            if is_assignment_target(node) {
                out.declared.push(node_text(node, source).to_owned());
            }
        }
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, out, seen_refs);
    }
}

fn push_ref(raw: &str, out: &mut Extraction, seen: &mut HashSet<String>) {
    if raw.is_empty() || !seen.insert(raw.to_owned()) {
        return;
    }
    out.imports.push(RawImport {
        raw: raw.to_owned(),
        style: ImportStyle::QualifiedRef,
        ..RawImport::default()
    });
}

/// `require 'x'` / `require_relative 'x'` with a literal string argument.
fn require_call(node: Node, source: &[u8]) -> Option<(&'static str, String)> {
    let method = node.child_by_field_name("method")?;
    let method = match node_text(method, source) {
        "require" => "require",
        "require_relative" => "require_relative",
        _ => return None,
    };
    let args = node.child_by_field_name("arguments")?;
    let first = args.named_child(0)?;
    if first.kind() != "string" {
        return None; // dynamic require; nothing to resolve
    }
    let mut cursor = first.walk();
    for child in first.children(&mut cursor) {
        if child.kind() == "string_content" {
            return Some((method, node_text(child, source).to_owned()));
        }
    }
    None
}

/// Is this node the declared name of an enclosing class/module?
fn is_inside_declaration_name(node: Node) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    if matches!(parent.kind(), "class" | "module")
        && let Some(name) = parent.child_by_field_name("name")
    {
        return name.id() == node.id();
    }
    // The pieces of a declared `class A::B` name.
    if parent.kind() == "scope_resolution" {
        return is_inside_declaration_name(parent);
    }
    false
}

fn is_topmost_scope(node: Node) -> bool {
    node.parent()
        .map(|p| p.kind() != "scope_resolution")
        .unwrap_or(true)
}

fn parent_is(node: Node, kind: &str) -> bool {
    node.parent().map(|p| p.kind() == kind).unwrap_or(false)
}

/// `LIMIT = 5` declares LIMIT rather than referencing it.
fn is_assignment_target(node: Node) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    parent.kind() == "assignment"
        && parent
            .child_by_field_name("left")
            .map(|l| l.id() == node.id())
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CtxFixture;

    fn extract(source: &str) -> Extraction {
        Ruby.extract(Path::new("widget.rb"), source.as_bytes())
    }

    fn refs(e: &Extraction) -> Vec<&str> {
        e.imports
            .iter()
            .filter(|i| i.style == ImportStyle::QualifiedRef)
            .map(|i| i.raw.as_str())
            .collect()
    }

    #[test]
    fn extracts_requires_both_kinds() {
        let e = extract("require 'json'\nrequire_relative 'helpers/format'\n");
        assert_eq!(e.imports[0].raw, "json");
        assert!(!e.imports[0].is_relative);
        assert_eq!(e.imports[1].raw, "helpers/format");
        assert!(e.imports[1].is_relative);
    }

    #[test]
    fn extracts_qualified_refs_once_each() {
        let e = extract(
            r#"
class Processor
  def run
    Acme::Widgets::Frob.new
    Acme::Widgets::Frob.cached
    Inventory.count
  end
end
"#,
        );
        assert_eq!(refs(&e), vec!["Acme::Widgets::Frob", "Inventory"]);
        assert_eq!(e.declared, vec!["Processor"]);
    }

    #[test]
    fn own_declarations_do_not_become_refs() {
        let e = extract(
            r#"
class Widget
  LIMIT = 5

  def dup_limit
    Widget.new(LIMIT)
  end
end
"#,
        );
        assert!(refs(&e).is_empty(), "self references must be dropped: {:?}", refs(&e));
        assert!(e.declared.contains(&"Widget".to_string()));
        assert!(e.declared.contains(&"LIMIT".to_string()));
    }

    #[test]
    fn superclass_is_a_reference() {
        let e = extract("class Widget < Base\nend\n");
        assert_eq!(refs(&e), vec!["Base"]);
    }

    #[test]
    fn classifies_requires_and_constants() {
        let mut fx = CtxFixture::new();
        fx.add_file("/r/lib/acme/widget.rb", "");
        let ctx = fx.ctx();
        let importer = Path::new("/r/app.rb");

        let require = |raw: &str| RawImport::plain(raw);
        assert_eq!(Ruby.classify(importer, &require("json"), &ctx), ImportKind::Stdlib);
        assert_eq!(
            Ruby.classify(importer, &require("net/http"), &ctx),
            ImportKind::Stdlib
        );
        assert_eq!(
            Ruby.classify(importer, &require("acme/widget"), &ctx),
            ImportKind::Internal,
            "a supplied file ends in acme/widget.rb"
        );
        assert_eq!(
            Ruby.classify(importer, &require("rails"), &ctx),
            ImportKind::External
        );

        let constant = |raw: &str| RawImport {
            raw: raw.into(),
            style: ImportStyle::QualifiedRef,
            ..RawImport::default()
        };
        assert_eq!(
            Ruby.classify(importer, &constant("File"), &ctx),
            ImportKind::Stdlib
        );
        assert_eq!(
            Ruby.classify(importer, &constant("Acme::Widget"), &ctx),
            ImportKind::Internal
        );
    }

    #[test]
    fn require_relative_probes_the_rb_extension() {
        let mut fx = CtxFixture::new();
        fx.add_file("/r/lib/acme/app.rb", "");
        fx.add_file("/r/lib/acme/helpers/format.rb", "");
        let ctx = fx.ctx();

        let import = RawImport {
            raw: "helpers/format".into(),
            is_relative: true,
            ..RawImport::default()
        };
        let r = Ruby.resolve(Path::new("/r/lib/acme/app.rb"), &import, &ctx);
        assert_eq!(r.targets, vec![PathBuf::from("/r/lib/acme/helpers/format.rb")]);
    }

    #[test]
    fn plain_require_matches_path_suffix_anywhere() {
        let mut fx = CtxFixture::new();
        fx.add_file("/r/lib/acme/widget.rb", "");
        fx.add_file("/r/app.rb", "");
        let ctx = fx.ctx();

        let import = RawImport::plain("acme/widget");
        let r = Ruby.resolve(Path::new("/r/app.rb"), &import, &ctx);
        assert_eq!(r.targets, vec![PathBuf::from("/r/lib/acme/widget.rb")]);
    }

    #[test]
    fn qualified_ref_resolves_to_unique_best_path() {
        let mut fx = CtxFixture::new();
        fx.add_file("/r/lib/acme/widgets/frob.rb", "");
        fx.add_file("/r/lib/acme/other.rb", "");
        fx.add_file("/r/app.rb", "");
        let ctx = fx.ctx();

        let import = RawImport {
            raw: "Acme::Widgets::Frob".into(),
            style: ImportStyle::QualifiedRef,
            ..RawImport::default()
        };
        let r = Ruby.resolve(Path::new("/r/app.rb"), &import, &ctx);
        assert_eq!(r.targets, vec![PathBuf::from("/r/lib/acme/widgets/frob.rb")]);
    }

    #[test]
    fn ambiguous_qualified_ref_resolves_to_nothing() {
        let mut fx = CtxFixture::new();
        fx.add_file("/r/lib/acme/widget.rb", "");
        fx.add_file("/r/spec_support/acme/widget.rb", "");
        fx.add_file("/r/app.rb", "");
        let ctx = fx.ctx();

        let import = RawImport {
            raw: "Acme::Widget".into(),
            style: ImportStyle::QualifiedRef,
            ..RawImport::default()
        };
        let r = Ruby.resolve(Path::new("/r/app.rb"), &import, &ctx);
        assert!(r.targets.is_empty(), "a scoring tie must not produce an edge");
    }

    #[test]
    fn test_file_heuristic() {
        assert!(Ruby.is_test_file(Path::new("/r/spec/widget_spec.rb")));
        assert!(Ruby.is_test_file(Path::new("/r/test/widget_test.rb")));
        assert!(!Ruby.is_test_file(Path::new("/r/lib/widget.rb")));
    }
}
