use std::path::{Path, PathBuf};

use tree_sitter::Node;

use crate::engine::ResolveCtx;
use crate::parse::{self, Grammar};
use crate::resolver::probe;

use super::{node_text, Extraction, ImportKind, ImportStyle, Language, RawImport, Resolution};

/// Rust. `use` paths and `mod` declarations map onto the module tree, which
/// maps onto files by convention: `foo.rs` or `foo/mod.rs` under the parent
/// module's directory, rooted at `src/lib.rs` / `src/main.rs` per the nearest
/// Cargo manifest. A `use` path often names an item rather than a module, so
/// resolution probes progressively shorter prefixes until one lands on a
/// file.
pub struct RustLang;

const EXTENSIONS: &[&str] = &["rs"];

impl Language for RustLang {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn extract(&self, _path: &Path, source: &[u8]) -> Extraction {
        let Some(tree) = parse::parse(Grammar::Rust, source) else {
            return Extraction {
                parse_failed: true,
                ..Extraction::default()
            };
        };

        let mut out = Extraction::default();
        walk(tree.root_node(), source, &mut out);
        out
    }

    fn classify(&self, importer: &Path, import: &RawImport, ctx: &ResolveCtx) -> ImportKind {
        if import.style == ImportStyle::ModDecl {
            return ImportKind::Internal;
        }
        let first = import.raw.split("::").next().unwrap_or("");
        match first {
            "std" | "core" | "alloc" | "proc_macro" => ImportKind::Stdlib,
            "crate" | "self" | "super" => ImportKind::Internal,
            _ => {
                let manifest = importer
                    .parent()
                    .and_then(|dir| ctx.manifests.cargo_package_for(dir));
                match manifest {
                    Some(m) if first == m.name || m.remaps.iter().any(|r| r.from == first) => {
                        ImportKind::Internal
                    }
                    _ => ImportKind::External,
                }
            }
        }
    }

    fn resolve(&self, importer: &Path, import: &RawImport, ctx: &ResolveCtx) -> Resolution {
        if import.style == ImportStyle::ModDecl {
            let Some(base) = child_module_dir(importer) else {
                return Resolution::none();
            };
            return Resolution::to(probe::probe(ctx.files, &base, &import.raw, &["rs"], &["mod"]));
        }

        let segments: Vec<&str> = import.raw.split("::").collect();
        let Some((&first, rest)) = segments.split_first() else {
            return Resolution::none();
        };

        match first {
            "crate" => {
                let Some(root) = own_root(importer, ctx) else {
                    return Resolution::none();
                };
                resolve_under(&root, rest, ctx)
            }
            "self" => {
                let Some(base) = child_module_dir(importer) else {
                    return Resolution::none();
                };
                // `use self::X` with X an item of this module points back at
                // the importer; the assembler drops the self-edge anyway.
                Resolution::to(probe_segments(&base, rest, ctx))
            }
            "super" => {
                let supers = segments.iter().take_while(|s| **s == "super").count();
                let rest = &segments[supers..];
                let Some(base) = super_module_dir(importer, supers) else {
                    return Resolution::none();
                };
                let hits = probe_segments(&base, rest, ctx);
                if !hits.is_empty() {
                    return Resolution::to(hits);
                }
                // Item lives in the parent module's own file.
                Resolution::to(module_file_of(&base, ctx))
            }
            _ => {
                let Some(manifest) = importer
                    .parent()
                    .and_then(|dir| ctx.manifests.cargo_package_for(dir))
                else {
                    return Resolution::none();
                };
                let Some(root) = manifest.rust_root_for(first, ctx.files) else {
                    return Resolution::none();
                };
                resolve_under(&root, rest, ctx)
            }
        }
    }

    fn is_test_file(&self, path: &Path) -> bool {
        path.components().any(|c| c.as_os_str() == "tests")
            || path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.ends_with("_test") || s.ends_with("_tests"))
                .unwrap_or(false)
    }
}

/// Resolve `rest` against a crate root file: probe under the root's
/// directory, and fall back to the root itself for items declared there
/// (`use crate::CONST`, `use dep_name::Thing`).
fn resolve_under(root: &Path, rest: &[&str], ctx: &ResolveCtx) -> Resolution {
    let Some(base) = root.parent() else {
        return Resolution::none();
    };
    let hits = probe_segments(base, rest, ctx);
    if !hits.is_empty() {
        return Resolution::to(hits);
    }
    Resolution::to(vec![root.to_path_buf()])
}

/// Probe progressively shorter prefixes of `rest` under `base`. The longest
/// prefix that lands on a file wins; trailing segments are items inside it.
fn probe_segments(base: &Path, rest: &[&str], ctx: &ResolveCtx) -> Vec<PathBuf> {
    for k in (1..=rest.len()).rev() {
        let joined = rest[..k].join("/");
        let hits = probe::probe(ctx.files, base, &joined, &["rs"], &["mod"]);
        if !hits.is_empty() {
            return hits;
        }
    }
    Vec::new()
}

/// The directory holding child modules of the module defined by `file`:
/// `src/a/mod.rs` owns `src/a/`, `src/a/b.rs` owns `src/a/b/`, and the crate
/// root files own their directory.
fn child_module_dir(file: &Path) -> Option<PathBuf> {
    let dir = file.parent()?;
    let name = file.file_name()?.to_str()?;
    if matches!(name, "mod.rs" | "lib.rs" | "main.rs") {
        return Some(dir.to_path_buf());
    }
    Some(dir.join(file.file_stem()?))
}

/// The directory holding children of the importer's `super` module, with
/// extra `super::` segments climbing one level each.
fn super_module_dir(file: &Path, supers: usize) -> Option<PathBuf> {
    let dir = file.parent()?;
    let name = file.file_name()?.to_str()?;
    let mut base = if name == "mod.rs" {
        dir.parent()?.to_path_buf()
    } else {
        dir.to_path_buf()
    };
    for _ in 1..supers {
        base = base.parent()?.to_path_buf();
    }
    Some(base)
}

/// The file defining the module whose children live in `dir`.
fn module_file_of(dir: &Path, ctx: &ResolveCtx) -> Vec<PathBuf> {
    let mut candidates = vec![dir.join("mod.rs"), dir.join("lib.rs"), dir.join("main.rs")];
    if let (Some(parent), Some(name)) = (dir.parent(), dir.file_name()) {
        let mut sibling = name.to_os_string();
        sibling.push(".rs");
        candidates.push(parent.join(sibling));
    }
    let mut hits: Vec<PathBuf> = candidates
        .into_iter()
        .filter(|c| ctx.files.contains(c))
        .collect();
    hits.sort();
    hits
}

fn own_root(importer: &Path, ctx: &ResolveCtx) -> Option<PathBuf> {
    importer
        .parent()
        .and_then(|dir| ctx.manifests.cargo_package_for(dir))
        .and_then(|m| m.own_rust_root(ctx.files))
}

fn walk(node: Node, source: &[u8], out: &mut Extraction) {
    match node.kind() {
        "use_declaration" => {
            if let Some(argument) = node.child_by_field_name("argument") {
                flatten_use(argument, source, String::new(), &mut out.imports);
            }
            return;
        }
        "mod_item" => {
            if node.child_by_field_name("body").is_none() {
                if let Some(name) = node.child_by_field_name("name") {
                    out.imports.push(RawImport {
                        raw: node_text(name, source).to_owned(),
                        style: ImportStyle::ModDecl,
                        ..RawImport::default()
                    });
                }
                return;
            }
            // Inline bodies can hold further use declarations.
        }
        _ => {}
    }
    // use statements nest inside functions and impls too
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, out);
    }
}

// ---------------------------------------------------------------------------
// use-tree flattening
// ---------------------------------------------------------------------------

/// Expand one use-tree node into full `::`-joined paths, distributing a
/// brace list over its prefix and folding `as` renames away.
fn flatten_use(node: Node, source: &[u8], prefix: String, out: &mut Vec<RawImport>) {
    match node.kind() {
        "use_as_clause" => {
            if let Some(path) = node.child_by_field_name("path") {
                flatten_use(path, source, prefix, out);
            }
        }
        "scoped_use_list" => {
            let joined = match node.child_by_field_name("path") {
                Some(path) => join(&prefix, node_text(path, source)),
                None => prefix,
            };
            if let Some(list) = node.child_by_field_name("list") {
                flatten_use(list, source, joined, out);
            }
        }
        "use_list" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                flatten_use(child, source, prefix.clone(), out);
            }
        }
        "use_wildcard" => {
            let raw = node_text(node, source);
            let raw = raw.strip_suffix("::*").or_else(|| raw.strip_suffix('*')).unwrap_or(raw);
            let joined = join(&prefix, raw);
            if !joined.is_empty() {
                out.push(RawImport {
                    raw: joined,
                    is_wildcard: true,
                    ..RawImport::default()
                });
            }
        }
        // scoped_identifier, identifier, crate, super, self
        _ => {
            let joined = join(&prefix, node_text(node, source));
            if !joined.is_empty() {
                out.push(RawImport {
                    raw: joined,
                    ..RawImport::default()
                });
            }
        }
    }
}

fn join(prefix: &str, rest: &str) -> String {
    if prefix.is_empty() {
        rest.to_owned()
    } else if rest.is_empty() {
        prefix.to_owned()
    } else {
        format!("{prefix}::{rest}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CtxFixture;

    fn extract(source: &str) -> Extraction {
        RustLang.extract(Path::new("/r/src/lib.rs"), source.as_bytes())
    }

    fn raws(e: &Extraction) -> Vec<&str> {
        e.imports.iter().map(|i| i.raw.as_str()).collect()
    }

    #[test]
    fn flattens_use_lists_and_renames() {
        let e = extract(
            "use crate::graph::{Node, Edge as E};\nuse std::collections::HashMap;\n",
        );
        assert_eq!(
            raws(&e),
            vec!["crate::graph::Node", "crate::graph::Edge", "std::collections::HashMap"]
        );
    }

    #[test]
    fn flattens_nested_lists_and_globs() {
        let e = extract("pub use crate::{io::Reader, prelude::*};\n");
        assert_eq!(raws(&e), vec!["crate::io::Reader", "crate::prelude"]);
        assert!(e.imports[1].is_wildcard);
    }

    #[test]
    fn mod_declarations_without_bodies() {
        let e = extract("mod parser;\npub mod graph;\nmod inline { use std::io; }\n");
        let mods: Vec<&str> = e
            .imports
            .iter()
            .filter(|i| i.style == ImportStyle::ModDecl)
            .map(|i| i.raw.as_str())
            .collect();
        assert_eq!(mods, vec!["parser", "graph"]);
        // The inline body's use statement still surfaces.
        assert!(raws(&e).contains(&"std::io"));
    }

    fn crate_fixture() -> CtxFixture {
        let mut fx = CtxFixture::new();
        fx.add_manifest("/r/Cargo.toml", "[package]\nname = \"demo\"\n");
        fx.add_file("/r/src/lib.rs", "");
        fx.add_file("/r/src/graph.rs", "");
        fx.add_file("/r/src/io/mod.rs", "");
        fx.add_file("/r/src/io/reader.rs", "");
        fx
    }

    #[test]
    fn classifies_by_first_segment() {
        let fx = crate_fixture();
        let ctx = fx.ctx();
        let importer = Path::new("/r/src/lib.rs");

        let case = |raw: &str| RustLang.classify(importer, &RawImport::plain(raw), &ctx);
        assert_eq!(case("std::io::Read"), ImportKind::Stdlib);
        assert_eq!(case("crate::graph::Node"), ImportKind::Internal);
        assert_eq!(case("demo::graph::Node"), ImportKind::Internal);
        assert_eq!(case("serde::Serialize"), ImportKind::External);
    }

    #[test]
    fn resolves_crate_paths_by_prefix_probing() {
        let fx = crate_fixture();
        let ctx = fx.ctx();
        let importer = Path::new("/r/src/graph.rs");

        let resolve = |raw: &str| {
            RustLang
                .resolve(importer, &RawImport::plain(raw), &ctx)
                .targets
        };
        // Item name truncates away; module file remains.
        assert_eq!(
            resolve("crate::io::reader::Reader"),
            vec![PathBuf::from("/r/src/io/reader.rs")]
        );
        // `io` itself is a mod.rs directory module.
        assert_eq!(resolve("crate::io"), vec![PathBuf::from("/r/src/io/mod.rs")]);
        // Item declared at the crate root falls back to the root file.
        assert_eq!(resolve("crate::VERSION"), vec![PathBuf::from("/r/src/lib.rs")]);
    }

    #[test]
    fn resolves_mod_declarations_for_both_layouts() {
        let fx = crate_fixture();
        let ctx = fx.ctx();

        let decl = |name: &str| RawImport {
            raw: name.into(),
            style: ImportStyle::ModDecl,
            ..RawImport::default()
        };
        let from_root = RustLang.resolve(Path::new("/r/src/lib.rs"), &decl("graph"), &ctx);
        assert_eq!(from_root.targets, vec![PathBuf::from("/r/src/graph.rs")]);

        let from_mod = RustLang.resolve(Path::new("/r/src/io/mod.rs"), &decl("reader"), &ctx);
        assert_eq!(from_mod.targets, vec![PathBuf::from("/r/src/io/reader.rs")]);
    }

    #[test]
    fn resolves_super_and_self_paths() {
        let fx = crate_fixture();
        let ctx = fx.ctx();

        let reader = Path::new("/r/src/io/reader.rs");
        let r = RustLang.resolve(reader, &RawImport::plain("super::Framed"), &ctx);
        assert_eq!(
            r.targets,
            vec![PathBuf::from("/r/src/io/mod.rs")],
            "an item of the parent module resolves to the parent's file"
        );

        let lib = Path::new("/r/src/lib.rs");
        let r = RustLang.resolve(lib, &RawImport::plain("self::graph::Node"), &ctx);
        assert_eq!(r.targets, vec![PathBuf::from("/r/src/graph.rs")]);
    }

    #[test]
    fn resolves_path_dependency_roots() {
        let mut fx = CtxFixture::new();
        fx.add_manifest(
            "/ws/app/Cargo.toml",
            "[package]\nname = \"app\"\n\n[dependencies]\nutil-kit = { path = \"../util-kit\" }\n",
        );
        fx.add_manifest("/ws/util-kit/Cargo.toml", "[package]\nname = \"util-kit\"\n");
        fx.add_file("/ws/app/src/main.rs", "");
        fx.add_file("/ws/util-kit/src/lib.rs", "");
        fx.add_file("/ws/util-kit/src/tables.rs", "");
        let ctx = fx.ctx();

        let importer = Path::new("/ws/app/src/main.rs");
        let import = RawImport::plain("util_kit::tables::Lookup");
        assert_eq!(
            RustLang.classify(importer, &import, &ctx),
            ImportKind::Internal
        );
        let r = RustLang.resolve(importer, &import, &ctx);
        assert_eq!(r.targets, vec![PathBuf::from("/ws/util-kit/src/tables.rs")]);
    }

    #[test]
    fn no_manifest_means_no_internal_resolution() {
        let mut fx = CtxFixture::new();
        fx.add_file("/r/src/lib.rs", "");
        fx.add_file("/r/src/graph.rs", "");
        let ctx = fx.ctx();

        let importer = Path::new("/r/src/lib.rs");
        let import = RawImport::plain("demo::graph::Node");
        assert_eq!(
            RustLang.classify(importer, &import, &ctx),
            ImportKind::External
        );
        let r = RustLang.resolve(importer, &RawImport::plain("crate::graph::Node"), &ctx);
        assert!(r.targets.is_empty());
    }
}
