use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tree_sitter::Node;

use crate::engine::ResolveCtx;
use crate::parse::{self, Grammar};

use super::{node_text, Extraction, ImportKind, Language, RawImport, Resolution};

/// Java. Files declare the package they belong to, imports name classes or
/// whole packages, and same-package types need no import at all, so the
/// scope key is the declared package string and everything resolves through
/// the export index.
pub struct Java;

const EXTENSIONS: &[&str] = &["java"];

const JDK_PREFIXES: &[&str] = &["java.", "javax.", "jdk.", "sun.", "com.sun."];

impl Language for Java {
    fn name(&self) -> &'static str {
        "java"
    }

    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn extract(&self, _path: &Path, source: &[u8]) -> Extraction {
        let Some(tree) = parse::parse(Grammar::Java, source) else {
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
                "package_declaration" => {
                    let mut inner = child.walk();
                    for c in child.children(&mut inner) {
                        if matches!(c.kind(), "scoped_identifier" | "identifier") {
                            out.scope = Some(node_text(c, source).to_owned());
                        }
                    }
                }
                "import_declaration" => {
                    if let Some(import) = parse_import(child, source) {
                        out.imports.push(import);
                    }
                }
                _ => {}
            }
        }

        collect_declarations(root, source, &mut out.declared);

        let mut referenced = HashSet::new();
        collect_references(root, source, &mut referenced);
        out.referenced = referenced.into_iter().collect();
        out.referenced.sort();

        out
    }

    fn classify(&self, _importer: &Path, import: &RawImport, ctx: &ResolveCtx) -> ImportKind {
        if JDK_PREFIXES.iter().any(|p| import.raw.starts_with(p)) {
            return ImportKind::Stdlib;
        }
        let package = if import.is_wildcard {
            import.raw.as_str()
        } else {
            package_of(&import.raw)
        };
        if !package.is_empty() && ctx.scopes.is_project_java_package(package) {
            return ImportKind::Internal;
        }
        ImportKind::External
    }

    fn resolve(&self, importer: &Path, import: &RawImport, ctx: &ResolveCtx) -> Resolution {
        if import.is_wildcard {
            return resolve_wildcard(importer, &import.raw, ctx);
        }

        let package = package_of(&import.raw);
        let Some(class) = import.raw.rsplit('.').next() else {
            return Resolution::none();
        };
        if package.is_empty() {
            return Resolution::none();
        }

        let mut targets = ctx.index.declaring_files(package, class);
        targets.retain(|t| t != importer);
        if !targets.is_empty() {
            return Resolution::to(targets);
        }
        // The class may be supplied but its declaration missed (or it lives
        // in a file the extractor could not parse); the scope fallback keeps
        // the package reachable.
        if !ctx.options.package_fallback {
            return Resolution::none();
        }
        let mut all = ctx.index.files_in_scope(package);
        all.retain(|t| t != importer);
        Resolution {
            used_fallback: !all.is_empty(),
            targets: all,
        }
    }

    fn scope_key(&self, _path: &Path, extraction: &Extraction) -> Option<String> {
        extraction.scope.clone()
    }

    /// Same-package types are visible with no import. Narrowing only, and
    /// names already satisfied by an explicit import do not count.
    fn same_scope_links(&self, importer: &Path, ctx: &ResolveCtx) -> Vec<PathBuf> {
        let Some(extraction) = ctx.extractions.get(importer) else {
            return Vec::new();
        };
        let Some(package) = extraction.scope.as_deref() else {
            return Vec::new();
        };
        let refs = unsatisfied_references(extraction);
        let mut targets = ctx.index.narrow(package, &refs);
        targets.retain(|t| t != importer);
        targets
    }

    fn is_test_file(&self, path: &Path) -> bool {
        let comps: Vec<&str> = path
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect();
        if comps.windows(2).any(|w| w == ["src", "test"]) {
            return true;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        name.ends_with("Test.java") || name.ends_with("Tests.java") || name.ends_with("IT.java")
    }
}

/// `a.b.*` imports a package surface. Of the package's files, link the ones
/// declaring types this file references, minus names an explicit import
/// already accounts for, so the wildcard does not over-claim.
fn resolve_wildcard(importer: &Path, package: &str, ctx: &ResolveCtx) -> Resolution {
    let Some(extraction) = ctx.extractions.get(importer) else {
        return Resolution::none();
    };
    let refs = unsatisfied_references(extraction);
    let mut narrowed = ctx.index.narrow(package, &refs);
    narrowed.retain(|t| t != importer);
    if !narrowed.is_empty() {
        return Resolution::to(narrowed);
    }

    if !ctx.options.package_fallback {
        return Resolution::none();
    }
    let mut all = ctx.index.files_in_scope(package);
    all.retain(|t| t != importer);
    Resolution {
        used_fallback: !all.is_empty(),
        targets: all,
    }
}

/// Referenced type names that neither this file's own declarations nor its
/// explicit single-class imports account for.
fn unsatisfied_references(extraction: &Extraction) -> HashSet<&str> {
    let mut satisfied: HashSet<&str> = extraction.declared.iter().map(String::as_str).collect();
    for import in &extraction.imports {
        if !import.is_wildcard
            && let Some(class) = import.raw.rsplit('.').next()
        {
            satisfied.insert(class);
        }
    }
    extraction
        .referenced
        .iter()
        .map(String::as_str)
        .filter(|r| !satisfied.contains(r))
        .collect()
}

fn package_of(qualified: &str) -> &str {
    qualified.rsplit_once('.').map(|(p, _)| p).unwrap_or("")
}

/// One `import [static] a.b.C[.*];` declaration.
///
/// Static imports target a member of a class; the dependency is the class,
/// so the member (or the `*`) is folded away and the import becomes a plain
/// single-class one.
fn parse_import(decl: Node, source: &[u8]) -> Option<RawImport> {
    let mut path: Option<&str> = None;
    let mut has_asterisk = false;
    let mut is_static = false;

    let mut cursor = decl.walk();
    for child in decl.children(&mut cursor) {
        match child.kind() {
            "scoped_identifier" | "identifier" => path = Some(node_text(child, source)),
            "asterisk" => has_asterisk = true,
            "static" => is_static = true,
            _ => {}
        }
    }

    let path = path?;
    let (raw, is_wildcard) = match (is_static, has_asterisk) {
        (false, wildcard) => (path.to_owned(), wildcard),
        // `import static a.b.C.max;` → class a.b.C
        (true, false) => (package_of(path).to_owned(), false),
        // `import static a.b.C.*;` → class a.b.C
        (true, true) => (path.to_owned(), false),
    };
    if raw.is_empty() {
        return None;
    }
    Some(RawImport {
        raw,
        is_wildcard,
        ..RawImport::default()
    })
}

fn collect_declarations(node: Node, source: &[u8], out: &mut Vec<String>) {
    if matches!(
        node.kind(),
        "class_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "record_declaration"
            | "annotation_type_declaration"
    ) && let Some(name) = node.child_by_field_name("name")
    {
        out.push(node_text(name, source).to_owned());
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_declarations(child, source, out);
    }
}

/// Type usages plus capitalized bare identifiers (static calls like
/// `Strings.join(...)` put the class behind a plain identifier).
fn collect_references(node: Node, source: &[u8], out: &mut HashSet<String>) {
    match node.kind() {
        "type_identifier" => {
            out.insert(node_text(node, source).to_owned());
        }
        "identifier" => {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CtxFixture;

    fn extract(source: &str) -> Extraction {
        Java.extract(Path::new("A.java"), source.as_bytes())
    }

    #[test]
    fn extracts_package_imports_and_declarations() {
        let e = extract(
            r#"package com.acme.app;

import com.acme.util.Strings;
import com.acme.models.*;
import static com.acme.util.Numbers.max;
import static com.acme.util.Asserts.*;
import java.util.List;

public class App {
    interface Hook {}
    record Event(String name) {}
}
"#,
        );
        assert_eq!(e.scope.as_deref(), Some("com.acme.app"));

        let raws: Vec<_> = e.imports.iter().map(|i| (i.raw.as_str(), i.is_wildcard)).collect();
        assert_eq!(
            raws,
            vec![
                ("com.acme.util.Strings", false),
                ("com.acme.models", true),
                ("com.acme.util.Numbers", false),
                ("com.acme.util.Asserts", false),
                ("java.util.List", false),
            ]
        );
        for name in ["App", "Hook", "Event"] {
            assert!(e.declared.contains(&name.to_string()), "missing declared {name}");
        }
    }

    #[test]
    fn extracts_type_references() {
        let e = extract(
            r#"package a;

class C {
    Widget w = new Widget();
    void run() { Strings.join(parts); }
}
"#,
        );
        assert!(e.referenced.contains(&"Widget".to_string()));
        assert!(e.referenced.contains(&"Strings".to_string()));
        assert!(!e.referenced.contains(&"parts".to_string()));
    }

    #[test]
    fn classifies_jdk_project_and_external() {
        let mut fx = CtxFixture::new();
        fx.add_file(
            "/r/src/main/java/com/acme/util/Strings.java",
            "package com.acme.util;\npublic class Strings {}\n",
        );
        let ctx = fx.ctx();
        let importer = Path::new("/r/src/main/java/com/acme/app/App.java");

        let cases = [
            ("java.util.List", false, ImportKind::Stdlib),
            ("javax.sql.DataSource", false, ImportKind::Stdlib),
            ("com.acme.util.Strings", false, ImportKind::Internal),
            ("com.acme.util", true, ImportKind::Internal),
            ("com.acme", true, ImportKind::Internal),
            ("org.junit.Test", false, ImportKind::External),
        ];
        for (raw, wildcard, want) in cases {
            let import = RawImport {
                raw: raw.into(),
                is_wildcard: wildcard,
                ..RawImport::default()
            };
            assert_eq!(
                Java.classify(importer, &import, &ctx),
                want,
                "classification of {:?}",
                raw
            );
        }
    }

    #[test]
    fn specific_import_resolves_to_declaring_file() {
        let mut fx = CtxFixture::new();
        fx.add_file(
            "/r/com/acme/util/Strings.java",
            "package com.acme.util;\npublic class Strings {}\n",
        );
        fx.add_file(
            "/r/com/acme/util/Numbers.java",
            "package com.acme.util;\npublic class Numbers {}\n",
        );
        fx.add_file(
            "/r/com/acme/app/App.java",
            "package com.acme.app;\nimport com.acme.util.Strings;\nclass App {}\n",
        );
        let ctx = fx.ctx();

        let import = RawImport::plain("com.acme.util.Strings");
        let r = Java.resolve(Path::new("/r/com/acme/app/App.java"), &import, &ctx);
        assert_eq!(r.targets, vec![PathBuf::from("/r/com/acme/util/Strings.java")]);
        assert!(!r.used_fallback);
    }

    #[test]
    fn wildcard_links_only_referenced_declarations() {
        let mut fx = CtxFixture::new();
        fx.add_file(
            "/r/com/acme/models/Widget.java",
            "package com.acme.models;\npublic class Widget {}\n",
        );
        fx.add_file(
            "/r/com/acme/models/Gadget.java",
            "package com.acme.models;\npublic class Gadget {}\n",
        );
        fx.add_file(
            "/r/com/acme/app/App.java",
            r#"package com.acme.app;
import com.acme.models.*;
class App { Widget w; }
"#,
        );
        let ctx = fx.ctx();

        let import = RawImport {
            raw: "com.acme.models".into(),
            is_wildcard: true,
            ..RawImport::default()
        };
        let r = Java.resolve(Path::new("/r/com/acme/app/App.java"), &import, &ctx);
        assert_eq!(
            r.targets,
            vec![PathBuf::from("/r/com/acme/models/Widget.java")],
            "Gadget is never referenced"
        );
    }

    #[test]
    fn wildcard_skips_names_covered_by_specific_imports() {
        let mut fx = CtxFixture::new();
        fx.add_file(
            "/r/com/acme/models/Widget.java",
            "package com.acme.models;\npublic class Widget {}\n",
        );
        fx.add_file(
            "/r/com/acme/other/Widget.java",
            "package com.acme.other;\npublic class Widget {}\n",
        );
        fx.add_file(
            "/r/com/acme/app/App.java",
            r#"package com.acme.app;
import com.acme.other.Widget;
import com.acme.models.*;
class App { Widget w; }
"#,
        );
        fx.options.package_fallback = false;
        let ctx = fx.ctx();

        let wildcard = RawImport {
            raw: "com.acme.models".into(),
            is_wildcard: true,
            ..RawImport::default()
        };
        let r = Java.resolve(Path::new("/r/com/acme/app/App.java"), &wildcard, &ctx);
        assert!(
            r.targets.is_empty(),
            "Widget is satisfied by the explicit import; the wildcard must not claim it"
        );
    }

    #[test]
    fn unresolved_specific_import_falls_back_to_package() {
        let mut fx = CtxFixture::new();
        fx.add_file(
            "/r/com/acme/util/Numbers.java",
            "package com.acme.util;\npublic class Numbers {}\n",
        );
        fx.add_file(
            "/r/com/acme/app/App.java",
            "package com.acme.app;\nimport com.acme.util.Missing;\nclass App {}\n",
        );
        let ctx = fx.ctx();

        let import = RawImport::plain("com.acme.util.Missing");
        let r = Java.resolve(Path::new("/r/com/acme/app/App.java"), &import, &ctx);
        assert_eq!(r.targets, vec![PathBuf::from("/r/com/acme/util/Numbers.java")]);
        assert!(r.used_fallback);
    }

    #[test]
    fn same_package_references_link_without_imports() {
        let mut fx = CtxFixture::new();
        fx.add_file(
            "/r/com/acme/app/App.java",
            "package com.acme.app;\nclass App { Service s; }\n",
        );
        fx.add_file(
            "/r/com/acme/app/Service.java",
            "package com.acme.app;\npublic class Service {}\n",
        );
        fx.add_file(
            "/r/com/acme/app/Unused.java",
            "package com.acme.app;\npublic class Unused {}\n",
        );
        let ctx = fx.ctx();

        let links = Java.same_scope_links(Path::new("/r/com/acme/app/App.java"), &ctx);
        assert_eq!(links, vec![PathBuf::from("/r/com/acme/app/Service.java")]);
    }

    #[test]
    fn test_file_heuristic() {
        assert!(Java.is_test_file(Path::new("/r/src/test/java/com/acme/AppTest.java")));
        assert!(Java.is_test_file(Path::new("/r/com/acme/StringsTest.java")));
        assert!(!Java.is_test_file(Path::new("/r/src/main/java/com/acme/App.java")));
    }
}
