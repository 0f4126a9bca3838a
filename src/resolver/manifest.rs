use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::fileset::{normalize, ContentReader, FileSet};

// ---------------------------------------------------------------------------
// Manifest model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    GoMod,
    CargoToml,
}

/// A local remap declared by a manifest: imports under `from` live in the
/// directory `to` instead of under the manifest root. Go `replace` directives
/// with path targets and Cargo `path = "..."` dependencies both produce one.
#[derive(Debug, Clone)]
pub struct Remap {
    /// Module-path prefix (Go) or dependency crate name (Rust).
    pub from: String,
    /// Absolute, normalized target directory.
    pub to: PathBuf,
}

/// A parsed `go.mod` or `Cargo.toml`, reduced to what resolution needs.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub kind: ManifestKind,
    /// Directory containing the manifest file.
    pub dir: PathBuf,
    /// Go module path, or Cargo package name with hyphens normalized to
    /// underscores (the form that appears in `use` paths).
    pub name: String,
    pub remaps: Vec<Remap>,
    /// Explicit `[lib] path` override from Cargo.toml, absolute. `None` means
    /// the conventional `src/lib.rs` / `src/main.rs`.
    pub lib_path: Option<PathBuf>,
}

impl Manifest {
    /// Map a Go import path to the directory that should hold the package.
    ///
    /// Candidates are the module path itself plus every remap source; the
    /// longest prefix that matches on a segment boundary wins, so a remap of
    /// `example.com/m/pkg/a` shadows one of `example.com/m/pkg` for imports
    /// underneath it. `None` when nothing matches; the import belongs to
    /// some other module.
    pub fn resolve_go_dir(&self, import_path: &str) -> Option<PathBuf> {
        let mut best: Option<(&str, &Path)> = None;

        if prefix_matches(import_path, &self.name) {
            best = Some((self.name.as_str(), self.dir.as_path()));
        }
        for remap in &self.remaps {
            if prefix_matches(import_path, &remap.from)
                && best.map(|(b, _)| remap.from.len() > b.len()).unwrap_or(true)
            {
                best = Some((remap.from.as_str(), remap.to.as_path()));
            }
        }

        let (from, to) = best?;
        let rest = &import_path[from.len()..];
        let rest = rest.strip_prefix('/').unwrap_or(rest);
        Some(if rest.is_empty() {
            to.to_path_buf()
        } else {
            to.join(rest)
        })
    }

    /// The source directory a Rust path with this crate's name roots at, or
    /// the remapped dependency root for a path-dependency name.
    pub fn rust_root_for(&self, crate_name: &str, files: &FileSet) -> Option<PathBuf> {
        if crate_name == self.name {
            return self.own_rust_root(files);
        }
        self.remaps
            .iter()
            .find(|r| r.from == crate_name)
            .and_then(|r| rust_root_in(&r.to, files, None))
    }

    /// This crate's own root source file (`lib.rs` preferred over `main.rs`).
    pub fn own_rust_root(&self, files: &FileSet) -> Option<PathBuf> {
        rust_root_in(&self.dir, files, self.lib_path.as_deref())
    }
}

/// `prefix` matches `path` exactly or on a `/` segment boundary.
fn prefix_matches(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
}

fn rust_root_in(crate_dir: &Path, files: &FileSet, lib_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(lib) = lib_path
        && files.contains(lib)
    {
        return Some(lib.to_path_buf());
    }
    let lib_rs = crate_dir.join("src").join("lib.rs");
    if files.contains(&lib_rs) {
        return Some(lib_rs);
    }
    let main_rs = crate_dir.join("src").join("main.rs");
    if files.contains(&main_rs) {
        return Some(main_rs);
    }
    None
}

// ---------------------------------------------------------------------------
// go.mod parsing
// ---------------------------------------------------------------------------

/// Parse the subset of `go.mod` resolution cares about: the `module` line and
/// `replace` directives whose target is a local path. Module-to-module
/// replaces are version plumbing, not file locations; they are skipped.
///
/// `None` when there is no usable `module` line; the manifest is malformed.
pub fn parse_go_mod(dir: &Path, bytes: &[u8]) -> Option<Manifest> {
    let text = std::str::from_utf8(bytes).ok()?;
    let mut name: Option<String> = None;
    let mut remaps = Vec::new();
    let mut in_replace_block = false;

    for line in text.lines() {
        let line = strip_go_comment(line).trim();
        if line.is_empty() {
            continue;
        }
        if in_replace_block {
            if line == ")" {
                in_replace_block = false;
            } else if let Some(remap) = parse_replace_line(dir, line) {
                remaps.push(remap);
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("module") {
            let rest = rest.trim();
            if !rest.is_empty() {
                name = Some(rest.trim_matches('"').to_owned());
            }
        } else if line == "replace (" || line == "replace(" {
            in_replace_block = true;
        } else if let Some(rest) = line.strip_prefix("replace ") {
            if let Some(remap) = parse_replace_line(dir, rest) {
                remaps.push(remap);
            }
        }
    }

    Some(Manifest {
        kind: ManifestKind::GoMod,
        dir: dir.to_path_buf(),
        name: name?,
        remaps,
        lib_path: None,
    })
}

fn strip_go_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// One `old [version] => new [version]` arrow. Only path targets (`./`,
/// `../`, absolute) become remaps.
fn parse_replace_line(dir: &Path, line: &str) -> Option<Remap> {
    let (lhs, rhs) = line.split_once("=>")?;
    let from = lhs.split_whitespace().next()?.to_owned();
    let target = rhs.split_whitespace().next()?;
    let is_path = target.starts_with("./") || target.starts_with("../") || target.starts_with('/');
    if !is_path {
        return None;
    }
    Some(Remap {
        from,
        to: normalize(&dir.join(target)),
    })
}

// ---------------------------------------------------------------------------
// Cargo.toml parsing
// ---------------------------------------------------------------------------

/// Parse the subset of `Cargo.toml` resolution cares about: the package name
/// (normalized to the underscore form used in `use` paths), `path`
/// dependencies across all three dependency tables, and an explicit `[lib]
/// path`. Virtual workspace manifests (no `[package]`) are malformed for our
/// purposes; no file under them can say `use <name>::...`.
pub fn parse_cargo_toml(dir: &Path, bytes: &[u8]) -> Option<Manifest> {
    let text = std::str::from_utf8(bytes).ok()?;
    let manifest: toml::Value = toml::from_str(text).ok()?;

    let raw_name = manifest.get("package")?.get("name")?.as_str()?;
    let name = raw_name.replace('-', "_");

    let mut remaps = Vec::new();
    for table in ["dependencies", "dev-dependencies", "build-dependencies"] {
        let Some(deps) = manifest.get(table).and_then(|d| d.as_table()) else {
            continue;
        };
        for (dep_name, value) in deps {
            if let Some(path) = value.get("path").and_then(|p| p.as_str()) {
                remaps.push(Remap {
                    from: dep_name.replace('-', "_"),
                    to: normalize(&dir.join(path)),
                });
            }
        }
    }

    let lib_path = manifest
        .get("lib")
        .and_then(|l| l.get("path"))
        .and_then(|p| p.as_str())
        .map(|p| normalize(&dir.join(p)));

    Some(Manifest {
        kind: ManifestKind::CargoToml,
        dir: dir.to_path_buf(),
        name,
        remaps,
        lib_path,
    })
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// What walking up from a directory found.
#[derive(Debug, Clone)]
enum Found {
    /// No manifest here or above.
    Missing,
    /// A manifest file exists but does not parse. The walk stops: files
    /// governed by a broken manifest get no internal resolution rather than
    /// inheriting some ancestor's module root.
    Malformed,
    Parsed(Arc<Manifest>),
}

/// Nearest-manifest index, built once before resolution and immutable after.
///
/// Discovery reads through the [`ContentReader`]: a probe is "read
/// `dir/go.mod`", and a read error means absent. Every directory holding a
/// Go or Rust file from the set gets an entry; intermediate directories are
/// memoized so a deep tree costs one walk per distinct ancestor chain.
#[derive(Debug, Default)]
pub struct ManifestIndex {
    go: HashMap<PathBuf, Found>,
    cargo: HashMap<PathBuf, Found>,
}

impl ManifestIndex {
    pub fn build(files: &FileSet, reader: &dyn ContentReader) -> Self {
        let mut index = Self::default();
        for path in files {
            let Some(dir) = path.parent() else { continue };
            match path.extension().and_then(|e| e.to_str()) {
                Some("go") => {
                    discover(&mut index.go, reader, dir, "go.mod", &parse_go_mod);
                }
                Some("rs") => {
                    discover(&mut index.cargo, reader, dir, "Cargo.toml", &parse_cargo_toml);
                }
                _ => {}
            }
        }
        index
    }

    /// The Go module governing `dir`, if discovery found a healthy one.
    pub fn go_module_for(&self, dir: &Path) -> Option<&Manifest> {
        lookup(&self.go, dir)
    }

    /// The Cargo package governing `dir`, if discovery found a healthy one.
    pub fn cargo_package_for(&self, dir: &Path) -> Option<&Manifest> {
        lookup(&self.cargo, dir)
    }
}

fn lookup<'a>(map: &'a HashMap<PathBuf, Found>, dir: &Path) -> Option<&'a Manifest> {
    // Walk up through memoized entries; directories never probed during
    // build (e.g. a file with no adapter) fall through to their ancestors.
    let mut current = Some(dir);
    while let Some(d) = current {
        match map.get(d) {
            Some(Found::Parsed(m)) => return Some(m),
            Some(Found::Malformed) | Some(Found::Missing) => return None,
            None => current = d.parent(),
        }
    }
    None
}

fn discover(
    map: &mut HashMap<PathBuf, Found>,
    reader: &dyn ContentReader,
    dir: &Path,
    file_name: &str,
    parse: &dyn Fn(&Path, &[u8]) -> Option<Manifest>,
) -> Found {
    if let Some(cached) = map.get(dir) {
        return cached.clone();
    }

    let here = match reader.read(&dir.join(file_name)) {
        Ok(bytes) => match parse(dir, &bytes) {
            Some(manifest) => Some(Found::Parsed(Arc::new(manifest))),
            None => Some(Found::Malformed),
        },
        Err(_) => None,
    };

    let result = match here {
        Some(found) => found,
        None => match dir.parent() {
            Some(parent) => discover(map, reader, parent, file_name, parse),
            None => Found::Missing,
        },
    };

    map.insert(dir.to_path_buf(), result.clone());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileset::MemReader;

    #[test]
    fn go_mod_module_line_and_single_replace() {
        let src = "module example.com/app\n\ngo 1.22\n\nreplace example.com/lib => ../lib\n";
        let m = parse_go_mod(Path::new("/repo/app"), src.as_bytes()).unwrap();
        assert_eq!(m.name, "example.com/app");
        assert_eq!(m.remaps.len(), 1);
        assert_eq!(m.remaps[0].from, "example.com/lib");
        assert_eq!(m.remaps[0].to, PathBuf::from("/repo/lib"));
    }

    #[test]
    fn go_mod_replace_block_with_versions_and_comments() {
        let src = "\
module example.com/app // main module

replace (
    example.com/a v1.2.3 => ./vendor/a
    example.com/b => example.com/b2 v0.9.0
    example.com/c => ./vendor/c // pinned local
)
";
        let m = parse_go_mod(Path::new("/repo"), src.as_bytes()).unwrap();
        let froms: Vec<_> = m.remaps.iter().map(|r| r.from.as_str()).collect();
        assert_eq!(
            froms,
            vec!["example.com/a", "example.com/c"],
            "module-to-module replace must be skipped"
        );
        assert_eq!(m.remaps[0].to, PathBuf::from("/repo/vendor/a"));
    }

    #[test]
    fn go_mod_without_module_line_is_malformed() {
        assert!(parse_go_mod(Path::new("/repo"), b"go 1.22\n").is_none());
    }

    #[test]
    fn longest_remap_prefix_wins() {
        let m = Manifest {
            kind: ManifestKind::GoMod,
            dir: PathBuf::from("/repo"),
            name: "example.com/m".into(),
            remaps: vec![
                Remap {
                    from: "example.com/m/pkg".into(),
                    to: PathBuf::from("/repo/vendor/root"),
                },
                Remap {
                    from: "example.com/m/pkg/a".into(),
                    to: PathBuf::from("/repo/vendor/a"),
                },
            ],
            lib_path: None,
        };

        assert_eq!(
            m.resolve_go_dir("example.com/m/pkg/a/util"),
            Some(PathBuf::from("/repo/vendor/a/util"))
        );
        assert_eq!(
            m.resolve_go_dir("example.com/m/pkg/b"),
            Some(PathBuf::from("/repo/vendor/root/b"))
        );
        assert_eq!(
            m.resolve_go_dir("example.com/m/internal/x"),
            Some(PathBuf::from("/repo/internal/x"))
        );
        assert_eq!(m.resolve_go_dir("example.com/other/x"), None);
    }

    #[test]
    fn prefix_matches_on_segment_boundaries_only() {
        let m = Manifest {
            kind: ManifestKind::GoMod,
            dir: PathBuf::from("/repo"),
            name: "example.com/m".into(),
            remaps: vec![],
            lib_path: None,
        };
        assert_eq!(m.resolve_go_dir("example.com/m2/x"), None);
        assert_eq!(m.resolve_go_dir("example.com/m"), Some(PathBuf::from("/repo")));
    }

    #[test]
    fn cargo_toml_path_dependencies_become_remaps() {
        let src = "\
[package]
name = \"my-app\"
version = \"0.1.0\"

[dependencies]
shared-core = { path = \"../shared-core\" }
serde = \"1\"

[dev-dependencies]
test-util = { path = \"../test-util\" }
";
        let m = parse_cargo_toml(Path::new("/ws/app"), src.as_bytes()).unwrap();
        assert_eq!(m.name, "my_app");
        let froms: Vec<_> = m.remaps.iter().map(|r| r.from.as_str()).collect();
        assert!(froms.contains(&"shared_core"));
        assert!(froms.contains(&"test_util"));
        assert_eq!(m.remaps[0].to, PathBuf::from("/ws/shared-core"));
    }

    #[test]
    fn virtual_workspace_manifest_is_malformed() {
        let src = "[workspace]\nmembers = [\"crates/*\"]\n";
        assert!(parse_cargo_toml(Path::new("/ws"), src.as_bytes()).is_none());
    }

    #[test]
    fn discovery_walks_up_and_memoizes() {
        let mut reader = MemReader::new();
        reader.insert("/repo/go.mod", "module example.com/app\n");

        let files: FileSet = [
            PathBuf::from("/repo/cmd/server/main.go"),
            PathBuf::from("/repo/internal/util/strings.go"),
        ]
        .into_iter()
        .collect();

        let index = ManifestIndex::build(&files, &reader);
        let m = index.go_module_for(Path::new("/repo/cmd/server")).unwrap();
        assert_eq!(m.name, "example.com/app");
        assert!(index.go_module_for(Path::new("/repo/internal/util")).is_some());
    }

    #[test]
    fn malformed_manifest_stops_the_walk() {
        let mut reader = MemReader::new();
        // Healthy ancestor above a broken nested manifest.
        reader.insert("/repo/go.mod", "module example.com/app\n");
        reader.insert("/repo/sub/go.mod", "go 1.22\n");

        let files: FileSet = [PathBuf::from("/repo/sub/pkg/a.go")].into_iter().collect();
        let index = ManifestIndex::build(&files, &reader);

        assert!(
            index.go_module_for(Path::new("/repo/sub/pkg")).is_none(),
            "a broken manifest must not fall through to the ancestor module"
        );
    }

    #[test]
    fn rust_root_prefers_lib_over_main() {
        let files: FileSet = [
            PathBuf::from("/c/src/lib.rs"),
            PathBuf::from("/c/src/main.rs"),
        ]
        .into_iter()
        .collect();
        let m = Manifest {
            kind: ManifestKind::CargoToml,
            dir: PathBuf::from("/c"),
            name: "c".into(),
            remaps: vec![],
            lib_path: None,
        };
        assert_eq!(m.own_rust_root(&files), Some(PathBuf::from("/c/src/lib.rs")));
    }
}
