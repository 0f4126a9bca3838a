use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::fileset::FileSet;

// ---------------------------------------------------------------------------
// Export index
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ScopeEntry {
    /// Symbol name → files in this scope that declare it.
    symbols: HashMap<String, BTreeSet<PathBuf>>,
    /// Every file contributing to this scope, declared symbols or not.
    files: BTreeSet<PathBuf>,
}

/// Scope key → symbol → declaring files, built once before resolution starts.
///
/// A scope key is whatever binds files into one namespace for the language:
/// the containing directory for Go packages, the declared `package a.b;`
/// string for Java. Imports that name a scope rather than a file are resolved
/// against this index, first narrowed to the files whose symbols the importer
/// actually references, falling back to the whole scope only when narrowing
/// finds nothing.
#[derive(Debug, Default)]
pub struct ExportIndex {
    scopes: HashMap<String, ScopeEntry>,
}

impl ExportIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `file` as part of `scope`, declaring `symbols`.
    ///
    /// A file with no extracted symbols still registers as a scope member:
    /// it remains reachable through the full-scope fallback.
    pub fn insert(&mut self, scope: &str, file: &Path, symbols: &[String]) {
        let entry = self.scopes.entry(scope.to_owned()).or_default();
        entry.files.insert(file.to_path_buf());
        for symbol in symbols {
            entry
                .symbols
                .entry(symbol.clone())
                .or_default()
                .insert(file.to_path_buf());
        }
    }

    /// All files registered under `scope`, sorted. Empty if unknown.
    pub fn files_in_scope(&self, scope: &str) -> Vec<PathBuf> {
        self.scopes
            .get(scope)
            .map(|entry| entry.files.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Files in `scope` declaring exactly `symbol`, sorted.
    pub fn declaring_files(&self, scope: &str, symbol: &str) -> Vec<PathBuf> {
        self.scopes
            .get(scope)
            .and_then(|entry| entry.symbols.get(symbol))
            .map(|files| files.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Files in `scope` declaring any of `referenced`, sorted and deduplicated.
    ///
    /// This is the precision pass for scope imports: of all files in the
    /// imported package, keep the ones whose names the importer actually
    /// uses. An empty result is meaningful; the caller decides whether the
    /// full-scope fallback applies.
    pub fn narrow(&self, scope: &str, referenced: &HashSet<&str>) -> Vec<PathBuf> {
        let Some(entry) = self.scopes.get(scope) else {
            return Vec::new();
        };
        let mut out = BTreeSet::new();
        for (symbol, files) in &entry.symbols {
            if referenced.contains(symbol.as_str()) {
                out.extend(files.iter().cloned());
            }
        }
        out.into_iter().collect()
    }

    /// Number of declared scope keys, surfaced in the build stats.
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }
}

// ---------------------------------------------------------------------------
// Project scope table
// ---------------------------------------------------------------------------

/// Names that mark an absolute import as project-internal, harvested from the
/// supplied set itself.
///
/// Classification must not touch the filesystem, so "is `acme.utils` ours?"
/// is answered from what the set contains: Python roots are the module stems
/// and the directory components at or below the set's common root seen on
/// supplied Python paths; Java packages are the `package` declarations the
/// extractor saw. Over-approximation is fine: a specifier wrongly classified
/// internal resolves to nothing and produces no edge.
#[derive(Debug, Default)]
pub struct ScopeTable {
    python_roots: HashSet<String>,
    java_packages: BTreeSet<String>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Harvest Python root names from a supplied `.py`/`.pyi` path.
    ///
    /// Only the module stem and directory components at or below `root`
    /// count. Directories above the set's root are checkout location, not
    /// project structure: a repository cloned under `~/json/` must not turn
    /// `import json` into an internal import.
    pub fn add_python_file(&mut self, path: &Path, root: &Path) {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            self.python_roots.insert(stem.to_owned());
        }
        // The root's own name still counts: a set scoped to one package
        // directory keeps classifying imports through that package's name.
        if let Some(name) = root.file_name().and_then(|n| n.to_str()) {
            self.python_roots.insert(name.to_owned());
        }
        let below = path.strip_prefix(root).unwrap_or(path);
        if let Some(parent) = below.parent() {
            for component in parent.components() {
                if let std::path::Component::Normal(name) = component
                    && let Some(name) = name.to_str()
                {
                    self.python_roots.insert(name.to_owned());
                }
            }
        }
    }

    pub fn add_java_package(&mut self, package: &str) {
        if !package.is_empty() {
            self.java_packages.insert(package.to_owned());
        }
    }

    /// Is `name` a plausible first segment of a project-internal Python
    /// import?
    pub fn is_python_root(&self, name: &str) -> bool {
        self.python_roots.contains(name)
    }

    /// Does `package` relate to any declared Java package: exactly, as a
    /// parent (`a.b` vs declared `a.b.c`), or as a child (`a.b.c.d` vs
    /// declared `a.b.c`)?
    pub fn is_project_java_package(&self, package: &str) -> bool {
        if self.java_packages.contains(package) {
            return true;
        }
        self.java_packages.iter().any(|declared| {
            declared
                .strip_prefix(package)
                .map(|rest| rest.starts_with('.'))
                .unwrap_or(false)
                || package
                    .strip_prefix(declared.as_str())
                    .map(|rest| rest.starts_with('.'))
                    .unwrap_or(false)
        })
    }
}

/// Build the scope table from the supplied set in one pass.
pub fn build_scope_table(
    files: &FileSet,
    scopes_by_file: &HashMap<PathBuf, String>,
) -> ScopeTable {
    let root = files.common_root().unwrap_or_default();
    let mut table = ScopeTable::new();
    for path in files {
        match path.extension().and_then(|e| e.to_str()) {
            Some("py") | Some("pyi") => table.add_python_file(path, &root),
            Some("java") => {
                if let Some(package) = scopes_by_file.get(path) {
                    table.add_java_package(package);
                }
            }
            _ => {}
        }
    }
    table
}
