use std::path::Path;

use crate::config::DepscopeConfig;
use crate::fileset::{normalize, FileSet};

/// Walk a project directory and collect the supplied file set.
///
/// Respects `.gitignore` rules, always excludes `node_modules`, and applies
/// any additional exclusions from `config.exclude`. Every surviving file
/// joins the set, not just source files: assets need to be members so embed
/// directives can resolve to them.
///
/// When `verbose` is true, each discovered file path is printed to stderr.
pub fn walk_project(root: &Path, config: &DepscopeConfig, verbose: bool) -> FileSet {
    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(true)
        // Read .gitignore files even when the directory is not inside a git
        // repository, so exclusions work for exported trees and fixtures.
        .require_git(false)
        .build();

    let mut files = FileSet::default();
    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                eprintln!("warning: {err}");
                continue;
            }
        };

        let path = entry.path();
        if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
            continue;
        }

        // No component of the path may be node_modules, gitignored or not.
        if path_contains_node_modules(path) {
            continue;
        }
        if is_excluded_by_config(path, root, config) {
            continue;
        }

        if verbose {
            eprintln!("[walk] {}", path.display());
        }
        files.insert(normalize(path));
    }
    files
}

/// Returns true if any component of `path` is named `node_modules`.
fn path_contains_node_modules(path: &Path) -> bool {
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| s == "node_modules")
            .unwrap_or(false)
    })
}

/// Returns true if `path` matches any exclusion pattern from config, either
/// as a whole or on a single component.
///
/// Patterns in depscope.toml are written relative to the project root, so the
/// walked path is stripped down to its root-relative form before matching.
fn is_excluded_by_config(path: &Path, root: &Path, config: &DepscopeConfig) -> bool {
    let patterns = match &config.exclude {
        Some(p) => p,
        None => return false,
    };

    let relative = path.strip_prefix(root).unwrap_or(path);
    let path_str = relative.to_string_lossy();

    for pattern in patterns {
        if let Ok(matched) = glob::Pattern::new(pattern)
            && matched.matches(&path_str)
        {
            return true;
        }
        for component in relative.components() {
            if let Some(s) = component.as_os_str().to_str()
                && let Ok(matched) = glob::Pattern::new(pattern)
                && matched.matches(s)
            {
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    #[test]
    fn collects_source_files_and_assets() {
        let dir = tmp();
        fs::write(dir.path().join("main.go"), "package main\n").unwrap();
        fs::write(dir.path().join("app.ts"), "export {}").unwrap();
        fs::write(dir.path().join("schema.sql"), "select 1;").unwrap();

        let files = walk_project(dir.path(), &DepscopeConfig::default(), false);

        let names: Vec<String> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert!(names.contains(&"main.go".to_string()));
        assert!(names.contains(&"app.ts".to_string()));
        assert!(
            names.contains(&"schema.sql".to_string()),
            "assets join the set as embed targets"
        );
    }

    #[test]
    fn respects_exclude_patterns() {
        let dir = tmp();
        fs::write(dir.path().join("app.ts"), "export {}").unwrap();
        fs::create_dir_all(dir.path().join("generated")).unwrap();
        fs::write(dir.path().join("generated").join("api.ts"), "export {}").unwrap();

        let config = DepscopeConfig {
            exclude: Some(vec!["generated".to_string()]),
            ..DepscopeConfig::default()
        };
        let files = walk_project(dir.path(), &config, false);

        assert!(files.iter().any(|f| f.ends_with("app.ts")));
        assert!(
            !files.iter().any(|f| f.to_string_lossy().contains("generated")),
            "excluded directory must not contribute files"
        );
    }

    #[test]
    fn exclude_patterns_match_relative_globs() {
        let dir = tmp();
        fs::write(dir.path().join("app.ts"), "export {}").unwrap();
        fs::create_dir_all(dir.path().join("vendored").join("deep")).unwrap();
        fs::write(
            dir.path().join("vendored").join("deep").join("blob.ts"),
            "export {}",
        )
        .unwrap();

        let config = DepscopeConfig {
            exclude: Some(vec!["vendored/**".to_string()]),
            ..DepscopeConfig::default()
        };
        let files = walk_project(dir.path(), &config, false);

        assert!(files.iter().any(|f| f.ends_with("app.ts")));
        assert!(
            !files.iter().any(|f| f.to_string_lossy().contains("vendored")),
            "glob patterns apply to the root-relative path"
        );
    }

    #[test]
    fn excludes_node_modules() {
        let dir = tmp();
        let nm = dir.path().join("node_modules").join("pkg");
        fs::create_dir_all(&nm).unwrap();
        fs::write(nm.join("index.js"), "module.exports = {}").unwrap();
        fs::write(dir.path().join("app.ts"), "export {}").unwrap();

        let files = walk_project(dir.path(), &DepscopeConfig::default(), false);

        assert!(
            !files
                .iter()
                .any(|f| f.to_string_lossy().contains("node_modules")),
            "node_modules must never contribute files"
        );
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn respects_gitignore_without_a_git_repo() {
        let dir = tmp();
        fs::write(dir.path().join(".gitignore"), "dist/\n").unwrap();
        fs::create_dir_all(dir.path().join("dist")).unwrap();
        fs::write(dir.path().join("dist").join("bundle.js"), "x").unwrap();
        fs::write(dir.path().join("app.ts"), "export {}").unwrap();

        let files = walk_project(dir.path(), &DepscopeConfig::default(), false);

        assert!(
            !files.iter().any(|f| f.to_string_lossy().contains("dist")),
            "gitignored directories are skipped"
        );
    }
}
