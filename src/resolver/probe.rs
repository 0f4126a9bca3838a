use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::fileset::{normalize, FileSet};

// ---------------------------------------------------------------------------
// Extension and index-file probing
// ---------------------------------------------------------------------------

/// Resolve a relative specifier against the supplied set by probing
/// extensions and index files.
///
/// The candidate base is the importer's directory joined with the specifier,
/// normalized lexically (`.` and `..` resolved without touching the disk).
/// From there:
///
/// 1. The base itself, if supplied, always matches (`./data.json` with the
///    asset in the set).
/// 2. A base already carrying one of `exts` probes nothing further; the
///    author named the file.
/// 3. Otherwise each extension is appended in order (`./util` → `util.ts`,
///    `util.tsx`, ...), then each index-file convention is tried underneath
///    (`./feature` → `feature/index.ts`, ...).
///
/// Every hit in the set is returned, in probing order. More than one match is
/// legitimate (`util.ts` next to `util/index.ts`); the caller links them all.
pub fn probe(
    files: &FileSet,
    importer_dir: &Path,
    spec: &str,
    exts: &[&str],
    index_names: &[&str],
) -> Vec<PathBuf> {
    let base = normalize(&importer_dir.join(spec));
    let mut matches = Vec::new();

    if files.contains(&base) {
        matches.push(base.clone());
    }

    if has_extension_of(&base, exts) {
        return matches;
    }

    for ext in exts {
        let candidate = append_extension(&base, ext);
        if files.contains(&candidate) {
            matches.push(candidate);
        }
    }

    for index in index_names {
        for ext in exts {
            let candidate = base.join(format!("{index}.{ext}"));
            if files.contains(&candidate) {
                matches.push(candidate);
            }
        }
    }

    matches
}

fn has_extension_of(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| exts.contains(&e))
        .unwrap_or(false)
}

/// Append `.ext` without clobbering dots already in the file name
/// (`Path::with_extension` would turn `util.v2` into `util.ts`).
fn append_extension(base: &Path, ext: &str) -> PathBuf {
    let mut s = base.as_os_str().to_owned();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

// ---------------------------------------------------------------------------
// Glob expansion (embed directives)
// ---------------------------------------------------------------------------

/// Expand an embed-style glob against the supplied set.
///
/// Patterns are relative to `base_dir` (the embedding file's directory), with
/// Go's `path.Match` semantics: `*` never crosses a separator, and a pattern
/// matching a directory pulls in that directory's whole subtree. The `all:`
/// prefix admits dotfiles; without it they are skipped. A malformed pattern
/// expands to nothing.
pub fn probe_glob(files: &FileSet, base_dir: &Path, pattern: &str) -> Vec<PathBuf> {
    let (pattern, include_hidden) = match pattern.strip_prefix("all:") {
        Some(rest) => (rest, true),
        None => (pattern, false),
    };
    let Ok(compiled) = Pattern::new(pattern) else {
        return Vec::new();
    };
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: !include_hidden,
    };

    let mut matches = Vec::new();
    for member in files.members_under(base_dir) {
        let Ok(rel) = member.strip_prefix(base_dir) else {
            continue;
        };
        // Direct match, or a match on any ancestor directory of the member
        // (directory patterns embed subtrees).
        let direct = compiled.matches_path_with(rel, options);
        let via_dir = !direct
            && rel
                .ancestors()
                .skip(1)
                .take_while(|a| !a.as_os_str().is_empty())
                .any(|a| compiled.matches_path_with(a, options));
        if direct || via_dir {
            matches.push(member.clone());
        }
    }
    matches
}
