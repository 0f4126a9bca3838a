use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Content access
// ---------------------------------------------------------------------------

/// Source of file contents for a graph build.
///
/// The engine never touches the filesystem directly: every byte it reads comes
/// through this trait. That keeps the build honest about its inputs. A caller
/// can hand it the working tree, a pinned VCS revision, or an in-memory
/// snapshot, and the resulting graph only reflects what the reader can see.
///
/// Manifest discovery (`go.mod`, `Cargo.toml`) also probes through the reader;
/// a read error there simply means "no manifest at this level".
pub trait ContentReader: Sync {
    /// Read the full contents of `path`.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads straight from the filesystem. The default reader for CLI runs.
pub struct FsReader;

impl ContentReader for FsReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// In-memory reader backed by a path → bytes map.
///
/// Useful for snapshot-pinned builds and for exercising the engine without a
/// filesystem. Paths not present in the map report `NotFound`, which the
/// engine records as a per-file read failure (or, during manifest discovery,
/// treats as "manifest absent").
#[derive(Debug, Default)]
pub struct MemReader {
    entries: std::collections::HashMap<PathBuf, Vec<u8>>,
}

impl MemReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file, replacing any previous contents at the same path.
    pub fn insert(&mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.entries.insert(path.into(), contents.into());
    }
}

impl ContentReader for MemReader {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.entries
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{}", path.display())))
    }
}

// ---------------------------------------------------------------------------
// FileSet
// ---------------------------------------------------------------------------

/// The closed set of files a build is allowed to know about.
///
/// Every resolution a build produces lands inside this set: a candidate path
/// that probes cleanly on disk but is not a member is treated as absent. That
/// is what makes commit-scoped builds (graph over the files touched by a
/// change) behave the same as whole-project builds: the engine itself never
/// asks "does this file exist?", only "is this file supplied?".
///
/// Paths are stored sorted, so iteration order, and therefore node insertion
/// order in the graph, is deterministic.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    paths: BTreeSet<PathBuf>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Membership test. The resolver's only question.
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>) {
        self.paths.insert(path.into());
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// All members in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.paths.iter()
    }

    /// Members whose path starts with `dir` (the directory itself excluded).
    ///
    /// Matches on path components, not string prefixes: `src/a` does not
    /// cover `src/ab/x.ts`.
    pub fn members_under<'a>(&'a self, dir: &'a Path) -> impl Iterator<Item = &'a PathBuf> + 'a {
        self.paths.iter().filter(move |p| p.starts_with(dir) && p.as_path() != dir)
    }

    /// The deepest directory containing every member: the set's own root.
    ///
    /// A single-file set roots at the file's directory; an empty set has no
    /// root, and neither does a mix of absolute and relative members.
    pub fn common_root(&self) -> Option<PathBuf> {
        let first = self.paths.iter().next()?;
        let mut root = first.parent()?.to_path_buf();
        for path in &self.paths {
            while !path.starts_with(&root) {
                root = root.parent()?.to_path_buf();
            }
        }
        Some(root)
    }

    /// Drop members failing the predicate, returning the filtered set.
    pub fn retain(mut self, keep: impl Fn(&Path) -> bool) -> Self {
        self.paths.retain(|p| keep(p));
        self
    }
}

impl FromIterator<PathBuf> for FileSet {
    fn from_iter<I: IntoIterator<Item = PathBuf>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = &'a PathBuf;
    type IntoIter = std::collections::btree_set::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

// ---------------------------------------------------------------------------
// Path normalization
// ---------------------------------------------------------------------------

/// Lexically normalize a path: resolve `.` and `..` components without
/// touching the filesystem.
///
/// Membership tests against a [`FileSet`] need exact paths, and candidates
/// are built by joining an importer's directory with specifiers like
/// `../shared/util`. `Path::canonicalize` would hit the disk (and fail for
/// snapshot readers), so this stays purely lexical. `..` at the root is
/// dropped rather than preserved.
pub fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    // Above the top of a relative path there is nothing to
                    // strip; keep the component so `../x` stays `../x`.
                    if !path.has_root() {
                        out.push("..");
                    }
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_resolves_dot_and_dotdot() {
        assert_eq!(normalize(Path::new("/a/b/./c")), PathBuf::from("/a/b/c"));
        assert_eq!(normalize(Path::new("/a/b/../c")), PathBuf::from("/a/c"));
        assert_eq!(
            normalize(Path::new("/a/b/../../x/y.ts")),
            PathBuf::from("/x/y.ts")
        );
    }

    #[test]
    fn normalize_clamps_dotdot_at_root() {
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
    }

    #[test]
    fn normalize_keeps_leading_dotdot_for_relative_paths() {
        assert_eq!(normalize(Path::new("../a/b")), PathBuf::from("../a/b"));
    }

    #[test]
    fn members_under_matches_components_not_prefixes() {
        let set: FileSet = [
            PathBuf::from("/p/src/a/x.ts"),
            PathBuf::from("/p/src/ab/y.ts"),
        ]
        .into_iter()
        .collect();

        let under: Vec<_> = set.members_under(Path::new("/p/src/a")).collect();
        assert_eq!(under, vec![&PathBuf::from("/p/src/a/x.ts")]);
    }

    #[test]
    fn common_root_is_the_deepest_shared_directory() {
        let set: FileSet = [
            PathBuf::from("/p/src/a/x.ts"),
            PathBuf::from("/p/src/b/y.ts"),
            PathBuf::from("/p/README.md"),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.common_root(), Some(PathBuf::from("/p")));

        let single: FileSet = [PathBuf::from("/p/pkg/mod.py")].into_iter().collect();
        assert_eq!(single.common_root(), Some(PathBuf::from("/p/pkg")));

        assert_eq!(FileSet::new().common_root(), None);
    }

    #[test]
    fn mem_reader_reports_not_found_for_absent_paths() {
        let mut reader = MemReader::new();
        reader.insert("/p/a.ts", "export {}");

        assert!(reader.read(Path::new("/p/a.ts")).is_ok());
        let err = reader.read(Path::new("/p/missing.ts")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn file_set_iterates_sorted() {
        let set: FileSet = [
            PathBuf::from("/p/z.ts"),
            PathBuf::from("/p/a.ts"),
            PathBuf::from("/p/m.ts"),
        ]
        .into_iter()
        .collect();

        let order: Vec<_> = set.iter().map(|p| p.to_path_buf()).collect();
        assert_eq!(
            order,
            vec![
                PathBuf::from("/p/a.ts"),
                PathBuf::from("/p/m.ts"),
                PathBuf::from("/p/z.ts"),
            ]
        );
    }
}
