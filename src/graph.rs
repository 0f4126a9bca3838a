use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::Directed;
use petgraph::Direction;

/// Metadata about a source file node.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FileNode {
    /// Absolute, normalized path to the file.
    pub path: PathBuf,
    /// The adapter that handled the file: "typescript", "go", ...
    pub language: String,
}

/// The dependency graph: a directed petgraph StableGraph over file nodes,
/// with O(1) path lookup. An edge `a -> b` means `a` depends on `b`.
///
/// Self-edges and duplicate (from, to) pairs are dropped at insertion; a file
/// importing itself (re-export indirection, generated code) carries no
/// information, and one edge per ordered pair keeps traversals honest no
/// matter how many import statements produced it.
pub struct DepGraph {
    pub graph: StableGraph<FileNode, (), Directed>,
    path_index: HashMap<PathBuf, NodeIndex>,
    edge_set: HashSet<(NodeIndex, NodeIndex)>,
}

/// A single file in a reverse-dependency (impact) result set.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Dependent {
    pub path: PathBuf,
    /// BFS depth from the queried file: 1 = direct importer.
    pub depth: usize,
}

impl DepGraph {
    pub fn new() -> Self {
        Self {
            graph: StableGraph::new(),
            path_index: HashMap::new(),
            edge_set: HashSet::new(),
        }
    }

    /// Add a file node. Adding the same path again returns the existing
    /// index.
    pub fn add_file(&mut self, path: PathBuf, language: &str) -> NodeIndex {
        if let Some(&existing) = self.path_index.get(&path) {
            return existing;
        }
        let idx = self.graph.add_node(FileNode {
            path: path.clone(),
            language: language.to_owned(),
        });
        self.path_index.insert(path, idx);
        idx
    }

    /// Add a dependency edge. Returns false for self-edges and pairs already
    /// present.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex) -> bool {
        if from == to || !self.edge_set.insert((from, to)) {
            return false;
        }
        self.graph.add_edge(from, to, ());
        true
    }

    /// Path-level edge insertion. Both endpoints must already be nodes;
    /// unknown paths insert nothing.
    pub fn link(&mut self, from: &Path, to: &Path) -> bool {
        match (self.node_of(from), self.node_of(to)) {
            (Some(a), Some(b)) => self.add_edge(a, b),
            _ => false,
        }
    }

    pub fn node_of(&self, path: &Path) -> Option<NodeIndex> {
        self.path_index.get(path).copied()
    }

    pub fn file_count(&self) -> usize {
        self.path_index.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_set.len()
    }

    pub fn files(&self) -> impl Iterator<Item = &FileNode> {
        self.graph.node_weights()
    }

    /// All edges as (from, to) paths, sorted.
    pub fn edges(&self) -> Vec<(PathBuf, PathBuf)> {
        let mut out: Vec<(PathBuf, PathBuf)> = self
            .edge_set
            .iter()
            .map(|&(a, b)| (self.graph[a].path.clone(), self.graph[b].path.clone()))
            .collect();
        out.sort();
        out
    }

    /// Outgoing targets per node with at least one edge, sorted both ways.
    pub fn adjacency(&self) -> BTreeMap<PathBuf, Vec<PathBuf>> {
        let mut map: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
        for &(from, to) in &self.edge_set {
            map.entry(self.graph[from].path.clone())
                .or_default()
                .push(self.graph[to].path.clone());
        }
        for targets in map.values_mut() {
            targets.sort();
        }
        map
    }

    /// Files that transitively depend on `path`: BFS over incoming edges,
    /// excluding the file itself, sorted by depth then path. `max_depth`
    /// bounds the walk; `None` walks the full closure.
    pub fn dependents_of(&self, path: &Path, max_depth: Option<usize>) -> Vec<Dependent> {
        let Some(start) = self.node_of(path) else {
            return Vec::new();
        };

        let mut queue = VecDeque::new();
        let mut depths: HashMap<NodeIndex, usize> = HashMap::new();
        queue.push_back(start);
        depths.insert(start, 0);

        while let Some(current) = queue.pop_front() {
            let depth = depths[&current];
            if let Some(limit) = max_depth
                && depth >= limit
            {
                continue;
            }
            for source in self.graph.neighbors_directed(current, Direction::Incoming) {
                if !depths.contains_key(&source) {
                    depths.insert(source, depth + 1);
                    queue.push_back(source);
                }
            }
        }

        let mut results: Vec<Dependent> = depths
            .into_iter()
            .filter(|&(idx, _)| idx != start)
            .map(|(idx, depth)| Dependent {
                path: self.graph[idx].path.clone(),
                depth,
            })
            .collect();
        results.sort_by(|a, b| a.depth.cmp(&b.depth).then(a.path.cmp(&b.path)));
        results
    }
}

impl Default for DepGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> DepGraph {
        // c -> b -> a
        let mut g = DepGraph::new();
        let a = g.add_file(PathBuf::from("/p/a.ts"), "typescript");
        let b = g.add_file(PathBuf::from("/p/b.ts"), "typescript");
        let c = g.add_file(PathBuf::from("/p/c.ts"), "typescript");
        g.add_edge(b, a);
        g.add_edge(c, b);
        g
    }

    #[test]
    fn duplicate_file_returns_same_index() {
        let mut g = DepGraph::new();
        let i1 = g.add_file(PathBuf::from("/p/app.ts"), "typescript");
        let i2 = g.add_file(PathBuf::from("/p/app.ts"), "typescript");
        assert_eq!(i1, i2);
        assert_eq!(g.file_count(), 1);
    }

    #[test]
    fn self_edges_and_duplicates_are_dropped() {
        let mut g = DepGraph::new();
        let a = g.add_file(PathBuf::from("/p/a.go"), "go");
        let b = g.add_file(PathBuf::from("/p/b.go"), "go");
        assert!(!g.add_edge(a, a), "self-edge must be rejected");
        assert!(g.add_edge(a, b));
        assert!(!g.add_edge(a, b), "duplicate edge must be rejected");
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn adjacency_is_sorted_and_complete() {
        let mut g = DepGraph::new();
        let a = g.add_file(PathBuf::from("/p/a.py"), "python");
        let z = g.add_file(PathBuf::from("/p/z.py"), "python");
        let m = g.add_file(PathBuf::from("/p/m.py"), "python");
        g.add_edge(a, z);
        g.add_edge(a, m);
        let adj = g.adjacency();
        assert_eq!(
            adj.get(Path::new("/p/a.py")).unwrap(),
            &vec![PathBuf::from("/p/m.py"), PathBuf::from("/p/z.py")]
        );
        assert!(!adj.contains_key(Path::new("/p/z.py")), "no outgoing edges, no entry");
    }

    #[test]
    fn dependents_walk_incoming_edges_with_depths() {
        let g = chain();
        let deps = g.dependents_of(Path::new("/p/a.ts"), None);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].path, PathBuf::from("/p/b.ts"));
        assert_eq!(deps[0].depth, 1);
        assert_eq!(deps[1].path, PathBuf::from("/p/c.ts"));
        assert_eq!(deps[1].depth, 2);
    }

    #[test]
    fn dependents_respect_max_depth() {
        let g = chain();
        let deps = g.dependents_of(Path::new("/p/a.ts"), Some(1));
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].path, PathBuf::from("/p/b.ts"));
    }

    #[test]
    fn dependents_of_cycle_terminate() {
        let mut g = DepGraph::new();
        let a = g.add_file(PathBuf::from("/p/a.rb"), "ruby");
        let b = g.add_file(PathBuf::from("/p/b.rb"), "ruby");
        g.add_edge(a, b);
        g.add_edge(b, a);
        let deps = g.dependents_of(Path::new("/p/a.rb"), None);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].path, PathBuf::from("/p/b.rb"));
    }

    #[test]
    fn unknown_file_has_no_dependents() {
        let g = chain();
        assert!(g.dependents_of(Path::new("/p/missing.ts"), None).is_empty());
    }
}
