//! Pure graph algorithms over the relation set.
//!
//! Storage keeps relations directed and typed. Reachability questions
//! (neighborhoods, paths, clusters) treat the graph as undirected, so each
//! algorithm here runs on a symmetric petgraph view built from the directed
//! edges. Nothing in this module touches the database.

use crate::memory::types::Relation;
use petgraph::algo::astar;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::Bfs;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Symmetric adjacency view over a set of directed relations.
///
/// Parallel and opposite edges collapse into one undirected edge.
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    graph: UnGraph<String, ()>,
    index: BTreeMap<String, NodeIndex>,
}

impl Adjacency {
    /// Build the view from directed relations. Self-loops are dropped.
    ///
    /// Nodes and edges are inserted in key order so traversals are
    /// reproducible for the same relation set.
    pub fn from_relations<'a>(relations: impl IntoIterator<Item = &'a Relation>) -> Self {
        let pairs: BTreeSet<(&str, &str)> = relations
            .into_iter()
            .filter(|r| !r.is_self_loop())
            .map(|r| {
                let (a, b) = (r.source_key.as_str(), r.target_key.as_str());
                if a <= b {
                    (a, b)
                } else {
                    (b, a)
                }
            })
            .collect();

        let mut adjacency = Self::default();
        for (a, b) in pairs {
            adjacency.add_edge(a, b);
        }
        adjacency
    }

    /// Insert an undirected edge between `a` and `b`.
    pub fn add_edge(&mut self, a: &str, b: &str) {
        if a == b {
            return;
        }
        let ia = self.node(a);
        let ib = self.node(b);
        self.graph.update_edge(ia, ib, ());
    }

    fn node(&mut self, key: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(key) {
            return idx;
        }
        let idx = self.graph.add_node(key.to_string());
        self.index.insert(key.to_string(), idx);
        idx
    }

    fn key(&self, idx: NodeIndex) -> Option<&str> {
        self.graph.node_weight(idx).map(String::as_str)
    }

    /// Neighbors of `key` in key order.
    pub fn neighbors(&self, key: &str) -> Vec<&str> {
        let Some(&idx) = self.index.get(key) else {
            return Vec::new();
        };
        let mut keys: Vec<&str> = self
            .graph
            .neighbors(idx)
            .filter_map(|n| self.key(n))
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Number of distinct neighbors of `key`.
    pub fn degree(&self, key: &str) -> usize {
        self.index
            .get(key)
            .map_or(0, |&idx| self.graph.neighbors(idx).count())
    }

    /// Whether `key` has at least one neighbor.
    pub fn contains(&self, key: &str) -> bool {
        self.degree(key) > 0
    }
}

/// Breadth-first neighborhood of `root` up to `max_depth` hops.
///
/// Returns `(key, depth)` pairs excluding the root, sorted by depth and then
/// by key.
pub fn neighborhood(adjacency: &Adjacency, root: &str, max_depth: usize) -> Vec<(String, usize)> {
    let Some(&start) = adjacency.index.get(root) else {
        return Vec::new();
    };
    let graph = &adjacency.graph;

    let mut bfs = Bfs::new(graph, start);
    let mut depth_map: HashMap<NodeIndex, usize> = HashMap::new();
    depth_map.insert(start, 0);
    let mut result = Vec::new();

    while let Some(idx) = bfs.next(graph) {
        let depth = depth_map.get(&idx).copied().unwrap_or(0);
        if depth > max_depth {
            break;
        }
        if idx != start {
            if let Some(key) = adjacency.key(idx) {
                result.push((key.to_string(), depth));
            }
        }
        for neighbor in graph.neighbors(idx) {
            depth_map.entry(neighbor).or_insert(depth + 1);
        }
    }

    result.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    result
}

/// Unweighted shortest path from `source` to `target`, both inclusive.
///
/// Edge direction is ignored. Returns `None` when no path exists.
pub fn shortest_path(adjacency: &Adjacency, source: &str, target: &str) -> Option<Vec<String>> {
    if source == target {
        return Some(vec![source.to_string()]);
    }
    let from = *adjacency.index.get(source)?;
    let to = *adjacency.index.get(target)?;

    let (_hops, nodes) = astar(&adjacency.graph, from, |n| n == to, |_| 1usize, |_| 0usize)?;
    nodes
        .into_iter()
        .map(|idx| adjacency.key(idx).map(str::to_string))
        .collect()
}

/// Connected components of the undirected graph induced by `relations`.
///
/// Only keys that appear as an endpoint form part of a component. A
/// self-loop yields a singleton component. Keys within a component are
/// sorted; components are ordered by size descending, then by first key.
pub fn connected_components(relations: &[Relation]) -> Vec<Vec<String>> {
    let keys: Vec<&str> = relations
        .iter()
        .flat_map(|r| [r.source_key.as_str(), r.target_key.as_str()])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let position: HashMap<&str, usize> = keys.iter().enumerate().map(|(i, k)| (*k, i)).collect();

    let mut sets = UnionFind::<usize>::new(keys.len());
    for relation in relations {
        let a = position[relation.source_key.as_str()];
        let b = position[relation.target_key.as_str()];
        sets.union(a, b);
    }

    // Keys are visited in sorted order, so every group comes out sorted.
    let mut groups: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for (i, key) in keys.iter().enumerate() {
        groups.entry(sets.find(i)).or_default().push(key.to_string());
    }

    let mut clusters: Vec<Vec<String>> = groups.into_values().collect();
    clusters.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));
    clusters
}
