//! Graph queries over the store: neighborhoods, projections and paths.
//!
//! Each query loads records and relations under a single connection lock
//! and hands them to the pure algorithms in [`crate::memory::traversal`].

use crate::error::Result;
use crate::memory::relations::load_relations;
use crate::memory::store::{
    get_record, load_records, load_records_by_keys, record_exists, MemoryStore,
};
use crate::memory::traversal::{connected_components, neighborhood, shortest_path, Adjacency};
use crate::memory::types::{MemoryGraph, MemoryRecord, Relation};
use rusqlite::Connection;
use std::collections::HashSet;
use tracing::{debug, instrument};

impl MemoryStore {
    /// Records reachable from `key` within `max_depth` hops, nearest first.
    ///
    /// Edges are followed in both directions. When `relation_type` is given
    /// only edges of that type are followed. The root itself is excluded.
    #[instrument(skip(self), level = "debug")]
    pub fn related_memories(
        &self,
        key: &str,
        max_depth: usize,
        relation_type: Option<&str>,
    ) -> Result<Vec<MemoryRecord>> {
        self.with_conn(|conn| related_in(conn, key, max_depth, relation_type))
    }

    /// Graph projection rooted at `root_key`, or the whole graph when `None`.
    ///
    /// A root that does not exist yields an empty projection.
    #[instrument(skip(self), level = "debug")]
    pub fn memory_graph(&self, root_key: Option<&str>, max_depth: usize) -> Result<MemoryGraph> {
        let graph = self.with_conn(|conn| {
            let Some(root) = root_key else {
                let nodes = load_records(conn, None)?;
                let edges = load_relations(conn, None)?;
                return Ok(project(nodes, edges));
            };

            let Some(root_record) = get_record(conn, root)? else {
                return Ok(MemoryGraph::default());
            };
            let mut nodes = vec![root_record];
            nodes.extend(related_in(conn, root, max_depth, None)?);

            let keys: HashSet<&str> = nodes.iter().map(|n| n.key.as_str()).collect();
            let edges: Vec<Relation> = load_relations(conn, None)?
                .into_iter()
                .filter(|r| {
                    keys.contains(r.source_key.as_str()) && keys.contains(r.target_key.as_str())
                })
                .collect();
            Ok(project(nodes, edges))
        })?;

        debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            clusters = graph.clusters.len(),
            "Built memory graph"
        );
        Ok(graph)
    }

    /// Shortest undirected path between two records, both inclusive.
    ///
    /// Returns `None` when either record is missing or no path exists.
    #[instrument(skip(self), level = "debug")]
    pub fn find_path(&self, source: &str, target: &str) -> Result<Option<Vec<String>>> {
        self.with_conn(|conn| {
            if !record_exists(conn, source)? || !record_exists(conn, target)? {
                return Ok(None);
            }
            if source == target {
                return Ok(Some(vec![source.to_string()]));
            }

            let relations = load_relations(conn, None)?;
            let adjacency = Adjacency::from_relations(&relations);
            if !adjacency.contains(source) {
                return Ok(None);
            }
            Ok(shortest_path(&adjacency, source, target))
        })
    }
}

fn related_in(
    conn: &Connection,
    key: &str,
    max_depth: usize,
    relation_type: Option<&str>,
) -> rusqlite::Result<Vec<MemoryRecord>> {
    let relations = load_relations(conn, relation_type)?;
    let adjacency = Adjacency::from_relations(&relations);
    let keys: Vec<String> = neighborhood(&adjacency, key, max_depth)
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    load_records_by_keys(conn, &keys)
}

fn project(nodes: Vec<MemoryRecord>, edges: Vec<Relation>) -> MemoryGraph {
    let clusters = connected_components(&edges);
    MemoryGraph {
        nodes,
        edges,
        clusters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store_with(keys: &[&str]) -> MemoryStore {
        let store = MemoryStore::in_memory().unwrap();
        for key in keys {
            store.save(key, &format!("value of {}", key), "general", 0).unwrap();
        }
        store
    }

    fn chain_store() -> MemoryStore {
        let store = store_with(&["a", "b", "c", "d"]);
        store.link("a", "b", "related_to", 1.0).unwrap();
        store.link("b", "c", "related_to", 1.0).unwrap();
        store
    }

    fn keys(records: &[MemoryRecord]) -> Vec<&str> {
        records.iter().map(|r| r.key.as_str()).collect()
    }

    #[test]
    fn test_related_memories_by_depth() {
        let store = chain_store();

        assert_eq!(keys(&store.related_memories("a", 1, None).unwrap()), vec!["b"]);
        assert_eq!(
            keys(&store.related_memories("a", 2, None).unwrap()),
            vec!["b", "c"]
        );
        assert_eq!(
            keys(&store.related_memories("c", 2, None).unwrap()),
            vec!["b", "a"]
        );
        assert!(store.related_memories("d", 3, None).unwrap().is_empty());
        assert!(store.related_memories("missing", 3, None).unwrap().is_empty());
    }

    #[test]
    fn test_related_memories_filters_by_type() {
        let store = chain_store();
        store.link("a", "d", "depends_on", 1.0).unwrap();

        assert_eq!(
            keys(&store.related_memories("a", 3, Some("depends_on")).unwrap()),
            vec!["d"]
        );
        assert_eq!(
            keys(&store.related_memories("a", 3, Some("related_to")).unwrap()),
            vec!["b", "c"]
        );
    }

    #[test]
    fn test_find_path() {
        let store = chain_store();

        assert_eq!(
            store.find_path("a", "c").unwrap(),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(
            store.find_path("c", "a").unwrap(),
            Some(vec!["c".to_string(), "b".to_string(), "a".to_string()])
        );
        assert_eq!(store.find_path("a", "d").unwrap(), None);
        assert_eq!(store.find_path("d", "a").unwrap(), None);
        assert_eq!(store.find_path("a", "missing").unwrap(), None);
        assert_eq!(store.find_path("a", "a").unwrap(), Some(vec!["a".to_string()]));
    }

    #[test]
    fn test_whole_graph_has_two_clusters() {
        let store = store_with(&["a", "b", "c", "d"]);
        store.link("a", "b", "related_to", 1.0).unwrap();
        store.link("c", "d", "related_to", 1.0).unwrap();

        let graph = store.memory_graph(None, 2).unwrap();
        assert_eq!(graph.nodes.len(), 4);
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(
            graph.clusters,
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["c".to_string(), "d".to_string()],
            ]
        );
    }

    #[test]
    fn test_isolated_nodes_are_not_clusters() {
        let store = store_with(&["a", "b", "lonely"]);
        store.link("a", "b", "related_to", 1.0).unwrap();

        let graph = store.memory_graph(None, 1).unwrap();
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.clusters.len(), 1);
    }

    #[test]
    fn test_rooted_graph_is_depth_bounded() {
        let store = chain_store();
        store.link("c", "d", "related_to", 1.0).unwrap();

        let graph = store.memory_graph(Some("a"), 1).unwrap();
        assert_eq!(graph.node_keys(), vec!["a", "b"]);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.clusters, vec![vec!["a".to_string(), "b".to_string()]]);

        let graph = store.memory_graph(Some("a"), 2).unwrap();
        assert_eq!(graph.node_keys(), vec!["a", "b", "c"]);
        assert_eq!(graph.edges.len(), 2);
    }

    #[test]
    fn test_rooted_graph_missing_root_is_empty() {
        let store = chain_store();
        let graph = store.memory_graph(Some("missing"), 2).unwrap();
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
        assert!(graph.clusters.is_empty());
    }

    #[test]
    fn test_self_loop_is_singleton_cluster() {
        let store = store_with(&["a"]);
        store.link("a", "a", "refines", 1.0).unwrap();

        let graph = store.memory_graph(Some("a"), 2).unwrap();
        assert_eq!(graph.node_keys(), vec!["a"]);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.clusters, vec![vec!["a".to_string()]]);
        assert!(store.related_memories("a", 2, None).unwrap().is_empty());
    }

    #[test]
    fn test_graph_after_cascade_delete() {
        let store = chain_store();
        store.delete("b").unwrap();

        let graph = store.memory_graph(None, 2).unwrap();
        assert!(graph.edges.is_empty());
        assert_eq!(store.find_path("a", "c").unwrap(), None);
    }
}
