//! Relation graph: directed, typed, weighted edges between records.

use crate::error::{Error, Result};
use crate::memory::store::{format_datetime, parse_datetime, record_exists, MemoryStore};
use crate::memory::types::{Direction, Relation};
use rusqlite::{params, Connection, Row};
use tracing::debug;

const RELATION_COLUMNS: &str = "source_key, target_key, relation_type, weight, created_at";

impl MemoryStore {
    // ==================== Relation Operations ====================

    /// Create or re-weight the edge `(source, target, relation_type)`.
    ///
    /// Returns `false` if either endpoint does not exist. Self-loops are
    /// accepted. Re-linking an existing triple only replaces its weight.
    pub fn link(
        &self,
        source: &str,
        target: &str,
        relation_type: &str,
        weight: f64,
    ) -> Result<bool> {
        if !weight.is_finite() {
            return Err(Error::invalid_input(format!(
                "relation weight must be finite, got {}",
                weight
            )));
        }
        let linked = self.with_conn_at(|conn, now| {
            let tx = conn.transaction()?;
            if !record_exists(&tx, source)? || !record_exists(&tx, target)? {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO relations (source_key, target_key, relation_type, weight, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(source_key, target_key, relation_type)
                 DO UPDATE SET weight = excluded.weight",
                params![source, target, relation_type, weight, format_datetime(&now)],
            )?;
            tx.commit()?;
            Ok(true)
        })?;

        if !linked {
            debug!(source, target, relation_type, "Link rejected: missing endpoint");
        }
        Ok(linked)
    }

    /// Remove the exact triple. Returns whether it existed.
    pub fn unlink(&self, source: &str, target: &str, relation_type: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "DELETE FROM relations
                 WHERE source_key = ?1 AND target_key = ?2 AND relation_type = ?3",
                params![source, target, relation_type],
            )?;
            Ok(rows > 0)
        })
    }

    /// Relations adjacent to `key`.
    ///
    /// `Direction::Both` yields outgoing edges followed by incoming edges, so
    /// a self-loop appears twice.
    pub fn relations_of(&self, key: &str, direction: Direction) -> Result<Vec<Relation>> {
        self.with_conn(|conn| {
            let mut relations = Vec::new();
            if matches!(direction, Direction::Outgoing | Direction::Both) {
                relations.extend(query_relations(
                    conn,
                    "WHERE source_key = ?1 ORDER BY id",
                    params![key],
                )?);
            }
            if matches!(direction, Direction::Incoming | Direction::Both) {
                relations.extend(query_relations(
                    conn,
                    "WHERE target_key = ?1 ORDER BY id",
                    params![key],
                )?);
            }
            Ok(relations)
        })
    }

    /// Every relation in insertion order.
    pub fn relations(&self) -> Result<Vec<Relation>> {
        self.with_conn(|conn| load_relations(conn, None))
    }

    /// Number of relations.
    pub fn relation_count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM relations", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }
}

/// All relations, optionally restricted to one relation type.
pub(crate) fn load_relations(
    conn: &Connection,
    relation_type: Option<&str>,
) -> rusqlite::Result<Vec<Relation>> {
    query_relations(
        conn,
        "WHERE (?1 IS NULL OR relation_type = ?1) ORDER BY id",
        params![relation_type],
    )
}

fn query_relations(
    conn: &Connection,
    clause: &str,
    params: &[&dyn rusqlite::ToSql],
) -> rusqlite::Result<Vec<Relation>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM relations {}",
        RELATION_COLUMNS, clause
    ))?;
    let relations = stmt
        .query_map(params, row_to_relation)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(relations)
}

fn row_to_relation(row: &Row) -> rusqlite::Result<Relation> {
    Ok(Relation {
        source_key: row.get(0)?,
        target_key: row.get(1)?,
        relation_type: row.get(2)?,
        weight: row.get(3)?,
        created_at: parse_datetime(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::DEFAULT_WEIGHT;
    use pretty_assertions::assert_eq;

    fn store_with(keys: &[&str]) -> MemoryStore {
        let store = MemoryStore::in_memory().unwrap();
        for key in keys {
            store.save(key, &format!("value of {}", key), "general", 0).unwrap();
        }
        store
    }

    #[test]
    fn test_link_and_relations_of() {
        let store = store_with(&["a", "b", "c"]);
        assert!(store.link("a", "b", "related_to", DEFAULT_WEIGHT).unwrap());
        assert!(store.link("c", "a", "depends_on", 0.5).unwrap());

        let outgoing = store.relations_of("a", Direction::Outgoing).unwrap();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].target_key, "b");

        let incoming = store.relations_of("a", Direction::Incoming).unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].source_key, "c");
        assert_eq!(incoming[0].weight, 0.5);

        let both = store.relations_of("a", Direction::Both).unwrap();
        assert_eq!(both.len(), 2);
        assert_eq!(both[0].relation_type, "related_to");
        assert_eq!(both[1].relation_type, "depends_on");
    }

    #[test]
    fn test_link_requires_existing_endpoints() {
        let store = store_with(&["a"]);
        assert!(!store.link("a", "missing", "related_to", 1.0).unwrap());
        assert!(!store.link("missing", "a", "related_to", 1.0).unwrap());
        assert_eq!(store.relation_count().unwrap(), 0);
    }

    #[test]
    fn test_relink_updates_weight_without_duplicating() {
        let store = store_with(&["a", "b"]);
        store.link("a", "b", "related_to", 1.0).unwrap();
        store.link("a", "b", "related_to", 0.25).unwrap();

        let edges = store.relations_of("a", Direction::Outgoing).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].weight, 0.25);

        // A different type between the same pair is a distinct edge
        store.link("a", "b", "depends_on", 1.0).unwrap();
        assert_eq!(store.relations_of("a", Direction::Outgoing).unwrap().len(), 2);
    }

    #[test]
    fn test_non_finite_weight_is_rejected() {
        let store = store_with(&["a", "b"]);
        let err = store.link("a", "b", "related_to", f64::NAN).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(store.link("a", "b", "related_to", f64::INFINITY).is_err());
    }

    #[test]
    fn test_unlink() {
        let store = store_with(&["a", "b"]);
        store.link("a", "b", "related_to", 1.0).unwrap();

        assert!(!store.unlink("b", "a", "related_to").unwrap());
        assert!(store.unlink("a", "b", "related_to").unwrap());
        assert!(!store.unlink("a", "b", "related_to").unwrap());
        assert!(store.relations_of("a", Direction::Both).unwrap().is_empty());
    }

    #[test]
    fn test_self_loop_appears_once_per_direction() {
        let store = store_with(&["a"]);
        assert!(store.link("a", "a", "refines", 1.0).unwrap());

        assert_eq!(store.relations_of("a", Direction::Outgoing).unwrap().len(), 1);
        assert_eq!(store.relations_of("a", Direction::Incoming).unwrap().len(), 1);
        assert_eq!(store.relations_of("a", Direction::Both).unwrap().len(), 2);
    }

    #[test]
    fn test_delete_cascades_relations() {
        let store = store_with(&["a", "b", "c"]);
        store.link("a", "b", "rel", 1.0).unwrap();
        store.link("c", "a", "rel", 1.0).unwrap();
        store.link("b", "c", "rel", 1.0).unwrap();

        assert!(store.delete("a").unwrap());

        assert!(store
            .relations_of("b", Direction::Both)
            .unwrap()
            .iter()
            .all(|r| !r.touches("a")));
        assert_eq!(store.relation_count().unwrap(), 1);
    }

    #[test]
    fn test_overwrite_keeps_relations() {
        let store = store_with(&["a", "b"]);
        store.link("a", "b", "rel", 1.0).unwrap();
        store.save("a", "new value", "general", 0).unwrap();

        assert_eq!(store.relations_of("b", Direction::Incoming).unwrap().len(), 1);
    }

    #[test]
    fn test_stats_counts_relations() {
        let store = store_with(&["a", "b"]);
        store.link("a", "b", "rel", 1.0).unwrap();
        assert_eq!(store.stats().unwrap().total_relations, 1);
    }
}
