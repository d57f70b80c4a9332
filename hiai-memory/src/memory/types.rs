//! Core types for the memory store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Category assigned when the caller does not supply one.
pub const DEFAULT_CATEGORY: &str = "general";

/// Weight assigned to a relation when the caller does not supply one.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// A single durable key/value entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    /// Unique identity of the record.
    pub key: String,
    /// Arbitrary content, possibly a JSON payload written by another tool.
    pub value: String,
    /// Free-form grouping tag.
    pub category: String,
    /// Ranking priority; higher is more important.
    pub priority: i64,
    /// Set on first insert and refreshed on every overwrite.
    pub created_at: DateTime<Utc>,
    /// Refreshed on every successful recall and on overwrite.
    pub last_accessed_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Case-insensitive substring match against key or value.
    ///
    /// `query_lower` must already be lower-cased.
    pub fn matches(&self, query_lower: &str) -> bool {
        self.key.to_lowercase().contains(query_lower)
            || self.value.to_lowercase().contains(query_lower)
    }

    /// First `max` characters of the value, with an ellipsis when truncated.
    pub fn preview(&self, max: usize) -> String {
        let mut chars = self.value.chars();
        let head: String = chars.by_ref().take(max).collect();
        if chars.next().is_some() {
            format!("{}...", head)
        } else {
            head
        }
    }
}

/// A directed, typed, weighted edge between two record keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub source_key: String,
    pub target_key: String,
    pub relation_type: String,
    /// Advisory strength, observed in 0.0..=1.0 but not enforced.
    pub weight: f64,
    pub created_at: DateTime<Utc>,
}

impl Relation {
    /// Whether the relation names `key` as either endpoint.
    pub fn touches(&self, key: &str) -> bool {
        self.source_key == key || self.target_key == key
    }

    /// Whether the relation is a self-loop.
    pub fn is_self_loop(&self) -> bool {
        self.source_key == self.target_key
    }
}

/// Edge direction relative to a record when querying adjacency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Relations where the record is the source.
    Outgoing,
    /// Relations where the record is the target.
    Incoming,
    /// Outgoing followed by incoming, without deduplication.
    #[default]
    Both,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outgoing => write!(f, "outgoing"),
            Self::Incoming => write!(f, "incoming"),
            Self::Both => write!(f, "both"),
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "outgoing" | "out" => Ok(Self::Outgoing),
            "incoming" | "in" => Ok(Self::Incoming),
            "both" => Ok(Self::Both),
            other => Err(Error::invalid_input(format!("unknown direction '{}'", other))),
        }
    }
}

/// Statistics about the memory store, computed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub total: u64,
    pub by_category: BTreeMap<String, u64>,
    pub total_relations: u64,
}

/// Read-only graph projection over the store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MemoryGraph {
    pub nodes: Vec<MemoryRecord>,
    pub edges: Vec<Relation>,
    /// Connected components of the undirected graph induced by `edges`.
    pub clusters: Vec<Vec<String>>,
}

impl MemoryGraph {
    /// Keys of every node in the projection.
    pub fn node_keys(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.key.as_str()).collect()
    }
}
