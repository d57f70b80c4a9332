//! Ranking strategies for free-text search.

use crate::error::{Error, Result};
use crate::memory::store::{load_records, MemoryStore};
use crate::memory::types::MemoryRecord;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

const KEY_EXACT_BOOST: f64 = 3.0;
const KEY_MATCH_BOOST: f64 = 2.0;
const VALUE_MATCH_BOOST: f64 = 1.0;
const PRIORITY_FACTOR: f64 = 0.5;
const CONNECTIVITY_FACTOR: f64 = 0.1;

/// Named ordering rule applied to the matching candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Priority descending, then recency.
    #[default]
    Keyword,
    /// Most recently created or overwritten first, ignoring priority.
    Temporal,
    /// Highest priority first, ties by recency.
    Priority,
    /// Composite score favoring key matches, priority and connectivity.
    ContextAware,
}

impl SearchStrategy {
    /// All strategies, in declaration order.
    pub const ALL: [SearchStrategy; 4] = [
        Self::Keyword,
        Self::Temporal,
        Self::Priority,
        Self::ContextAware,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Temporal => "temporal",
            Self::Priority => "priority",
            Self::ContextAware => "context_aware",
        }
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| Error::InvalidStrategy(s.to_string()))
    }
}

/// Filters applied before ranking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub category: Option<String>,
    pub limit: Option<usize>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only consider records in this category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Truncate the ranked result.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl MemoryStore {
    /// Search with an explicit ranking strategy.
    pub fn search_advanced(
        &self,
        query: &str,
        strategy: SearchStrategy,
        options: &SearchOptions,
    ) -> Result<Vec<MemoryRecord>> {
        let query_lower = query.to_lowercase();

        let (candidates, weights) = self.with_conn(|conn| {
            let candidates: Vec<MemoryRecord> = load_records(conn, options.category.as_deref())?
                .into_iter()
                .filter(|r| r.matches(&query_lower))
                .collect();
            let weights = if strategy == SearchStrategy::ContextAware {
                incident_weights(conn)?
            } else {
                HashMap::new()
            };
            Ok((candidates, weights))
        })?;

        let mut ranked = rank(candidates, &query_lower, strategy, &weights);
        if let Some(limit) = options.limit {
            ranked.truncate(limit);
        }
        Ok(ranked)
    }
}

/// Order `candidates` by `strategy`.
///
/// `query_lower` must be lower-cased; `weights` maps a key to the summed
/// weight of its incident relations and is only read by `ContextAware`.
pub fn rank(
    mut candidates: Vec<MemoryRecord>,
    query_lower: &str,
    strategy: SearchStrategy,
    weights: &HashMap<String, f64>,
) -> Vec<MemoryRecord> {
    match strategy {
        SearchStrategy::Keyword | SearchStrategy::Priority => {
            candidates.sort_by(by_priority_then_recency);
            candidates
        }
        SearchStrategy::Temporal => {
            candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            candidates
        }
        SearchStrategy::ContextAware => {
            let mut scored: Vec<(f64, MemoryRecord)> = candidates
                .into_iter()
                .map(|record| {
                    let weight = weights.get(&record.key).copied().unwrap_or(0.0);
                    (context_score(&record, query_lower, weight), record)
                })
                .collect();
            scored.sort_by(|(sa, a), (sb, b)| {
                sb.partial_cmp(sa)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| b.created_at.cmp(&a.created_at))
            });
            scored.into_iter().map(|(_, record)| record).collect()
        }
    }
}

/// Composite relevance score used by `ContextAware`.
pub fn context_score(record: &MemoryRecord, query_lower: &str, incident_weight: f64) -> f64 {
    let key = record.key.to_lowercase();
    let mut score = 0.0;

    if key == query_lower {
        score += KEY_EXACT_BOOST;
    } else if key.contains(query_lower) {
        score += KEY_MATCH_BOOST;
    }
    if record.value.to_lowercase().contains(query_lower) {
        score += VALUE_MATCH_BOOST;
    }
    score += PRIORITY_FACTOR * record.priority as f64;
    score += CONNECTIVITY_FACTOR * incident_weight;
    score
}

fn by_priority_then_recency(a: &MemoryRecord, b: &MemoryRecord) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

fn incident_weights(conn: &Connection) -> rusqlite::Result<HashMap<String, f64>> {
    let mut stmt = conn.prepare(
        "SELECT key, SUM(weight) FROM (
            SELECT source_key AS key, weight FROM relations
            UNION ALL
            SELECT target_key AS key, weight FROM relations
         ) GROUP BY key",
    )?;
    let weights = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?
        .collect::<rusqlite::Result<HashMap<_, _>>>()?;
    Ok(weights)
}
