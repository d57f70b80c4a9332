//! Temporal projection over the record store.

use crate::error::Result;
use crate::memory::store::{row_to_record, MemoryStore, RECORD_COLUMNS};
use crate::memory::types::MemoryRecord;
use rusqlite::params;
use serde::Serialize;

/// Filters for [`MemoryStore::timeline`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimelineQuery {
    /// Only records in this category.
    pub category: Option<String>,
    /// Only records that are an endpoint of a relation of this type.
    pub relation_type: Option<String>,
    /// Maximum number of records; unlimited when `None`.
    pub limit: Option<usize>,
}

impl TimelineQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn relation_type(mut self, relation_type: impl Into<String>) -> Self {
        self.relation_type = Some(relation_type.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Records sharing a calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineDay {
    pub date: String,
    pub entries: Vec<MemoryRecord>,
}

impl MemoryStore {
    /// Records newest first, optionally filtered by category and relation type.
    pub fn timeline(&self, query: &TimelineQuery) -> Result<Vec<MemoryRecord>> {
        // SQLite treats a negative LIMIT as unbounded
        let limit = query.limit.map_or(-1, |l| l as i64);

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM memories m
                 WHERE (?1 IS NULL OR m.category = ?1)
                   AND (?2 IS NULL OR EXISTS (
                        SELECT 1 FROM relations r
                        WHERE r.relation_type = ?2
                          AND (r.source_key = m.key OR r.target_key = m.key)))
                 ORDER BY m.created_at DESC
                 LIMIT ?3",
                RECORD_COLUMNS
            ))?;
            let records = stmt
                .query_map(
                    params![query.category, query.relation_type, limit],
                    row_to_record,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
    }
}

/// Group a newest-first timeline into calendar days, keeping order.
pub fn group_by_day(records: Vec<MemoryRecord>) -> Vec<TimelineDay> {
    let mut days: Vec<TimelineDay> = Vec::new();
    for record in records {
        let date = record.created_at.format("%Y-%m-%d").to_string();
        match days.last_mut() {
            Some(day) if day.date == date => day.entries.push(record),
            _ => days.push(TimelineDay {
                date,
                entries: vec![record],
            }),
        }
    }
    days
}
