//! SQLite-backed memory store implementation.

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::memory::migrate;
use crate::memory::schema::{initialize_schema, is_initialized};
use crate::memory::types::*;
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

pub(crate) const RECORD_COLUMNS: &str =
    "key, value, category, priority, created_at, last_accessed";

/// SQLite-backed memory store.
///
/// One handle owns one connection. Every public operation takes the
/// connection lock exactly once, so operations spanning both tables are
/// never observed half-applied by another caller of the same handle.
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

/// Connection plus the last timestamp issued on it.
///
/// Both live under one lock so timestamp order always matches commit order.
struct StoreInner {
    conn: Connection,
    last_stamp: DateTime<Utc>,
}

impl StoreInner {
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now().trunc_subsecs(6);
        if now <= self.last_stamp {
            now = self.last_stamp + Duration::microseconds(1);
        }
        self.last_stamp = now;
        now
    }
}

impl MemoryStore {
    /// Open or create a store at an explicit path.
    ///
    /// The parent directory is created if missing. Legacy import never runs
    /// here; use [`MemoryStore::open_with_config`] for the default location.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;

        let conn = Connection::open(path)?;
        let existing = is_initialized(&conn);
        initialize_schema(&conn)?;

        info!(path = %path.display(), existing, "Opened memory store");
        Ok(Self::from_connection(conn))
    }

    /// Open the store at the configured data directory, importing a legacy
    /// flat file if one is present and migration is enabled.
    pub fn open_with_config(config: &StoreConfig) -> Result<Self> {
        let store = Self::open(config.db_path())?;

        if config.migrate_legacy {
            migrate::migrate_legacy_file(&store, &config.legacy_path());
        }

        Ok(store)
    }

    /// Open the store using configuration from the environment.
    pub fn open_default() -> Result<Self> {
        Self::open_with_config(&StoreConfig::from_env())
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                conn,
                last_stamp: DateTime::<Utc>::MIN_UTC,
            }),
        }
    }

    /// Flush the write-ahead log and close the connection.
    pub fn close(self) -> Result<()> {
        let conn = self
            .inner
            .into_inner()
            .map_err(|e| Error::Internal(format!("Failed to lock connection: {}", e)))?
            .conn;

        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        conn.close().map_err(|(_, e)| Error::from(e))?;

        info!("Closed memory store");
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>> {
        self.inner
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock connection: {}", e)))
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T>,
    {
        let mut inner = self.lock()?;
        f(&mut inner.conn).map_err(Error::from)
    }

    /// Like [`with_conn`](Self::with_conn), with a fresh timestamp issued
    /// under the same lock.
    pub(crate) fn with_conn_at<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection, DateTime<Utc>) -> rusqlite::Result<T>,
    {
        let mut inner = self.lock()?;
        let now = inner.next_timestamp();
        f(&mut inner.conn, now).map_err(Error::from)
    }

    /// Strictly increasing timestamp for this handle.
    pub(crate) fn next_timestamp(&self) -> Result<DateTime<Utc>> {
        Ok(self.lock()?.next_timestamp())
    }

    // ==================== Record Operations ====================

    /// Insert or overwrite a record. Both timestamps are set to now.
    ///
    /// Overwriting keeps the record's relations.
    pub fn save(
        &self,
        key: &str,
        value: &str,
        category: &str,
        priority: i64,
    ) -> Result<MemoryRecord> {
        let now = self.with_conn_at(|conn, now| {
            let stamp = format_datetime(&now);
            conn.execute(
                "INSERT INTO memories (key, value, category, priority, created_at, last_accessed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    category = excluded.category,
                    priority = excluded.priority,
                    created_at = excluded.created_at,
                    last_accessed = excluded.last_accessed",
                params![key, value, category, priority, stamp],
            )?;
            Ok(now)
        })?;

        Ok(MemoryRecord {
            key: key.to_string(),
            value: value.to_string(),
            category: category.to_string(),
            priority,
            created_at: now,
            last_accessed_at: now,
        })
    }

    /// Fetch a record and refresh its last-accessed time.
    pub fn recall(&self, key: &str) -> Result<Option<MemoryRecord>> {
        let record = self.with_conn_at(|conn, now| {
            let Some(mut record) = get_record(conn, key)? else {
                return Ok(None);
            };
            conn.execute(
                "UPDATE memories SET last_accessed = ?2 WHERE key = ?1",
                params![key, format_datetime(&now)],
            )?;
            record.last_accessed_at = now;
            Ok(Some(record))
        })?;

        if record.is_none() {
            debug!(key, "Recall miss");
        }
        Ok(record)
    }

    /// Fetch a record without touching its last-accessed time.
    pub fn get(&self, key: &str) -> Result<Option<MemoryRecord>> {
        self.with_conn(|conn| get_record(conn, key))
    }

    /// Replace (or with `append`, extend) the value of an existing record.
    ///
    /// Returns `false` when the key is absent; never creates a record.
    pub fn update(&self, key: &str, value: &str, append: bool) -> Result<bool> {
        let sql = if append {
            "UPDATE memories SET value = value || ' ' || ?2, created_at = ?3, last_accessed = ?3
             WHERE key = ?1"
        } else {
            "UPDATE memories SET value = ?2, created_at = ?3, last_accessed = ?3
             WHERE key = ?1"
        };

        self.with_conn_at(|conn, now| {
            let rows = conn.execute(sql, params![key, value, format_datetime(&now)])?;
            Ok(rows > 0)
        })
    }

    /// Delete a record together with every relation naming it.
    pub fn delete(&self, key: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let edges = tx.execute(
                "DELETE FROM relations WHERE source_key = ?1 OR target_key = ?1",
                params![key],
            )?;
            let rows = tx.execute("DELETE FROM memories WHERE key = ?1", params![key])?;
            tx.commit()?;

            if rows > 0 {
                debug!(key, edges, "Deleted memory");
            }
            Ok(rows > 0)
        })
    }

    /// All records, or those in `category`, by priority then recency.
    pub fn list(&self, category: Option<&str>) -> Result<Vec<MemoryRecord>> {
        self.with_conn(|conn| load_records(conn, category))
    }

    /// Case-insensitive substring search over key and value.
    ///
    /// An empty query matches every record.
    pub fn search(&self, query: &str) -> Result<Vec<MemoryRecord>> {
        let query_lower = query.to_lowercase();
        let records = self.list(None)?;
        Ok(records
            .into_iter()
            .filter(|r| r.matches(&query_lower))
            .collect())
    }

    /// Records with exactly `priority`, newest first.
    pub fn get_by_priority(&self, priority: i64) -> Result<Vec<MemoryRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM memories WHERE priority = ?1 ORDER BY created_at DESC",
                RECORD_COLUMNS
            ))?;
            let records = stmt
                .query_map(params![priority], row_to_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
    }

    /// Change a record's priority; timestamps are left untouched.
    pub fn set_priority(&self, key: &str, priority: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE memories SET priority = ?2 WHERE key = ?1",
                params![key, priority],
            )?;
            Ok(rows > 0)
        })
    }

    /// Number of records.
    pub fn count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    /// Get statistics about the memory store.
    pub fn stats(&self) -> Result<MemoryStats> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;

            let by_category: BTreeMap<String, u64> = {
                let mut stmt =
                    conn.prepare("SELECT category, COUNT(*) FROM memories GROUP BY category")?;
                let rows = stmt.query_map([], |row| {
                    let category: String = row.get(0)?;
                    let count: i64 = row.get(1)?;
                    Ok((category, count as u64))
                })?;
                let result: BTreeMap<String, u64> = rows.collect::<rusqlite::Result<_>>()?;
                result
            };

            let total_relations: i64 =
                conn.query_row("SELECT COUNT(*) FROM relations", [], |row| row.get(0))?;

            Ok(MemoryStats {
                total: total as u64,
                by_category,
                total_relations: total_relations as u64,
            })
        })
    }

    /// Upsert fully-formed records in one transaction, keeping their timestamps.
    pub(crate) fn import_records(&self, records: &[MemoryRecord]) -> Result<usize> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO memories (key, value, category, priority, created_at, last_accessed)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        category = excluded.category,
                        priority = excluded.priority,
                        created_at = excluded.created_at,
                        last_accessed = excluded.last_accessed",
                )?;
                for record in records {
                    stmt.execute(params![
                        record.key,
                        record.value,
                        record.category,
                        record.priority,
                        format_datetime(&record.created_at),
                        format_datetime(&record.last_accessed_at),
                    ])?;
                }
            }
            tx.commit()?;
            Ok(records.len())
        })
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    match fs::create_dir_all(parent) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

pub(crate) fn get_record(conn: &Connection, key: &str) -> rusqlite::Result<Option<MemoryRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM memories WHERE key = ?1", RECORD_COLUMNS),
        params![key],
        row_to_record,
    )
    .optional()
}

pub(crate) fn record_exists(conn: &Connection, key: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM memories WHERE key = ?1)",
        params![key],
        |row| row.get(0),
    )
}

pub(crate) fn load_records(
    conn: &Connection,
    category: Option<&str>,
) -> rusqlite::Result<Vec<MemoryRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM memories
         WHERE (?1 IS NULL OR category = ?1)
         ORDER BY priority DESC, created_at DESC",
        RECORD_COLUMNS
    ))?;
    let records = stmt
        .query_map(params![category], row_to_record)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

/// Load records for `keys`, keeping the order of `keys` and skipping misses.
pub(crate) fn load_records_by_keys(
    conn: &Connection,
    keys: &[String],
) -> rusqlite::Result<Vec<MemoryRecord>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM memories WHERE key = ?1",
        RECORD_COLUMNS
    ))?;
    let mut records = Vec::with_capacity(keys.len());
    for key in keys {
        if let Some(record) = stmt.query_row(params![key], row_to_record).optional()? {
            records.push(record);
        }
    }
    Ok(records)
}

pub(crate) fn row_to_record(row: &Row) -> rusqlite::Result<MemoryRecord> {
    Ok(MemoryRecord {
        key: row.get(0)?,
        value: row.get(1)?,
        category: row.get(2)?,
        priority: row.get(3)?,
        created_at: parse_datetime(row, 4)?,
        last_accessed_at: parse_datetime(row, 5)?,
    })
}

/// Canonical stored form: fixed-width so text order equals time order.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Read an RFC 3339 column. Unparseable text is a conversion failure.
pub(crate) fn parse_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
