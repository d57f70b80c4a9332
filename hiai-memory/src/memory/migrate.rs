//! Import of the legacy flat-file memory format.
//!
//! Older releases kept every memory in `memories.json` next to the database:
//! either one JSON array of records or one JSON object per line. On first
//! open at the default location the file is imported and then renamed to
//! `memories.json.backup`. It is never deleted.

use crate::config::LEGACY_BACKUP_SUFFIX;
use crate::error::Result;
use crate::memory::store::MemoryStore;
use crate::memory::types::{MemoryRecord, DEFAULT_CATEGORY};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One record as written by the legacy flat-file format.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRecord {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub last_accessed: Option<String>,
    #[serde(default)]
    pub priority: Option<serde_json::Number>,
}

impl LegacyRecord {
    /// Convert to a store record, filling defaults for absent fields.
    pub fn into_record(self, now: DateTime<Utc>) -> MemoryRecord {
        let created_at = parse_timestamp(self.timestamp.as_deref()).unwrap_or(now);
        let last_accessed_at = parse_timestamp(self.last_accessed.as_deref()).unwrap_or(created_at);
        let priority = self
            .priority
            .and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)))
            .unwrap_or(0);

        MemoryRecord {
            key: self.key,
            value: self.value,
            category: self
                .category
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            priority,
            created_at,
            last_accessed_at,
        }
    }
}

fn parse_timestamp(s: Option<&str>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse legacy content: a JSON array, or one JSON object per line.
pub fn parse_legacy(text: &str) -> Result<Vec<LegacyRecord>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(Into::into))
        .collect()
}

/// Import every record in `path` and rename the file aside.
///
/// Returns the number of imported records.
pub fn import_legacy_file(store: &MemoryStore, path: &Path) -> Result<usize> {
    let text = fs::read_to_string(path)?;
    let now = store.next_timestamp()?;
    let records: Vec<MemoryRecord> = parse_legacy(&text)?
        .into_iter()
        .map(|legacy| legacy.into_record(now))
        .collect();

    let imported = store.import_records(&records)?;
    fs::rename(path, backup_path(path))?;
    Ok(imported)
}

/// Best-effort import used on open. Failures are logged, never returned.
pub(crate) fn migrate_legacy_file(store: &MemoryStore, path: &Path) -> Option<usize> {
    match import_legacy_file(store, path) {
        Ok(count) => {
            info!(count, path = %path.display(), "Migrated legacy memories");
            Some(count)
        }
        Err(crate::error::Error::Io(e)) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No legacy memory file");
            None
        }
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Legacy memory import failed");
            None
        }
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(LEGACY_BACKUP_SUFFIX);
    PathBuf::from(name)
}
