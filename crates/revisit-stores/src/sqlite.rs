//! SQLite backend.
//!
//! Records get a row each; progress and snapshots are stored as JSON documents,
//! one row per knowledge base.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use revisit_core::error::{ErrorCode, ReviewError, ReviewResult};
use revisit_core::traits::{normalize_kb_name, PersistenceBackend};
use revisit_core::types::{DailyProgress, LongTermRecord, Snapshot};

fn load_err(e: rusqlite::Error) -> ReviewError {
    ReviewError::persistence_with_source(ErrorCode::PersLoadFailed, e)
}

fn save_err(e: rusqlite::Error) -> ReviewError {
    ReviewError::persistence_with_source(ErrorCode::PersSaveFailed, e)
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

fn parse_date(raw: Option<String>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

/// SQLite-backed persistence for review data.
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open (or create) the database at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> ReviewResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(load_err)?;
        let backend = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        backend.init_schema()?;
        Ok(backend)
    }

    /// Create an in-memory database (useful for testing).
    pub fn in_memory() -> ReviewResult<Self> {
        let conn = Connection::open_in_memory().map_err(load_err)?;
        let backend = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        backend.init_schema()?;
        Ok(backend)
    }

    fn lock(&self) -> ReviewResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ReviewError::Internal(format!("sqlite connection lock poisoned: {}", e)))
    }

    fn init_schema(&self) -> ReviewResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS long_term_records (
                kb_name TEXT NOT NULL,
                item_id TEXT NOT NULL,
                consecutive_days INTEGER NOT NULL DEFAULT 0,
                interval_days INTEGER NOT NULL DEFAULT 1,
                easiness_factor REAL NOT NULL DEFAULT 2.5,
                due_date TEXT,
                last_reviewed TEXT,
                created_at TEXT,
                mastered INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (kb_name, item_id)
            );

            CREATE INDEX IF NOT EXISTS idx_long_term_records_due ON long_term_records(kb_name, due_date);

            CREATE TABLE IF NOT EXISTS daily_progress (
                kb_name TEXT PRIMARY KEY,
                date TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS engine_snapshots (
                kb_name TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )
        .map_err(load_err)?;

        Ok(())
    }

    fn load_document(&self, table: &str, kb: &str) -> ReviewResult<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT body FROM {} WHERE kb_name = ?1", table),
            params![normalize_kb_name(kb)],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(load_err)
    }
}

impl PersistenceBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn load_records(&self, kb: &str) -> ReviewResult<Vec<LongTermRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT item_id, consecutive_days, interval_days, easiness_factor,
                        due_date, last_reviewed, created_at, mastered
                 FROM long_term_records
                 WHERE kb_name = ?1
                 ORDER BY item_id",
            )
            .map_err(load_err)?;

        let rows = stmt
            .query_map(params![normalize_kb_name(kb)], |row| {
                Ok(LongTermRecord {
                    item_id: row.get(0)?,
                    consecutive_day_count: row.get(1)?,
                    interval_days: row.get(2)?,
                    easiness_factor: row.get(3)?,
                    due_date: parse_date(row.get(4)?),
                    last_reviewed: parse_date(row.get(5)?),
                    created_at: parse_date(row.get(6)?),
                    mastered: row.get::<_, i64>(7)? != 0,
                })
            })
            .map_err(load_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(load_err)
    }

    fn save_records(&self, kb: &str, records: &[LongTermRecord]) -> ReviewResult<()> {
        let kb = normalize_kb_name(kb);
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(save_err)?;

        tx.execute("DELETE FROM long_term_records WHERE kb_name = ?1", params![kb])
            .map_err(save_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO long_term_records
                        (kb_name, item_id, consecutive_days, interval_days, easiness_factor,
                         due_date, last_reviewed, created_at, mastered)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )
                .map_err(save_err)?;

            for record in records {
                stmt.execute(params![
                    kb,
                    record.item_id,
                    record.consecutive_day_count,
                    record.interval_days,
                    record.easiness_factor,
                    format_date(record.due_date),
                    format_date(record.last_reviewed),
                    format_date(record.created_at),
                    record.mastered as i64,
                ])
                .map_err(save_err)?;
            }
        }
        tx.commit().map_err(save_err)?;

        tracing::debug!(kb, records = records.len(), "Saved long-term records to sqlite");
        Ok(())
    }

    fn load_progress(&self, kb: &str) -> ReviewResult<Option<DailyProgress>> {
        let Some(body) = self.load_document("daily_progress", kb)? else {
            return Ok(None);
        };
        match serde_json::from_str(&body) {
            Ok(progress) => Ok(Some(progress)),
            Err(e) => {
                tracing::warn!(kb, error = %e, "Ignoring unreadable stored progress");
                Ok(None)
            }
        }
    }

    fn save_progress(&self, kb: &str, progress: &DailyProgress) -> ReviewResult<()> {
        let body = serde_json::to_string(progress)
            .map_err(|e| ReviewError::persistence_with_source(ErrorCode::PersSaveFailed, e))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO daily_progress (kb_name, date, body, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(kb_name) DO UPDATE SET
                date = excluded.date,
                body = excluded.body,
                updated_at = excluded.updated_at",
            params![
                normalize_kb_name(kb),
                progress.date.format("%Y-%m-%d").to_string(),
                body,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(save_err)?;
        Ok(())
    }

    fn load_snapshot(&self, kb: &str) -> ReviewResult<Option<Snapshot>> {
        let Some(body) = self.load_document("engine_snapshots", kb)? else {
            return Ok(None);
        };
        match Snapshot::decode_str(&body) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                tracing::warn!(kb, code = e.code().as_str(), error = %e, "Ignoring unreadable stored snapshot");
                Ok(None)
            }
        }
    }

    fn save_snapshot(&self, kb: &str, snapshot: &Snapshot) -> ReviewResult<()> {
        let body = serde_json::to_string(snapshot)
            .map_err(|e| ReviewError::persistence_with_source(ErrorCode::PersSaveFailed, e))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO engine_snapshots (kb_name, body, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(kb_name) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at",
            params![normalize_kb_name(kb), body, Utc::now().to_rfc3339()],
        )
        .map_err(save_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revisit_core::types::ItemState;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_records_replace_previous_set() {
        let backend = SqliteBackend::in_memory().unwrap();
        let mut a = LongTermRecord::new("a", date("2024-01-01"));
        a.due_date = Some(date("2024-01-02"));
        a.easiness_factor = 2.1;
        let b = LongTermRecord::new("b", date("2024-01-01"));

        backend.save_records("deck.json", &[a.clone(), b]).unwrap();
        backend.save_records("deck", &[a.clone()]).unwrap();

        let loaded = backend.load_records("deck").unwrap();
        assert_eq!(loaded, vec![a]);
    }

    #[test]
    fn test_knowledge_bases_are_isolated() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend
            .save_records("one", &[LongTermRecord::new("a", date("2024-01-01"))])
            .unwrap();
        assert!(backend.load_records("two").unwrap().is_empty());
        assert!(backend.load_progress("one").unwrap().is_none());
    }

    #[test]
    fn test_progress_upsert() {
        let backend = SqliteBackend::in_memory().unwrap();
        let mut progress = DailyProgress::new(date("2024-01-01"), vec!["a".into()]);
        backend.save_progress("deck", &progress).unwrap();

        progress.date = date("2024-01-02");
        backend.save_progress("deck", &progress).unwrap();

        let loaded = backend.load_progress("deck").unwrap().unwrap();
        assert_eq!(loaded.date, date("2024-01-02"));
        assert_eq!(loaded.selected_card_ids, vec!["a"]);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let backend = SqliteBackend::in_memory().unwrap();
        assert!(backend.load_snapshot("deck").unwrap().is_none());

        let mut snapshot = Snapshot::default();
        snapshot.item_states.insert("a".into(), ItemState::new("a"));
        snapshot.item_states.insert("b".into(), ItemState::new("b"));
        snapshot.dynamic_sequence = vec!["b".into(), "a".into()];
        snapshot.total_items_count = 2;

        backend.save_snapshot("deck.json", &snapshot).unwrap();
        assert_eq!(backend.load_snapshot("deck").unwrap(), Some(snapshot.clone()));

        snapshot.dynamic_sequence.pop();
        backend.save_snapshot("deck", &snapshot).unwrap();
        assert_eq!(backend.load_snapshot("deck").unwrap(), Some(snapshot));
    }

    #[test]
    fn test_snapshot_accepts_export_body() {
        let backend = SqliteBackend::in_memory().unwrap();
        {
            let conn = backend.lock().unwrap();
            conn.execute(
                "INSERT INTO engine_snapshots (kb_name, body, updated_at) VALUES ('deck', ?1, '')",
                params![r#"{"questionMap": [["a", {"_reviewCount": 1, "_mastered": true}]], "totalItems": 1}"#],
            )
            .unwrap();
        }

        let snapshot = backend.load_snapshot("deck").unwrap().unwrap();
        assert!(snapshot.item_states["a"].mastered);
        assert_eq!(snapshot.mastered_items_count, 1);
    }

    #[test]
    fn test_unreadable_snapshot_is_ignored() {
        let backend = SqliteBackend::in_memory().unwrap();
        {
            let conn = backend.lock().unwrap();
            conn.execute(
                "INSERT INTO engine_snapshots (kb_name, body, updated_at) VALUES ('deck', '{\"item_states\": 3}', '')",
                [],
            )
            .unwrap();
        }
        assert!(backend.load_snapshot("deck").unwrap().is_none());
    }
}
