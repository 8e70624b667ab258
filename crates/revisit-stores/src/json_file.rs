//! JSON file backend.
//!
//! Layout under the data directory:
//!
//! ```text
//! .data/<kb>_params.json            long-term records
//! .data/<kb>_params.json.bak        previous records file
//! .progress/<kb>_progress.json      today's progress
//! review_engines/<kb>_engine.json   engine snapshot
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};

use revisit_core::error::{ErrorCode, ReviewError, ReviewResult};
use revisit_core::traits::{normalize_kb_name, PersistenceBackend};
use revisit_core::types::{DailyProgress, LongTermRecord, Snapshot};

/// Params file format version this backend reads and writes.
pub const PARAMS_VERSION: &str = "1.0";

#[derive(Debug, Serialize, Deserialize)]
struct ParamsFile<C> {
    version: Option<String>,
    #[serde(default)]
    last_updated: String,
    #[serde(default)]
    cards: C,
}

/// Backend storing each knowledge base in plain JSON files.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    data_dir: PathBuf,
}

impl JsonFileBackend {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn params_path(&self, kb: &str) -> PathBuf {
        self.data_dir
            .join(".data")
            .join(format!("{}_params.json", normalize_kb_name(kb)))
    }

    pub fn progress_path(&self, kb: &str) -> PathBuf {
        self.data_dir
            .join(".progress")
            .join(format!("{}_progress.json", normalize_kb_name(kb)))
    }

    pub fn snapshot_path(&self, kb: &str) -> PathBuf {
        self.data_dir
            .join("review_engines")
            .join(format!("{}_engine.json", normalize_kb_name(kb)))
    }

    fn read(path: &Path) -> ReviewResult<Option<String>> {
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(path)
            .map(Some)
            .map_err(|e| ReviewError::persistence_with_source(ErrorCode::PersLoadFailed, e))
    }

    fn write(path: &Path, content: &str) -> ReviewResult<()> {
        let save_err = |e: std::io::Error| ReviewError::persistence_with_source(ErrorCode::PersSaveFailed, e);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(save_err)?;
        }
        fs::write(path, content).map_err(save_err)
    }

    fn to_json<T: Serialize>(value: &T) -> ReviewResult<String> {
        serde_json::to_string_pretty(value).map_err(|e| ReviewError::persistence_with_source(ErrorCode::PersSaveFailed, e))
    }
}

impl PersistenceBackend for JsonFileBackend {
    fn name(&self) -> &'static str {
        "json"
    }

    fn load_records(&self, kb: &str) -> ReviewResult<Vec<LongTermRecord>> {
        let path = self.params_path(kb);
        let Some(content) = Self::read(&path)? else {
            return Ok(Vec::new());
        };

        let file: ParamsFile<BTreeMap<String, serde_json::Value>> = serde_json::from_str(&content)
            .map_err(|e| ReviewError::persistence_with_source(ErrorCode::PersLoadFailed, e))?;

        if file.version.as_deref() != Some(PARAMS_VERSION) {
            return Err(ReviewError::persistence_load(format!(
                "Unsupported params version {:?} in {}",
                file.version,
                path.display()
            )));
        }

        let mut records = Vec::with_capacity(file.cards.len());
        for (item_id, raw) in file.cards {
            match serde_json::from_value::<LongTermRecord>(raw) {
                Ok(mut record) => {
                    record.item_id = item_id;
                    records.push(record);
                }
                Err(e) => tracing::warn!(item_id = %item_id, error = %e, "Skipping unreadable long-term record"),
            }
        }
        Ok(records)
    }

    fn save_records(&self, kb: &str, records: &[LongTermRecord]) -> ReviewResult<()> {
        let path = self.params_path(kb);
        let file = ParamsFile {
            version: Some(PARAMS_VERSION.to_string()),
            last_updated: Local::now().date_naive().format("%Y-%m-%d").to_string(),
            cards: records
                .iter()
                .map(|r| (r.item_id.as_str(), r))
                .collect::<BTreeMap<&str, &LongTermRecord>>(),
        };
        let content = Self::to_json(&file)?;

        if path.exists() {
            let mut backup = path.clone().into_os_string();
            backup.push(".bak");
            let backup = PathBuf::from(backup);
            if backup.exists() {
                fs::remove_file(&backup)
                    .map_err(|e| ReviewError::persistence_with_source(ErrorCode::PersSaveFailed, e))?;
            }
            fs::rename(&path, &backup)
                .map_err(|e| ReviewError::persistence_with_source(ErrorCode::PersSaveFailed, e))?;
        }
        Self::write(&path, &content)?;

        tracing::debug!(kb = normalize_kb_name(kb), records = records.len(), path = %path.display(), "Saved long-term records");
        Ok(())
    }

    fn load_progress(&self, kb: &str) -> ReviewResult<Option<DailyProgress>> {
        let path = self.progress_path(kb);
        let Some(content) = Self::read(&path)? else {
            return Ok(None);
        };

        match serde_json::from_str::<DailyProgress>(&content) {
            Ok(progress) => Ok(Some(progress)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable progress file");
                Ok(None)
            }
        }
    }

    fn save_progress(&self, kb: &str, progress: &DailyProgress) -> ReviewResult<()> {
        Self::write(&self.progress_path(kb), &Self::to_json(progress)?)
    }

    fn load_snapshot(&self, kb: &str) -> ReviewResult<Option<Snapshot>> {
        let path = self.snapshot_path(kb);
        let Some(content) = Self::read(&path)? else {
            return Ok(None);
        };

        match Snapshot::decode_str(&content) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                tracing::warn!(path = %path.display(), code = e.code().as_str(), error = %e, "Ignoring unreadable engine snapshot");
                Ok(None)
            }
        }
    }

    fn save_snapshot(&self, kb: &str, snapshot: &Snapshot) -> ReviewResult<()> {
        Self::write(&self.snapshot_path(kb), &Self::to_json(snapshot)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_strip_json_suffix() {
        let backend = JsonFileBackend::new("/data");
        assert_eq!(backend.params_path("deck.json"), PathBuf::from("/data/.data/deck_params.json"));
        assert_eq!(backend.progress_path("deck"), PathBuf::from("/data/.progress/deck_progress.json"));
        assert_eq!(backend.snapshot_path("deck"), PathBuf::from("/data/review_engines/deck_engine.json"));
    }

    #[test]
    fn test_missing_files_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path());
        assert!(backend.load_records("deck").unwrap().is_empty());
        assert!(backend.load_progress("deck").unwrap().is_none());
        assert!(backend.load_snapshot("deck").unwrap().is_none());
    }
}
