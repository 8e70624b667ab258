//! In-process persistence backend.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{ReviewError, ReviewResult};
use crate::traits::{normalize_kb_name, PersistenceBackend};
use crate::types::{DailyProgress, LongTermRecord, Snapshot};

#[derive(Debug, Default)]
struct Contents {
    records: HashMap<String, Vec<LongTermRecord>>,
    progress: HashMap<String, DailyProgress>,
    snapshots: HashMap<String, Snapshot>,
}

/// Backend that keeps everything in memory. Data is lost on drop.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: Mutex<Contents>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ReviewResult<MutexGuard<'_, Contents>> {
        self.inner
            .lock()
            .map_err(|e| ReviewError::Internal(format!("memory backend lock poisoned: {}", e)))
    }
}

impl PersistenceBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load_records(&self, kb: &str) -> ReviewResult<Vec<LongTermRecord>> {
        let contents = self.lock()?;
        Ok(contents
            .records
            .get(normalize_kb_name(kb))
            .cloned()
            .unwrap_or_default())
    }

    fn save_records(&self, kb: &str, records: &[LongTermRecord]) -> ReviewResult<()> {
        let mut contents = self.lock()?;
        contents
            .records
            .insert(normalize_kb_name(kb).to_string(), records.to_vec());
        Ok(())
    }

    fn load_progress(&self, kb: &str) -> ReviewResult<Option<DailyProgress>> {
        let contents = self.lock()?;
        Ok(contents.progress.get(normalize_kb_name(kb)).cloned())
    }

    fn save_progress(&self, kb: &str, progress: &DailyProgress) -> ReviewResult<()> {
        let mut contents = self.lock()?;
        contents
            .progress
            .insert(normalize_kb_name(kb).to_string(), progress.clone());
        Ok(())
    }

    fn load_snapshot(&self, kb: &str) -> ReviewResult<Option<Snapshot>> {
        let contents = self.lock()?;
        Ok(contents.snapshots.get(normalize_kb_name(kb)).cloned())
    }

    fn save_snapshot(&self, kb: &str, snapshot: &Snapshot) -> ReviewResult<()> {
        let mut contents = self.lock()?;
        contents
            .snapshots
            .insert(normalize_kb_name(kb).to_string(), snapshot.clone());
        Ok(())
    }
}
