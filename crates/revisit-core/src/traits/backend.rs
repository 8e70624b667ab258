//! Persistence backend trait.

use std::sync::Arc;

use crate::error::ReviewResult;
use crate::types::{DailyProgress, LongTermRecord, Snapshot};

/// Storage for everything a review session keeps between runs.
///
/// Every method is keyed by knowledge-base name. Implementations should pass
/// names through [`normalize_kb_name`] so `"spanish"` and `"spanish.json"`
/// address the same data.
#[cfg_attr(test, mockall::automock)]
pub trait PersistenceBackend: Send + Sync {
    /// Short backend identifier for logs.
    fn name(&self) -> &'static str;

    /// Load all cross-day records, each with its `item_id` set.
    fn load_records(&self, kb: &str) -> ReviewResult<Vec<LongTermRecord>>;

    /// Replace the stored records of a knowledge base.
    fn save_records(&self, kb: &str, records: &[LongTermRecord]) -> ReviewResult<()>;

    /// Load the most recent daily progress, if any.
    fn load_progress(&self, kb: &str) -> ReviewResult<Option<DailyProgress>>;

    fn save_progress(&self, kb: &str, progress: &DailyProgress) -> ReviewResult<()>;

    /// Load the saved engine snapshot, if any.
    fn load_snapshot(&self, kb: &str) -> ReviewResult<Option<Snapshot>>;

    fn save_snapshot(&self, kb: &str, snapshot: &Snapshot) -> ReviewResult<()>;
}

/// Strip a trailing `.json` from a knowledge-base file name.
pub fn normalize_kb_name(kb: &str) -> &str {
    kb.strip_suffix(".json").unwrap_or(kb)
}

impl<B: PersistenceBackend + ?Sized> PersistenceBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn load_records(&self, kb: &str) -> ReviewResult<Vec<LongTermRecord>> {
        (**self).load_records(kb)
    }

    fn save_records(&self, kb: &str, records: &[LongTermRecord]) -> ReviewResult<()> {
        (**self).save_records(kb, records)
    }

    fn load_progress(&self, kb: &str) -> ReviewResult<Option<DailyProgress>> {
        (**self).load_progress(kb)
    }

    fn save_progress(&self, kb: &str, progress: &DailyProgress) -> ReviewResult<()> {
        (**self).save_progress(kb, progress)
    }

    fn load_snapshot(&self, kb: &str) -> ReviewResult<Option<Snapshot>> {
        (**self).load_snapshot(kb)
    }

    fn save_snapshot(&self, kb: &str, snapshot: &Snapshot) -> ReviewResult<()> {
        (**self).save_snapshot(kb, snapshot)
    }
}

impl<B: PersistenceBackend + ?Sized> PersistenceBackend for Arc<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn load_records(&self, kb: &str) -> ReviewResult<Vec<LongTermRecord>> {
        (**self).load_records(kb)
    }

    fn save_records(&self, kb: &str, records: &[LongTermRecord]) -> ReviewResult<()> {
        (**self).save_records(kb, records)
    }

    fn load_progress(&self, kb: &str) -> ReviewResult<Option<DailyProgress>> {
        (**self).load_progress(kb)
    }

    fn save_progress(&self, kb: &str, progress: &DailyProgress) -> ReviewResult<()> {
        (**self).save_progress(kb, progress)
    }

    fn load_snapshot(&self, kb: &str) -> ReviewResult<Option<Snapshot>> {
        (**self).load_snapshot(kb)
    }

    fn save_snapshot(&self, kb: &str, snapshot: &Snapshot) -> ReviewResult<()> {
        (**self).save_snapshot(kb, snapshot)
    }
}
