//! Cross-day records of one knowledge base.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::LongTermScheduler;
use crate::error::ReviewResult;
use crate::traits::{normalize_kb_name, PersistenceBackend};
use crate::types::{ItemId, LongTermRecord, ReviewItem};

/// All [`LongTermRecord`]s of a knowledge base, keyed by item id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBook {
    kb_name: String,
    records: BTreeMap<ItemId, LongTermRecord>,
}

impl RecordBook {
    pub fn new(kb_name: impl AsRef<str>) -> Self {
        Self {
            kb_name: normalize_kb_name(kb_name.as_ref()).to_string(),
            records: BTreeMap::new(),
        }
    }

    /// Build a book from stored records. Records without an id are dropped.
    pub fn from_records(kb_name: impl AsRef<str>, records: Vec<LongTermRecord>) -> Self {
        let mut book = Self::new(kb_name);
        for record in records {
            if record.item_id.is_empty() {
                tracing::warn!(kb = %book.kb_name, "Dropping long-term record without an item id");
                continue;
            }
            book.records.insert(record.item_id.clone(), record);
        }
        book
    }

    pub fn load<B: PersistenceBackend + ?Sized>(backend: &B, kb_name: &str) -> ReviewResult<Self> {
        let records = backend.load_records(kb_name)?;
        let book = Self::from_records(kb_name, records);
        tracing::debug!(kb = %book.kb_name, backend = backend.name(), records = book.len(), "Loaded long-term records");
        Ok(book)
    }

    pub fn save<B: PersistenceBackend + ?Sized>(&self, backend: &B) -> ReviewResult<()> {
        backend.save_records(&self.kb_name, &self.to_vec())
    }

    /// Create fresh records for items the book has not seen. Returns their ids.
    pub fn sync_items(&mut self, items: &[ReviewItem], scheduler: &LongTermScheduler, date: NaiveDate) -> Vec<ItemId> {
        let mut created = Vec::new();
        for item in items {
            if !self.records.contains_key(&item.id) {
                self.records
                    .insert(item.id.clone(), scheduler.new_record(item.id.clone(), date));
                created.push(item.id.clone());
            }
        }
        if !created.is_empty() {
            tracing::info!(kb = %self.kb_name, created = created.len(), "Created long-term records for new items");
        }
        created
    }

    pub fn get(&self, item_id: &str) -> Option<&LongTermRecord> {
        self.records.get(item_id)
    }

    pub fn get_mut(&mut self, item_id: &str) -> Option<&mut LongTermRecord> {
        self.records.get_mut(item_id)
    }

    /// Record for `item_id`, created on first use.
    pub fn get_or_create(&mut self, item_id: &str, scheduler: &LongTermScheduler, date: NaiveDate) -> &mut LongTermRecord {
        self.records
            .entry(item_id.to_string())
            .or_insert_with(|| scheduler.new_record(item_id, date))
    }

    /// Records of the listed items, in item order.
    pub fn active_records(&self, items: &[ReviewItem]) -> Vec<LongTermRecord> {
        items
            .iter()
            .filter_map(|item| self.records.get(&item.id))
            .cloned()
            .collect()
    }

    pub fn to_vec(&self) -> Vec<LongTermRecord> {
        self.records.values().cloned().collect()
    }

    pub fn kb_name(&self) -> &str {
        &self.kb_name
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
