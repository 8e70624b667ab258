//! Reconciling engine state with a reloaded item list, and snapshot I/O.

use std::collections::HashSet;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::ShortTermEngine;
use crate::config::ReinsertionConfig;
use crate::types::{ExportedItemState, ItemId, ItemState, ProgressExport, ReviewItem, Snapshot};

/// Result of [`ShortTermEngine::merge_with_items`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub added: Vec<ItemId>,
    pub removed_count: usize,
}

impl<R: Rng> ShortTermEngine<R> {
    /// Bring the engine in line with the current item list.
    ///
    /// New ids get a fresh state and join the end of the queue. Ids no longer
    /// listed lose their state and queue entry; a removed mastered item lowers
    /// the mastered count.
    pub fn merge_with_items(&mut self, items: &[ReviewItem]) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for item in items {
            if !self.states.contains_key(&item.id) {
                self.states.insert(item.id.clone(), ItemState::new(item.id.clone()));
                self.sequence.push(item.id.clone());
                outcome.added.push(item.id.clone());
            }
        }

        let listed: HashSet<&str> = items.iter().map(|i| i.id.as_str()).collect();
        let vanished: Vec<ItemId> = self
            .states
            .keys()
            .filter(|id| !listed.contains(id.as_str()))
            .cloned()
            .collect();

        for id in &vanished {
            if let Some(state) = self.states.remove(id) {
                if state.mastered && self.mastered_count > 0 {
                    self.mastered_count -= 1;
                }
                outcome.removed_count += 1;
            }
            self.sequence.retain(|queued| queued != id);
        }

        self.total_count = self.states.len();

        if !outcome.added.is_empty() || outcome.removed_count > 0 {
            tracing::info!(
                added = outcome.added.len(),
                removed = outcome.removed_count,
                total = self.total_count,
                "Merged engine state with item list"
            );
        }

        outcome
    }

    /// Full engine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            item_states: self.states.clone(),
            dynamic_sequence: self.sequence.clone(),
            mastered_items_count: self.mastered_count,
            total_items_count: self.total_count,
        }
    }

    /// Rebuild an engine from a snapshot.
    ///
    /// Queue entries without a state are dropped; everything else is taken
    /// as saved.
    pub fn restore(snapshot: Snapshot, reinsertion: ReinsertionConfig, rng: R) -> Self {
        let Snapshot {
            mut item_states,
            dynamic_sequence,
            mastered_items_count,
            total_items_count,
        } = snapshot;

        for (id, state) in item_states.iter_mut() {
            if state.item_id != *id {
                state.item_id = id.clone();
            }
        }

        let before = dynamic_sequence.len();
        let sequence: Vec<ItemId> = dynamic_sequence
            .into_iter()
            .filter(|id| item_states.contains_key(id))
            .collect();
        if sequence.len() != before {
            tracing::warn!(
                dropped = before - sequence.len(),
                "Snapshot queue referenced unknown items"
            );
        }

        Self {
            states: item_states,
            sequence,
            mastered_count: mastered_items_count,
            total_count: total_items_count,
            reinsertion,
            rng,
        }
    }

    /// Rebuild an engine from untyped JSON.
    ///
    /// Accepts the snapshot format and the `questionMap` export format. Input
    /// that fits neither yields an empty engine.
    pub fn restore_value(value: serde_json::Value, reinsertion: ReinsertionConfig, rng: R) -> Self {
        match Snapshot::decode(value) {
            Ok(snapshot) => Self::restore(snapshot, reinsertion, rng),
            Err(e) => {
                tracing::warn!(code = e.code().as_str(), error = %e, "Starting with an empty engine");
                Self::with_rng(reinsertion, rng)
            }
        }
    }

    /// State in the `questionMap` export format.
    pub fn export(&self) -> ProgressExport {
        ProgressExport {
            question_map: self
                .states
                .iter()
                .map(|(id, state)| (id.clone(), ExportedItemState::from(state)))
                .collect(),
            mastered_items: Some(self.mastered_count),
            total_items: self.total_count,
            dynamic_sequence: self.sequence.clone(),
            export_date: Utc::now(),
        }
    }
}
