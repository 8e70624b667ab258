//! Session-scoped review queue.
//!
//! [`ShortTermEngine`] owns the working order of not-yet-mastered items and
//! the four-step learning machine of each item. A forgotten item is pushed a
//! few positions back in the queue; after a forget it needs two recognitions
//! before it is mastered for the session.

mod reconcile;

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::ReinsertionConfig;
use crate::error::{ReviewError, ReviewResult};
use crate::types::{ItemId, ItemState, ItemStatePatch, LearningStep, ReviewAction, ReviewItem, Snapshot};

pub use reconcile::MergeOutcome;

/// Which transition an action triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionBranch {
    /// Recognized on its very first review.
    FirstTimeMastered,
    /// First recognition after a forget; item goes back into the queue.
    RecognizedAfterForgotten,
    /// Second recognition in a row after a forget.
    SecondRecognitionMastered,
    /// Recognized while already mastered.
    MasteredNoAction,
    /// Recognized in a step that has no transition.
    UnexpectedStep,
    /// Forgotten; reset to the first recovery step.
    ForgottenReset,
}

/// Outcome of [`ShortTermEngine::apply_action`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub item_id: ItemId,
    pub branch: ActionBranch,
    /// State after the action.
    pub state: ItemState,
    /// Position drawn before clamping to the queue length.
    pub raw_index: Option<usize>,
    /// Position the item was reinserted at.
    pub inserted_at: Option<usize>,
    /// Head of the queue after the action.
    pub next_item: Option<ItemId>,
}

/// Progress summary of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineProgress {
    pub total: usize,
    pub mastered: usize,
    pub remaining: usize,
    pub percent_complete: f64,
}

/// Queue statistics, relative to the recorded total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceStats {
    pub sequence_length: usize,
    pub mastered_items: usize,
    pub total_items: usize,
    pub remaining_items: usize,
    pub mastered_percentage: f64,
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// In-session scheduler for one knowledge base.
///
/// Generic over the random source so tests can pin every reinsertion draw.
#[derive(Debug, Clone)]
pub struct ShortTermEngine<R: Rng = StdRng> {
    states: BTreeMap<ItemId, ItemState>,
    sequence: Vec<ItemId>,
    mastered_count: usize,
    total_count: usize,
    reinsertion: ReinsertionConfig,
    rng: R,
}

impl ShortTermEngine<StdRng> {
    /// Create an empty engine drawing from OS entropy.
    pub fn new(reinsertion: ReinsertionConfig) -> Self {
        Self::with_rng(reinsertion, StdRng::from_entropy())
    }

    /// Create an empty engine with a deterministic random source.
    pub fn seeded(reinsertion: ReinsertionConfig, seed: u64) -> Self {
        Self::with_rng(reinsertion, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ShortTermEngine<R> {
    /// Create an empty engine with the given random source.
    pub fn with_rng(reinsertion: ReinsertionConfig, rng: R) -> Self {
        Self {
            states: BTreeMap::new(),
            sequence: Vec::new(),
            mastered_count: 0,
            total_count: 0,
            reinsertion,
            rng,
        }
    }

    /// Load items, optionally restoring per-item state from a snapshot.
    ///
    /// Replaces all current state. A snapshot's sequence is not replayed
    /// verbatim: it keeps its saved order after dropping unknown, duplicate
    /// and mastered ids, and non-mastered items it does not mention are
    /// appended, so the queue always holds exactly the non-mastered items.
    /// Without a usable saved order the queue is shuffled.
    pub fn initialize(&mut self, items: &[ReviewItem], saved: Option<&Snapshot>) {
        self.states.clear();
        self.sequence.clear();

        let mut fresh_order: Vec<ItemId> = Vec::with_capacity(items.len());
        for item in items {
            if self.states.contains_key(&item.id) {
                tracing::warn!(item_id = %item.id, "Duplicate item id, keeping the first");
                continue;
            }
            let state = saved
                .and_then(|s| s.item_states.get(&item.id))
                .map(|s| ItemState {
                    item_id: item.id.clone(),
                    ..s.clone()
                })
                .unwrap_or_else(|| ItemState::new(item.id.clone()));

            if !state.mastered {
                fresh_order.push(item.id.clone());
            }
            self.states.insert(item.id.clone(), state);
        }

        self.total_count = self.states.len();
        self.mastered_count = match saved {
            Some(snapshot) => snapshot.mastered_items_count,
            None => self.states.values().filter(|s| s.mastered).count(),
        };

        let saved_order = saved.map(|s| self.usable_order(&s.dynamic_sequence)).unwrap_or_default();

        if saved_order.is_empty() {
            fresh_order.shuffle(&mut self.rng);
            self.sequence = fresh_order;
        } else {
            let mut order = saved_order;
            for id in fresh_order {
                if !order.contains(&id) {
                    order.push(id);
                }
            }
            self.sequence = order;
        }

        tracing::debug!(
            total = self.total_count,
            mastered = self.mastered_count,
            queued = self.sequence.len(),
            restored = saved.is_some(),
            "Initialized short-term engine"
        );
    }

    /// Saved ids that can go back into the queue, in saved order.
    fn usable_order(&self, saved: &[ItemId]) -> Vec<ItemId> {
        let mut order: Vec<ItemId> = Vec::with_capacity(saved.len());
        for id in saved {
            let queueable = self.states.get(id).is_some_and(|s| !s.mastered);
            if queueable && !order.contains(id) {
                order.push(id.clone());
            }
        }
        order
    }

    /// Head of the queue.
    pub fn next_item(&self) -> Option<&ItemId> {
        self.sequence.first()
    }

    /// Record a learner outcome for `item_id`.
    pub fn apply_action(&mut self, item_id: &str, action: ReviewAction) -> ReviewResult<ActionResult> {
        if !self.states.contains_key(item_id) {
            return Err(ReviewError::item_not_found(item_id));
        }

        // Callers act on the head; anything else is removed in place.
        let removed_at = self.sequence.iter().position(|id| id == item_id);
        if let Some(pos) = removed_at {
            self.sequence.remove(pos);
        }

        let (step, review_count) = {
            let state = self.state_mut(item_id)?;
            state.review_count += 1;
            (state.learning_step, state.review_count)
        };

        let mut raw_index = None;
        let branch = match action {
            ReviewAction::Recognized => {
                {
                    let state = self.state_mut(item_id)?;
                    state.consecutive_correct += 1;
                    state.correct_count += 1;
                }

                if review_count == 1 {
                    self.master(item_id)?;
                    ActionBranch::FirstTimeMastered
                } else {
                    match step {
                        LearningStep::AfterForgotten => {
                            self.state_mut(item_id)?.learning_step = LearningStep::AfterRecognized;
                            raw_index = Some(self.reinsertion.recognized.draw(&mut self.rng));
                            ActionBranch::RecognizedAfterForgotten
                        }
                        LearningStep::AfterRecognized => {
                            self.master(item_id)?;
                            ActionBranch::SecondRecognitionMastered
                        }
                        LearningStep::Mastered => ActionBranch::MasteredNoAction,
                        LearningStep::Initial => {
                            // Only reachable through overridden state; keep the
                            // item queued where it was.
                            if let Some(pos) = removed_at {
                                self.sequence.insert(pos, item_id.to_string());
                            }
                            ActionBranch::UnexpectedStep
                        }
                    }
                }
            }
            ReviewAction::Forgotten => {
                let state = self.state_mut(item_id)?;
                state.wrong_count += 1;
                state.consecutive_correct = 0;
                // The mastered counter is not decremented here.
                state.mastered = false;
                state.learning_step = LearningStep::AfterForgotten;
                raw_index = Some(self.reinsertion.forgotten.draw(&mut self.rng));
                ActionBranch::ForgottenReset
            }
        };

        let inserted_at = raw_index.map(|raw| {
            let index = raw.min(self.sequence.len());
            self.sequence.insert(index, item_id.to_string());
            index
        });

        let state = self.state_mut(item_id)?.clone();
        tracing::debug!(
            item_id,
            action = %action,
            branch = ?branch,
            review_count = state.review_count,
            inserted_at = ?inserted_at,
            "Applied review action"
        );

        Ok(ActionResult {
            item_id: item_id.to_string(),
            branch,
            state,
            raw_index,
            inserted_at,
            next_item: self.sequence.first().cloned(),
        })
    }

    fn state_mut(&mut self, item_id: &str) -> ReviewResult<&mut ItemState> {
        self.states
            .get_mut(item_id)
            .ok_or_else(|| ReviewError::item_not_found(item_id))
    }

    fn master(&mut self, item_id: &str) -> ReviewResult<()> {
        let state = self.state_mut(item_id)?;
        state.mastered = true;
        state.learning_step = LearningStep::Mastered;
        self.mastered_count += 1;
        Ok(())
    }

    /// Reshuffle the queue from every non-mastered item.
    pub fn reset(&mut self) {
        let mut order: Vec<ItemId> = self
            .states
            .values()
            .filter(|s| !s.mastered)
            .map(|s| s.item_id.clone())
            .collect();
        order.shuffle(&mut self.rng);
        self.sequence = order;
        tracing::info!(queued = self.sequence.len(), "Review queue reset");
    }

    /// Overwrite selected fields of an item's state.
    ///
    /// Becoming mastered counts towards the mastered total and leaves the
    /// queue; losing mastery re-queues the item without touching the total.
    pub fn override_state(&mut self, item_id: &str, patch: ItemStatePatch) -> ReviewResult<ItemState> {
        let state = self.state_mut(item_id)?;
        let was_mastered = state.mastered;

        if let Some(v) = patch.review_count {
            state.review_count = v;
        }
        if let Some(v) = patch.consecutive_correct {
            state.consecutive_correct = v;
        }
        if let Some(v) = patch.learning_step {
            state.learning_step = v;
        }
        if let Some(v) = patch.mastered {
            state.mastered = v;
        }
        if let Some(v) = patch.wrong_count {
            state.wrong_count = v;
        }
        if let Some(v) = patch.correct_count {
            state.correct_count = v;
        }
        let updated = state.clone();

        match (was_mastered, updated.mastered) {
            (false, true) => {
                self.mastered_count += 1;
                self.sequence.retain(|id| id != item_id);
            }
            (true, false) => {
                if !self.sequence.iter().any(|id| id == item_id) {
                    self.sequence.push(item_id.to_string());
                }
            }
            _ => {}
        }

        Ok(updated)
    }

    pub fn item_state(&self, item_id: &str) -> Option<&ItemState> {
        self.states.get(item_id)
    }

    pub fn item_states(&self) -> &BTreeMap<ItemId, ItemState> {
        &self.states
    }

    /// Current working order.
    pub fn sequence(&self) -> &[ItemId] {
        &self.sequence
    }

    pub fn mastered_count(&self) -> usize {
        self.mastered_count
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn reinsertion(&self) -> &ReinsertionConfig {
        &self.reinsertion
    }

    /// Progress against the items currently known to the engine.
    pub fn progress(&self) -> EngineProgress {
        let total = self.states.len();
        EngineProgress {
            total,
            mastered: self.mastered_count,
            remaining: self.sequence.len(),
            percent_complete: percentage(self.mastered_count, total),
        }
    }

    pub fn sequence_stats(&self) -> SequenceStats {
        SequenceStats {
            sequence_length: self.sequence.len(),
            mastered_items: self.mastered_count,
            total_items: self.total_count,
            remaining_items: self.sequence.len(),
            mastered_percentage: percentage(self.mastered_count, self.total_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PositionRange;

    fn items(ids: &[&str]) -> Vec<ReviewItem> {
        ids.iter().map(|id| ReviewItem::new(*id, format!("q-{}", id), format!("a-{}", id))).collect()
    }

    fn with_order(ids: &[&str]) -> Snapshot {
        Snapshot {
            dynamic_sequence: ids.iter().map(|s| s.to_string()).collect(),
            ..Snapshot::default()
        }
    }

    fn engine(ids: &[&str], order: &[&str]) -> ShortTermEngine {
        let mut engine = ShortTermEngine::seeded(ReinsertionConfig::default(), 7);
        engine.initialize(&items(ids), Some(&with_order(order)));
        engine
    }

    fn seq(engine: &ShortTermEngine) -> Vec<&str> {
        engine.sequence().iter().map(String::as_str).collect()
    }

    #[test]
    fn test_forgotten_on_short_queue_goes_to_end() {
        let mut engine = engine(&["a", "b", "c"], &["b", "a", "c"]);
        assert_eq!(engine.next_item().map(String::as_str), Some("b"));

        let result = engine.apply_action("b", ReviewAction::Forgotten).unwrap();
        assert_eq!(result.branch, ActionBranch::ForgottenReset);
        assert_eq!(result.state.review_count, 1);
        assert_eq!(result.state.wrong_count, 1);
        assert_eq!(result.state.learning_step, LearningStep::AfterForgotten);
        assert!((8..=12).contains(&result.raw_index.unwrap()));
        assert_eq!(result.inserted_at, Some(2));
        assert_eq!(seq(&engine), vec!["a", "c", "b"]);
        assert_eq!(result.next_item.as_deref(), Some("a"));
    }

    #[test]
    fn test_first_recognition_masters() {
        let mut engine = engine(&["a", "b"], &["a", "b"]);
        let result = engine.apply_action("a", ReviewAction::Recognized).unwrap();

        assert_eq!(result.branch, ActionBranch::FirstTimeMastered);
        assert!(result.state.mastered);
        assert_eq!(result.state.learning_step, LearningStep::Mastered);
        assert_eq!(result.inserted_at, None);
        assert_eq!(engine.mastered_count(), 1);
        assert_eq!(seq(&engine), vec!["b"]);
    }

    #[test]
    fn test_recovery_path_needs_two_recognitions() {
        let mut engine = engine(&["a", "b"], &["a", "b"]);

        engine.apply_action("a", ReviewAction::Forgotten).unwrap();
        let second = engine.apply_action("a", ReviewAction::Recognized).unwrap();
        assert_eq!(second.branch, ActionBranch::RecognizedAfterForgotten);
        assert_eq!(second.state.learning_step, LearningStep::AfterRecognized);
        assert!((15..=20).contains(&second.raw_index.unwrap()));
        assert_eq!(seq(&engine), vec!["b", "a"]);

        let third = engine.apply_action("a", ReviewAction::Recognized).unwrap();
        assert_eq!(third.branch, ActionBranch::SecondRecognitionMastered);
        assert!(third.state.mastered);
        assert_eq!(third.state.correct_count, 2);
        assert_eq!(third.state.consecutive_correct, 2);
        assert_eq!(engine.mastered_count(), 1);
        assert_eq!(seq(&engine), vec!["b"]);
    }

    #[test]
    fn test_forgetting_mastered_item_keeps_counter() {
        let mut engine = engine(&["a", "b"], &["a", "b"]);
        engine.apply_action("a", ReviewAction::Recognized).unwrap();
        assert_eq!(engine.mastered_count(), 1);

        let result = engine.apply_action("a", ReviewAction::Forgotten).unwrap();
        assert!(!result.state.mastered);
        assert_eq!(result.state.learning_step, LearningStep::AfterForgotten);
        assert_eq!(engine.mastered_count(), 1);
        assert_eq!(seq(&engine), vec!["b", "a"]);
    }

    #[test]
    fn test_recognizing_mastered_item_only_counts() {
        let mut engine = engine(&["a", "b"], &["a", "b"]);
        engine.apply_action("a", ReviewAction::Recognized).unwrap();

        let result = engine.apply_action("a", ReviewAction::Recognized).unwrap();
        assert_eq!(result.branch, ActionBranch::MasteredNoAction);
        assert_eq!(result.state.review_count, 2);
        assert_eq!(engine.mastered_count(), 1);
        assert_eq!(seq(&engine), vec!["b"]);
    }

    #[test]
    fn test_out_of_order_action_removes_in_place() {
        let mut engine = engine(&["a", "b", "c", "d"], &["a", "b", "c", "d"]);
        engine.apply_action("c", ReviewAction::Recognized).unwrap();
        assert_eq!(seq(&engine), vec!["a", "b", "d"]);
    }

    #[test]
    fn test_unknown_item_is_rejected_without_mutation() {
        let mut engine = engine(&["a", "b"], &["a", "b"]);
        let before = engine.snapshot();

        let err = engine.apply_action("zzz", ReviewAction::Forgotten).unwrap_err();
        assert!(matches!(err, ReviewError::ItemNotFound { .. }));
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn test_reinsertion_clamps_on_long_queue() {
        let ids: Vec<String> = (0..30).map(|i| format!("q{:02}", i)).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let mut engine = engine(&id_refs, &id_refs);

        let result = engine.apply_action("q00", ReviewAction::Forgotten).unwrap();
        let raw = result.raw_index.unwrap();
        assert_eq!(result.inserted_at, Some(raw));
        assert_eq!(engine.sequence()[raw], "q00");
        assert_eq!(engine.sequence().len(), 30);
    }

    #[test]
    fn test_fixed_reinsertion_range() {
        let config = ReinsertionConfig {
            forgotten: PositionRange::new(1, 1),
            recognized: PositionRange::new(2, 2),
        };
        let mut engine = ShortTermEngine::seeded(config, 1);
        engine.initialize(&items(&["a", "b", "c"]), Some(&with_order(&["a", "b", "c"])));

        engine.apply_action("a", ReviewAction::Forgotten).unwrap();
        assert_eq!(seq(&engine), vec!["b", "a", "c"]);
        engine.apply_action("b", ReviewAction::Recognized).unwrap();
        assert_eq!(seq(&engine), vec!["a", "c"]);
        engine.apply_action("a", ReviewAction::Recognized).unwrap();
        assert_eq!(seq(&engine), vec!["c", "a"]);
    }

    #[test]
    fn test_inverted_reinsertion_range_is_read_ascending() {
        let config = ReinsertionConfig {
            forgotten: PositionRange::new(12, 8),
            recognized: PositionRange::new(20, 15),
        };
        let ids: Vec<String> = (0..30).map(|i| format!("q{:02}", i)).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let mut engine = ShortTermEngine::seeded(config, 8);
        engine.initialize(&items(&id_refs), Some(&with_order(&id_refs)));

        let forgot = engine.apply_action("q00", ReviewAction::Forgotten).unwrap();
        assert!((8..=12).contains(&forgot.raw_index.unwrap()));
        let recovered = engine.apply_action("q00", ReviewAction::Recognized).unwrap();
        assert!((15..=20).contains(&recovered.raw_index.unwrap()));
    }

    #[test]
    fn test_initialize_without_snapshot_queues_everything() {
        let mut engine = ShortTermEngine::seeded(ReinsertionConfig::default(), 3);
        engine.initialize(&items(&["a", "b", "c", "d"]), None);

        let mut queued: Vec<&str> = seq(&engine);
        queued.sort();
        assert_eq!(queued, vec!["a", "b", "c", "d"]);
        assert_eq!(engine.total_count(), 4);
        assert_eq!(engine.mastered_count(), 0);
    }

    #[test]
    fn test_initialize_is_deterministic_per_seed() {
        let ids: Vec<String> = (0..12).map(|i| i.to_string()).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

        let mut first = ShortTermEngine::seeded(ReinsertionConfig::default(), 99);
        first.initialize(&items(&id_refs), None);
        let mut second = ShortTermEngine::seeded(ReinsertionConfig::default(), 99);
        second.initialize(&items(&id_refs), None);

        assert_eq!(first.sequence(), second.sequence());
    }

    #[test]
    fn test_initialize_restores_states_and_filters_saved_order() {
        let mut saved = with_order(&["c", "gone", "a", "c"]);
        saved.item_states.insert(
            "b".into(),
            ItemState {
                review_count: 1,
                correct_count: 1,
                mastered: true,
                learning_step: LearningStep::Mastered,
                ..ItemState::new("b")
            },
        );
        saved.mastered_items_count = 5;

        let mut engine = ShortTermEngine::seeded(ReinsertionConfig::default(), 3);
        engine.initialize(&items(&["a", "b", "c", "d"]), Some(&saved));

        assert_eq!(seq(&engine), vec!["c", "a", "d"]);
        assert!(engine.item_state("b").unwrap().mastered);
        assert_eq!(engine.mastered_count(), 5);
        assert_eq!(engine.total_count(), 4);
    }

    #[test]
    fn test_override_state_adjusts_queue_and_counter() {
        let mut engine = engine(&["a", "b"], &["a", "b"]);

        let patch = ItemStatePatch {
            mastered: Some(true),
            ..ItemStatePatch::default()
        };
        engine.override_state("a", patch).unwrap();
        assert_eq!(engine.mastered_count(), 1);
        assert_eq!(seq(&engine), vec!["b"]);

        let patch = ItemStatePatch {
            mastered: Some(false),
            review_count: Some(4),
            ..ItemStatePatch::default()
        };
        let state = engine.override_state("a", patch).unwrap();
        assert_eq!(state.review_count, 4);
        assert_eq!(engine.mastered_count(), 1);
        assert_eq!(seq(&engine), vec!["b", "a"]);

        assert!(engine.override_state("zzz", ItemStatePatch::default()).is_err());
    }

    #[test]
    fn test_reset_requeues_non_mastered() {
        let mut engine = engine(&["a", "b", "c"], &["a", "b", "c"]);
        engine.apply_action("a", ReviewAction::Recognized).unwrap();
        engine.apply_action("b", ReviewAction::Forgotten).unwrap();

        engine.reset();
        let mut queued = seq(&engine);
        queued.sort();
        assert_eq!(queued, vec!["b", "c"]);
    }

    #[test]
    fn test_progress_and_stats() {
        let mut engine = engine(&["a", "b", "c", "d"], &["a", "b", "c", "d"]);
        engine.apply_action("a", ReviewAction::Recognized).unwrap();

        let progress = engine.progress();
        assert_eq!(progress.total, 4);
        assert_eq!(progress.mastered, 1);
        assert_eq!(progress.remaining, 3);
        assert_eq!(progress.percent_complete, 25.0);

        let stats = engine.sequence_stats();
        assert_eq!(stats.sequence_length, 3);
        assert_eq!(stats.total_items, 4);
        assert_eq!(stats.mastered_percentage, 25.0);

        let empty = ShortTermEngine::seeded(ReinsertionConfig::default(), 0);
        assert_eq!(empty.progress().percent_complete, 0.0);
        assert!(empty.next_item().is_none());
    }
}
