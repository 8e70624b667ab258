//! Per-day gating of cross-day commits.
//!
//! Each day a batch of cards is selected. A card remembered on first sight is
//! done for the day and its correct day is committed at once. A card forgotten
//! today must be remembered twice in a row before the correct day counts; the
//! forget itself is committed immediately.

use std::collections::HashSet;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::{PositionRange, ReinsertionConfig};
use crate::error::{ReviewError, ReviewResult};
use crate::long_term::{DailyBatch, LongTermScheduler, RecordBook};
use crate::types::{CardDayState, DailyProgress, DayState, ItemId, LongTermRecord};

/// Cross-day change made by a gate transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateCommit {
    Correct,
    Wrong,
}

/// Result of a gate transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateOutcome {
    pub item_id: ItemId,
    pub from: DayState,
    pub to: DayState,
    /// 1-based position drawn for reinsertion.
    pub drawn_position: Option<usize>,
    /// 0-based index the card was reinserted at.
    pub inserted_at: Option<usize>,
    pub commit: Option<GateCommit>,
    /// Record after the commit.
    pub record: Option<LongTermRecord>,
}

/// Day state machine for one knowledge base.
#[derive(Debug, Clone)]
pub struct DailyGate<R: Rng = StdRng> {
    progress: DailyProgress,
    scheduler: LongTermScheduler,
    reinsertion: ReinsertionConfig,
    rng: R,
}

impl DailyGate<StdRng> {
    pub fn seeded(scheduler: LongTermScheduler, reinsertion: ReinsertionConfig, date: NaiveDate, seed: u64) -> Self {
        Self::with_rng(scheduler, reinsertion, date, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> DailyGate<R> {
    /// Gate with an empty batch for `date`.
    pub fn with_rng(scheduler: LongTermScheduler, reinsertion: ReinsertionConfig, date: NaiveDate, rng: R) -> Self {
        Self {
            progress: DailyProgress::new(date, Vec::new()),
            scheduler,
            reinsertion,
            rng,
        }
    }

    /// Start `date` with a fresh batch selected from `records`.
    pub fn begin_day(&mut self, records: &[LongTermRecord], limit: usize, date: NaiveDate) -> DailyBatch {
        let batch = self.scheduler.select_daily_batch(records, limit, date);
        self.progress = DailyProgress::new(date, batch.selected.clone());

        tracing::info!(
            date = %date,
            selected = batch.selected.len(),
            remaining_due = batch.remaining_due,
            limit,
            "Started review day"
        );
        batch
    }

    /// Continue from stored progress.
    pub fn resume(&mut self, progress: DailyProgress) {
        tracing::debug!(
            date = %progress.date,
            pending = progress.pending().count(),
            completed = progress.completed_card_ids.len(),
            "Resumed review day"
        );
        self.progress = progress;
    }

    /// Drop cards outside `item_ids` from today's batch and order.
    ///
    /// Completed ids stay so a card re-added later today is not reviewed twice.
    /// Returns how many cards left the working order.
    pub fn retain_items(&mut self, item_ids: &HashSet<&str>) -> usize {
        let before = self.progress.dynamic_sequence.len();
        self.progress
            .dynamic_sequence
            .retain(|id| item_ids.contains(id.as_str()));
        self.progress
            .selected_card_ids
            .retain(|id| item_ids.contains(id.as_str()));
        self.progress
            .card_states
            .retain(|id, _| item_ids.contains(id.as_str()));

        let dropped = before - self.progress.dynamic_sequence.len();
        if dropped > 0 {
            self.progress.touch();
            tracing::info!(dropped, date = %self.progress.date, "Dropped unlisted cards from today's order");
        }
        dropped
    }

    /// Whether `today` is later than the gate's day.
    pub fn is_new_day(&self, today: NaiveDate) -> bool {
        self.progress.date < today
    }

    /// Whether the card belongs to today's batch.
    pub fn tracks(&self, item_id: &str) -> bool {
        self.progress.in_sequence(item_id)
            || self.progress.is_completed(item_id)
            || self.progress.selected_card_ids.iter().any(|id| id == item_id)
    }

    /// First card of today's order that is not completed.
    pub fn next_card(&self) -> Option<&ItemId> {
        self.progress.pending().next()
    }

    pub fn progress(&self) -> &DailyProgress {
        &self.progress
    }

    pub fn date(&self) -> NaiveDate {
        self.progress.date
    }

    pub fn scheduler(&self) -> &LongTermScheduler {
        &self.scheduler
    }

    /// The learner remembered the card.
    pub fn remember(&mut self, item_id: &str, book: &mut RecordBook) -> ReviewResult<GateOutcome> {
        if self.progress.is_completed(item_id) {
            return Err(ReviewError::day_completed(item_id));
        }
        if !self.progress.in_sequence(item_id) {
            return Err(ReviewError::not_scheduled(item_id));
        }

        let current = self.progress.card_state(item_id);
        let mut outcome = GateOutcome {
            item_id: item_id.to_string(),
            from: current.state,
            to: current.state,
            drawn_position: None,
            inserted_at: None,
            commit: None,
            record: None,
        };

        match current.state {
            DayState::Initial | DayState::OneConsecutive => {
                self.remove_from_sequence(item_id);
                self.progress.mark_completed(item_id);
                self.set_state(item_id, CardDayState::new(DayState::Completed, 0));
                outcome.to = DayState::Completed;
                outcome.commit = Some(GateCommit::Correct);
                outcome.record = Some(self.commit(item_id, GateCommit::Correct, book));
            }
            DayState::NeedTwoConsecutive => {
                self.remove_from_sequence(item_id);
                let (drawn, index) = self.reinsert(item_id, self.reinsertion.recognized);
                self.set_state(item_id, CardDayState::new(DayState::OneConsecutive, 1));
                outcome.to = DayState::OneConsecutive;
                outcome.drawn_position = Some(drawn);
                outcome.inserted_at = Some(index);
            }
            DayState::Completed => return Err(ReviewError::day_completed(item_id)),
        }

        self.progress.touch();
        tracing::debug!(item_id, from = ?outcome.from, to = ?outcome.to, "Gate remember");
        Ok(outcome)
    }

    /// The learner forgot the card.
    ///
    /// A card outside today's order is treated as first seen and joins it.
    pub fn forget(&mut self, item_id: &str, book: &mut RecordBook) -> ReviewResult<GateOutcome> {
        if self.progress.is_completed(item_id) {
            return Err(ReviewError::day_completed(item_id));
        }

        let from = if self.progress.in_sequence(item_id) {
            self.remove_from_sequence(item_id);
            self.progress.card_state(item_id).state
        } else {
            DayState::Initial
        };
        if from == DayState::Completed {
            return Err(ReviewError::day_completed(item_id));
        }

        let (drawn, index) = self.reinsert(item_id, self.reinsertion.forgotten);
        self.set_state(item_id, CardDayState::new(DayState::NeedTwoConsecutive, 0));
        let record = self.commit(item_id, GateCommit::Wrong, book);
        self.progress.touch();

        tracing::debug!(item_id, from = ?from, inserted_at = index, "Gate forget");
        Ok(GateOutcome {
            item_id: item_id.to_string(),
            from,
            to: DayState::NeedTwoConsecutive,
            drawn_position: Some(drawn),
            inserted_at: Some(index),
            commit: Some(GateCommit::Wrong),
            record: Some(record),
        })
    }

    fn remove_from_sequence(&mut self, item_id: &str) {
        self.progress.dynamic_sequence.retain(|id| id != item_id);
    }

    /// Insert at a 1-based position drawn from `range`, clamped to the order.
    fn reinsert(&mut self, item_id: &str, range: PositionRange) -> (usize, usize) {
        let drawn = range.draw(&mut self.rng);
        let index = drawn.saturating_sub(1).min(self.progress.dynamic_sequence.len());
        self.progress.dynamic_sequence.insert(index, item_id.to_string());
        (drawn, index)
    }

    fn set_state(&mut self, item_id: &str, state: CardDayState) {
        self.progress.card_states.insert(item_id.to_string(), state);
    }

    fn commit(&self, item_id: &str, commit: GateCommit, book: &mut RecordBook) -> LongTermRecord {
        let date = self.progress.date;
        let record = book.get_or_create(item_id, &self.scheduler, date);
        match commit {
            GateCommit::Correct => self.scheduler.apply_correct(record, date),
            GateCommit::Wrong => self.scheduler.apply_wrong(record, date),
        }
        record.clone()
    }
}
