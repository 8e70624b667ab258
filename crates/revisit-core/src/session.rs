//! One learner session over one knowledge base.
//!
//! [`ReviewSession`] wires the short-term engine, today's gate and the
//! long-term records to a [`PersistenceBackend`]. Nothing is written until
//! [`ReviewSession::persist`] is called.

use std::collections::HashSet;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::ReviewerConfig;
use crate::daily::{DailyGate, GateOutcome};
use crate::engine::{ActionResult, EngineProgress, MergeOutcome, ShortTermEngine};
use crate::error::{ReviewError, ReviewResult};
use crate::long_term::{DailyBatch, DailySuggestion, LongTermScheduler, RecordBook, ReviewStatistics};
use crate::traits::{normalize_kb_name, PersistenceBackend};
use crate::types::{ItemId, ProgressExport, ReviewAction, ReviewItem};

fn item_ids(items: &[ReviewItem]) -> HashSet<&str> {
    items.iter().map(|item| item.id.as_str()).collect()
}

/// Combined result of [`ReviewSession::review`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReview {
    pub action: ActionResult,
    /// Gate transition, when the item is in today's batch.
    pub gate: Option<GateOutcome>,
}

/// Review session for one knowledge base.
pub struct ReviewSession<B: PersistenceBackend> {
    kb_name: String,
    items: Vec<ReviewItem>,
    engine: ShortTermEngine,
    gate: DailyGate,
    book: RecordBook,
    backend: B,
    review_limit: usize,
}

impl<B: PersistenceBackend> ReviewSession<B> {
    /// Load or start a session for `kb_name` on `today`.
    ///
    /// A saved snapshot is restored and reconciled with `items`; records are
    /// created for new items; stored progress for `today` is resumed and any
    /// older progress starts a new day. `seed` pins every random draw.
    pub fn open(
        kb_name: &str,
        items: Vec<ReviewItem>,
        backend: B,
        config: &ReviewerConfig,
        today: NaiveDate,
        seed: Option<u64>,
    ) -> ReviewResult<Self> {
        config.validate()?;
        let kb_name = normalize_kb_name(kb_name).to_string();
        let (engine_rng, gate_rng) = match seed {
            Some(s) => (StdRng::seed_from_u64(s), StdRng::seed_from_u64(s.wrapping_add(1))),
            None => (StdRng::from_entropy(), StdRng::from_entropy()),
        };

        let engine = match backend.load_snapshot(&kb_name)? {
            Some(snapshot) => {
                let mut engine = ShortTermEngine::restore(snapshot, config.reinsertion, engine_rng);
                engine.merge_with_items(&items);
                engine
            }
            None => {
                let mut engine = ShortTermEngine::with_rng(config.reinsertion, engine_rng);
                engine.initialize(&items, None);
                engine
            }
        };

        let scheduler = LongTermScheduler::new(config.long_term.clone());
        let mut book = RecordBook::load(&backend, &kb_name)?;
        book.sync_items(&items, &scheduler, today);

        let mut gate = DailyGate::with_rng(scheduler, config.reinsertion, today, gate_rng);
        match backend.load_progress(&kb_name)? {
            Some(progress) if progress.date >= today => {
                gate.resume(progress);
                gate.retain_items(&item_ids(&items));
            }
            _ => {
                gate.begin_day(&book.active_records(&items), config.default_review_limit, today);
            }
        }

        tracing::info!(
            kb = %kb_name,
            backend = backend.name(),
            items = items.len(),
            date = %today,
            "Opened review session"
        );

        Ok(Self {
            kb_name,
            items,
            engine,
            gate,
            book,
            backend,
            review_limit: config.default_review_limit,
        })
    }

    /// Next item of the in-session queue.
    pub fn next_item(&self) -> Option<&ItemId> {
        self.engine.next_item()
    }

    /// Next card of today's batch.
    pub fn next_daily_card(&self) -> Option<&ItemId> {
        self.gate.next_card()
    }

    /// Record an outcome for `item_id`.
    ///
    /// The engine always sees the action. Items in today's batch also move
    /// through the gate; a gate refusal (already completed, not scheduled) is
    /// logged and the engine result still returned.
    pub fn review(&mut self, item_id: &str, action: ReviewAction) -> ReviewResult<SessionReview> {
        let result = self.engine.apply_action(item_id, action)?;

        let gate = if self.gate.tracks(item_id) {
            let outcome = match action {
                ReviewAction::Recognized => self.gate.remember(item_id, &mut self.book),
                ReviewAction::Forgotten => self.gate.forget(item_id, &mut self.book),
            };
            match outcome {
                Ok(outcome) => Some(outcome),
                Err(e @ (ReviewError::DayCompleted { .. } | ReviewError::NotScheduled { .. })) => {
                    tracing::debug!(item_id, error = %e, "Gate skipped action");
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        Ok(SessionReview { action: result, gate })
    }

    /// Parse `action` and record it.
    pub fn review_str(&mut self, item_id: &str, action: &str) -> ReviewResult<SessionReview> {
        let action = ReviewAction::parse(action)?;
        self.review(item_id, action)
    }

    /// Start a new day if `today` is past the gate's day.
    pub fn rollover(&mut self, today: NaiveDate) -> Option<DailyBatch> {
        if !self.gate.is_new_day(today) {
            return None;
        }
        let records = self.book.active_records(&self.items);
        Some(self.gate.begin_day(&records, self.review_limit, today))
    }

    /// Reconcile with a reloaded item list.
    pub fn reload_items(&mut self, items: Vec<ReviewItem>) -> MergeOutcome {
        let outcome = self.engine.merge_with_items(&items);
        self.book.sync_items(&items, self.gate.scheduler(), self.gate.date());
        self.gate.retain_items(&item_ids(&items));
        self.items = items;
        outcome
    }

    /// Write records, today's progress and the engine snapshot.
    ///
    /// On failure in-memory state is untouched, so calling again may succeed.
    pub fn persist(&self) -> ReviewResult<()> {
        let result = self
            .book
            .save(&self.backend)
            .and_then(|_| self.backend.save_progress(&self.kb_name, self.gate.progress()))
            .and_then(|_| self.backend.save_snapshot(&self.kb_name, &self.engine.snapshot()));

        match &result {
            Ok(()) => tracing::info!(kb = %self.kb_name, backend = self.backend.name(), "Persisted review session"),
            Err(e) => tracing::warn!(kb = %self.kb_name, error = %e, "Failed to persist review session"),
        }
        result
    }

    pub fn progress(&self) -> EngineProgress {
        self.engine.progress()
    }

    pub fn statistics(&self) -> ReviewStatistics {
        self.gate
            .scheduler()
            .statistics(&self.book.active_records(&self.items), self.gate.date())
    }

    pub fn daily_suggestion(&self) -> DailySuggestion {
        self.gate
            .scheduler()
            .daily_suggestion(&self.book.active_records(&self.items), self.gate.date())
    }

    pub fn export(&self) -> ProgressExport {
        self.engine.export()
    }

    /// The day the gate is working on.
    pub fn today(&self) -> NaiveDate {
        self.gate.date()
    }

    pub fn kb_name(&self) -> &str {
        &self.kb_name
    }

    pub fn engine(&self) -> &ShortTermEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ShortTermEngine {
        &mut self.engine
    }

    pub fn gate(&self) -> &DailyGate {
        &self.gate
    }

    pub fn book(&self) -> &RecordBook {
        &self.book
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
