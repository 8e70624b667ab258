//! Cross-day interval scheduling.
//!
//! SM-2 style: a table of base intervals indexed by the number of consecutive
//! days answered correctly, scaled by the record's easiness factor. A wrong
//! answer resets the streak and lowers the easiness factor.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::LongTermConfig;
use crate::types::{ItemId, LongTermRecord};

/// Easiness factor the base interval table is calibrated for.
const REFERENCE_EF: f64 = 2.5;

/// Cards selected for a day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyBatch {
    /// Due cards first, then never-reviewed cards.
    pub selected: Vec<ItemId>,
    /// Due cards left out because of the limit.
    pub remaining_due: usize,
}

/// Aggregate view over a set of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewStatistics {
    pub total_cards: usize,
    pub due_cards: usize,
    pub new_cards: usize,
    pub mastered_cards: usize,
    pub average_ef: f64,
    pub average_consecutive_days: f64,
}

/// Suggested workload for a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySuggestion {
    pub due_cards: usize,
    pub new_cards: usize,
    pub total_suggested: usize,
    pub recommended_limit: usize,
}

/// Cap on the recommended daily limit.
const SUGGESTED_LIMIT_CAP: usize = 20;

/// Interval/easiness-factor computation over [`LongTermRecord`]s.
#[derive(Debug, Clone, Default)]
pub struct LongTermScheduler {
    config: LongTermConfig,
}

impl LongTermScheduler {
    pub fn new(config: LongTermConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LongTermConfig {
        &self.config
    }

    /// Fresh record using the configured starting easiness factor.
    pub fn new_record(&self, item_id: impl Into<String>, created: NaiveDate) -> LongTermRecord {
        LongTermRecord::with_easiness(item_id, created, self.config.initial_ef)
    }

    /// Commit a correct day for the record.
    pub fn apply_correct(&self, record: &mut LongTermRecord, date: NaiveDate) {
        record.consecutive_day_count += 1;
        record.last_reviewed = Some(date);
        self.reschedule(record, date);

        tracing::debug!(
            item_id = %record.item_id,
            streak = record.consecutive_day_count,
            interval = record.interval_days,
            mastered = record.mastered,
            "Committed correct day"
        );
    }

    /// Commit a wrong answer: reset the streak and lower the easiness factor.
    pub fn apply_wrong(&self, record: &mut LongTermRecord, date: NaiveDate) {
        record.consecutive_day_count = 0;
        record.easiness_factor = (record.easiness_factor - self.config.ef_penalty).max(self.config.min_ef);
        record.last_reviewed = Some(date);
        self.reschedule(record, date);

        tracing::debug!(
            item_id = %record.item_id,
            ef = record.easiness_factor,
            "Committed wrong answer"
        );
    }

    /// Apply one review outcome.
    ///
    /// Only the first correct answer of a day moves the streak; later ones
    /// just refresh `last_reviewed`. Wrong answers always commit.
    pub fn apply_review(&self, record: &mut LongTermRecord, correct: bool, first_review_today: bool, date: NaiveDate) {
        match (correct, first_review_today) {
            (true, true) => self.apply_correct(record, date),
            (true, false) => record.last_reviewed = Some(date),
            (false, _) => self.apply_wrong(record, date),
        }
    }

    fn reschedule(&self, record: &mut LongTermRecord, date: NaiveDate) {
        let n = record.consecutive_day_count;
        if n >= self.config.mastery_threshold {
            record.mastered = true;
            record.interval_days = 0;
        } else {
            record.interval_days = self.interval_for(n, record.easiness_factor);
        }
        record.due_date = date.checked_add_days(Days::new(u64::from(record.interval_days)));
    }

    /// Interval in days for a streak of `n` days, at least one day.
    pub fn interval_for(&self, n: u32, easiness_factor: f64) -> u32 {
        if n == 0 {
            return 1;
        }
        let base = self
            .config
            .base_intervals
            .get(n as usize - 1)
            .or_else(|| self.config.base_intervals.last())
            .copied()
            .unwrap_or(1);
        let scaled = (f64::from(base) * easiness_factor / REFERENCE_EF).round();
        (scaled as u32).max(1)
    }

    /// Whether the record should be reviewed on `date`.
    pub fn is_due(&self, record: &LongTermRecord, date: NaiveDate) -> bool {
        if record.mastered {
            return false;
        }
        match record.due_date {
            None => true,
            Some(due) => due <= date,
        }
    }

    /// Reviewed-before records due on `date`, earliest due first.
    pub fn due_records<'a>(&self, records: impl IntoIterator<Item = &'a LongTermRecord>, date: NaiveDate) -> Vec<&'a LongTermRecord> {
        let mut due: Vec<&LongTermRecord> = records
            .into_iter()
            .filter(|r| !r.is_new() && self.is_due(r, date))
            .collect();
        due.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.item_id.cmp(&b.item_id)));
        due
    }

    /// Never-reviewed records, oldest first.
    pub fn new_records<'a>(&self, records: impl IntoIterator<Item = &'a LongTermRecord>, max: Option<usize>) -> Vec<&'a LongTermRecord> {
        let mut fresh: Vec<&LongTermRecord> = records.into_iter().filter(|r| r.is_new() && !r.mastered).collect();
        fresh.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.item_id.cmp(&b.item_id)));
        if let Some(max) = max {
            fresh.truncate(max);
        }
        fresh
    }

    /// Pick up to `limit` cards for `date`: due cards, then new ones.
    pub fn select_daily_batch(&self, records: &[LongTermRecord], limit: usize, date: NaiveDate) -> DailyBatch {
        let due = self.due_records(records, date);
        let due_taken = due.len().min(limit);
        let new_taken = limit - due_taken;

        let selected: Vec<ItemId> = due
            .iter()
            .take(due_taken)
            .map(|r| r.item_id.clone())
            .chain(self.new_records(records, Some(new_taken)).into_iter().map(|r| r.item_id.clone()))
            .collect();

        DailyBatch {
            selected,
            remaining_due: due.len() - due_taken,
        }
    }

    pub fn statistics(&self, records: &[LongTermRecord], date: NaiveDate) -> ReviewStatistics {
        let total = records.len();
        let (ef_sum, streak_sum) = records.iter().fold((0.0, 0.0), |(ef, n), r| {
            (ef + r.easiness_factor, n + f64::from(r.consecutive_day_count))
        });
        let average = |sum: f64| if total == 0 { 0.0 } else { sum / total as f64 };

        ReviewStatistics {
            total_cards: total,
            due_cards: self.due_records(records, date).len(),
            new_cards: self.new_records(records, None).len(),
            mastered_cards: records.iter().filter(|r| r.mastered).count(),
            average_ef: average(ef_sum),
            average_consecutive_days: average(streak_sum),
        }
    }

    pub fn daily_suggestion(&self, records: &[LongTermRecord], date: NaiveDate) -> DailySuggestion {
        let due_cards = self.due_records(records, date).len();
        let new_cards = self.new_records(records, None).len();
        let total_suggested = due_cards + new_cards;

        DailySuggestion {
            due_cards,
            new_cards,
            total_suggested,
            recommended_limit: total_suggested.min(SUGGESTED_LIMIT_CAP),
        }
    }
}

/// Short human form of an interval: `now`, `3d`, `2w`, `4mo`, `1y`.
pub fn format_interval(days: u32) -> String {
    match days {
        0 => "now".to_string(),
        1..=13 => format!("{}d", days),
        14..=59 => format!("{}w", days / 7),
        60..=364 => format!("{}mo", days / 30),
        _ => format!("{}y", days / 365),
    }
}
