//! Per-day review progress for one knowledge base.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::item::ItemId;

/// Gating state of an item within one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum DayState {
    /// First encounter today.
    #[default]
    Initial = 0,
    /// Forgotten today; two recognitions in a row are required.
    NeedTwoConsecutive = 1,
    /// One of the two required recognitions done.
    OneConsecutive = 2,
    /// Finished for today.
    Completed = 3,
}

impl From<DayState> for u8 {
    fn from(state: DayState) -> Self {
        state as u8
    }
}

impl TryFrom<u8> for DayState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DayState::Initial),
            1 => Ok(DayState::NeedTwoConsecutive),
            2 => Ok(DayState::OneConsecutive),
            3 => Ok(DayState::Completed),
            other => Err(format!("invalid day state {}", other)),
        }
    }
}

/// Day-local state of one card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CardDayState {
    #[serde(default)]
    pub state: DayState,
    #[serde(default)]
    pub consecutive_correct: u32,
}

impl CardDayState {
    pub fn new(state: DayState, consecutive_correct: u32) -> Self {
        Self {
            state,
            consecutive_correct,
        }
    }
}

/// Today's batch and working order for a knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyProgress {
    pub date: NaiveDate,
    #[serde(default)]
    pub selected_card_ids: Vec<ItemId>,
    #[serde(default)]
    pub completed_card_ids: Vec<ItemId>,
    #[serde(default)]
    pub dynamic_sequence: Vec<ItemId>,
    #[serde(default)]
    pub card_states: BTreeMap<ItemId, CardDayState>,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

impl DailyProgress {
    /// Start a day with the selected batch as the working order.
    pub fn new(date: NaiveDate, selected: Vec<ItemId>) -> Self {
        Self {
            date,
            dynamic_sequence: selected.clone(),
            selected_card_ids: selected,
            completed_card_ids: Vec::new(),
            card_states: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }

    /// Day state of a card, `Initial` when untouched today.
    pub fn card_state(&self, item_id: &str) -> CardDayState {
        self.card_states.get(item_id).copied().unwrap_or_default()
    }

    pub fn is_completed(&self, item_id: &str) -> bool {
        self.completed_card_ids.iter().any(|id| id == item_id)
    }

    pub fn in_sequence(&self, item_id: &str) -> bool {
        self.dynamic_sequence.iter().any(|id| id == item_id)
    }

    /// Ids still waiting today, in working order.
    pub fn pending(&self) -> impl Iterator<Item = &ItemId> {
        self.dynamic_sequence
            .iter()
            .filter(move |id| !self.is_completed(id))
    }

    pub(crate) fn mark_completed(&mut self, item_id: &str) {
        if !self.is_completed(item_id) {
            self.completed_card_ids.push(item_id.to_string());
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_progress_file_shape() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let mut progress = DailyProgress::new(date, vec!["a".into(), "b".into()]);
        progress
            .card_states
            .insert("a".into(), CardDayState::new(DayState::NeedTwoConsecutive, 0));

        let value = serde_json::to_value(&progress).unwrap();
        assert_eq!(value["date"], json!("2024-05-02"));
        assert_eq!(value["dynamic_sequence"], json!(["a", "b"]));
        assert_eq!(value["card_states"]["a"]["state"], json!(1));
        assert_eq!(value["card_states"]["a"]["consecutive_correct"], json!(0));
    }

    #[test]
    fn test_pending_skips_completed() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let mut progress = DailyProgress::new(date, vec!["a".into(), "b".into(), "c".into()]);
        progress.mark_completed("b");
        progress.mark_completed("b");

        let pending: Vec<_> = progress.pending().cloned().collect();
        assert_eq!(pending, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(progress.completed_card_ids.len(), 1);
        assert_eq!(progress.card_state("zzz"), CardDayState::default());
    }
}
