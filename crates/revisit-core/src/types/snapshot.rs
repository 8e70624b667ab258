//! Serialized engine state.
//!
//! [`Snapshot`] is the canonical engine format. [`ProgressExport`] is the
//! browser-compatible export (`questionMap` of `[id, state]` pairs with
//! underscore-prefixed fields) that older clients still send back.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::{ItemId, ItemState, LearningStep};
use crate::error::{ReviewError, ReviewResult};

/// Full engine state: per-item states, working order and counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub item_states: BTreeMap<ItemId, ItemState>,
    #[serde(default)]
    pub dynamic_sequence: Vec<ItemId>,
    #[serde(default)]
    pub mastered_items_count: usize,
    #[serde(default)]
    pub total_items_count: usize,
}

impl Snapshot {
    /// Decode a snapshot from untyped JSON.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Decode either the snapshot format or the `questionMap` export.
    pub fn decode(value: serde_json::Value) -> ReviewResult<Self> {
        let decoded = if value.get("questionMap").is_some() {
            serde_json::from_value::<ProgressExport>(value).map(Snapshot::from)
        } else {
            Self::from_value(value)
        };
        decoded.map_err(|e| ReviewError::malformed_snapshot(e.to_string()))
    }

    /// [`Snapshot::decode`] over raw JSON text.
    pub fn decode_str(content: &str) -> ReviewResult<Self> {
        let value = serde_json::from_str(content).map_err(|e| ReviewError::malformed_snapshot(e.to_string()))?;
        Self::decode(value)
    }
}

/// Item state in the export format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedItemState {
    #[serde(rename = "_reviewCount", default)]
    pub review_count: u32,
    #[serde(rename = "_consecutiveCorrect", default)]
    pub consecutive_correct: u32,
    #[serde(rename = "_learningStep", default)]
    pub learning_step: LearningStep,
    #[serde(rename = "_mastered", default)]
    pub mastered: bool,
    #[serde(rename = "_wrongCount", default)]
    pub wrong_count: u32,
    #[serde(rename = "_correctCount", default)]
    pub correct_count: u32,
}

impl ExportedItemState {
    fn into_state(self, item_id: ItemId) -> ItemState {
        ItemState {
            item_id,
            review_count: self.review_count,
            consecutive_correct: self.consecutive_correct,
            learning_step: self.learning_step,
            mastered: self.mastered,
            wrong_count: self.wrong_count,
            correct_count: self.correct_count,
        }
    }
}

impl From<&ItemState> for ExportedItemState {
    fn from(state: &ItemState) -> Self {
        Self {
            review_count: state.review_count,
            consecutive_correct: state.consecutive_correct,
            learning_step: state.learning_step,
            mastered: state.mastered,
            wrong_count: state.wrong_count,
            correct_count: state.correct_count,
        }
    }
}

/// Export format shared with browser clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressExport {
    #[serde(rename = "questionMap", default)]
    pub question_map: Vec<(ItemId, ExportedItemState)>,
    #[serde(rename = "masteredItems", default, skip_serializing_if = "Option::is_none")]
    pub mastered_items: Option<usize>,
    #[serde(rename = "totalItems", default)]
    pub total_items: usize,
    #[serde(rename = "dynamicSequence", default)]
    pub dynamic_sequence: Vec<ItemId>,
    #[serde(default = "Utc::now")]
    pub export_date: DateTime<Utc>,
}

impl From<ProgressExport> for Snapshot {
    fn from(export: ProgressExport) -> Self {
        let item_states: BTreeMap<ItemId, ItemState> = export
            .question_map
            .into_iter()
            .map(|(id, state)| (id.clone(), state.into_state(id)))
            .collect();

        let mastered_items_count = export
            .mastered_items
            .unwrap_or_else(|| item_states.values().filter(|s| s.mastered).count());

        let total_items_count = if export.total_items > 0 {
            export.total_items
        } else {
            item_states.len()
        };

        Snapshot {
            item_states,
            dynamic_sequence: export.dynamic_sequence,
            mastered_items_count,
            total_items_count,
        }
    }
}
