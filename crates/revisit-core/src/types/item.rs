//! Review items and their session-scoped learning state.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{ReviewError, ReviewResult};

/// Identifier of a flashcard within a knowledge base.
pub type ItemId = String;

/// A flashcard as loaded from a knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: ItemId,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

impl ReviewItem {
    /// Create a new review item.
    pub fn new(id: impl Into<String>, question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// Parse a JSON array of items, skipping entries without a usable id.
    pub fn parse_list(value: &serde_json::Value) -> ReviewResult<Vec<ReviewItem>> {
        let entries = value
            .as_array()
            .ok_or_else(|| ReviewError::validation("knowledge base must be a JSON array"))?;

        let mut items = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let has_id = entry
                .get("id")
                .and_then(|id| id.as_str())
                .is_some_and(|id| !id.is_empty());
            if !has_id {
                tracing::warn!(index, "Skipping knowledge base entry without an id");
                continue;
            }
            match serde_json::from_value::<ReviewItem>(entry.clone()) {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!(index, error = %e, "Skipping unreadable knowledge base entry"),
            }
        }
        Ok(items)
    }
}

/// Learner outcome reported for the presented item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReviewAction {
    /// The learner remembered the answer.
    Recognized,
    /// The learner did not remember the answer.
    Forgotten,
}

impl ReviewAction {
    /// Parse an action string, rejecting anything but the two known values.
    pub fn parse(action: &str) -> ReviewResult<Self> {
        action
            .parse()
            .map_err(|_| ReviewError::invalid_action(action))
    }
}

/// Step in the per-session learning state machine.
///
/// Stored as its integer tag (0-3) so persisted progress stays compatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum LearningStep {
    /// Not reviewed yet.
    #[default]
    Initial = 0,
    /// Forgotten at least once; needs two recognitions in a row.
    AfterForgotten = 1,
    /// Recognized once after a forget.
    AfterRecognized = 2,
    /// Done for this session.
    Mastered = 3,
}

impl From<LearningStep> for u8 {
    fn from(step: LearningStep) -> Self {
        step as u8
    }
}

impl TryFrom<u8> for LearningStep {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LearningStep::Initial),
            1 => Ok(LearningStep::AfterForgotten),
            2 => Ok(LearningStep::AfterRecognized),
            3 => Ok(LearningStep::Mastered),
            other => Err(format!("invalid learning step {}", other)),
        }
    }
}

/// Session-scoped state of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemState {
    pub item_id: ItemId,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub consecutive_correct: u32,
    #[serde(default)]
    pub learning_step: LearningStep,
    #[serde(default)]
    pub mastered: bool,
    #[serde(default)]
    pub wrong_count: u32,
    #[serde(default)]
    pub correct_count: u32,
}

impl ItemState {
    /// Fresh state for an item the engine has not seen before.
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            review_count: 0,
            consecutive_correct: 0,
            learning_step: LearningStep::Initial,
            mastered: false,
            wrong_count: 0,
            correct_count: 0,
        }
    }
}

/// Partial update applied by `ShortTermEngine::override_state`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemStatePatch {
    pub review_count: Option<u32>,
    pub consecutive_correct: Option<u32>,
    pub learning_step: Option<LearningStep>,
    pub mastered: Option<bool>,
    pub wrong_count: Option<u32>,
    pub correct_count: Option<u32>,
}
