//! Cross-day memory record for a flashcard.
//!
//! Field names follow the stored params format (`longTermN`, `intervalDays`,
//! `ef`, ...) so existing data files load unchanged. Unset dates are written
//! as empty strings.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::item::ItemId;

/// Default easiness factor for a new record.
pub const DEFAULT_EASINESS_FACTOR: f64 = 2.5;

/// Cross-day scheduling state of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongTermRecord {
    /// Owning item. Stored as the map key in params files.
    #[serde(skip)]
    pub item_id: ItemId,
    /// Consecutive days answered correctly.
    #[serde(rename = "longTermN", default)]
    pub consecutive_day_count: u32,
    /// Days until the next review.
    #[serde(default = "default_interval_days")]
    pub interval_days: u32,
    /// Easiness factor, never below the configured floor.
    #[serde(rename = "ef", default = "default_easiness_factor")]
    pub easiness_factor: f64,
    #[serde(default, with = "optional_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, with = "optional_date")]
    pub last_reviewed: Option<NaiveDate>,
    #[serde(default, with = "optional_date")]
    pub created_at: Option<NaiveDate>,
    #[serde(default)]
    pub mastered: bool,
}

fn default_interval_days() -> u32 {
    1
}

fn default_easiness_factor() -> f64 {
    DEFAULT_EASINESS_FACTOR
}

impl LongTermRecord {
    /// Create a never-reviewed record.
    pub fn new(item_id: impl Into<String>, created: NaiveDate) -> Self {
        Self::with_easiness(item_id, created, DEFAULT_EASINESS_FACTOR)
    }

    /// Create a never-reviewed record with a specific starting easiness factor.
    pub fn with_easiness(item_id: impl Into<String>, created: NaiveDate, easiness_factor: f64) -> Self {
        Self {
            item_id: item_id.into(),
            consecutive_day_count: 0,
            interval_days: 1,
            easiness_factor,
            due_date: None,
            last_reviewed: None,
            created_at: Some(created),
            mastered: false,
        }
    }

    /// Whether no cross-day outcome has ever been committed.
    pub fn is_new(&self) -> bool {
        self.consecutive_day_count == 0 && self.last_reviewed.is_none()
    }
}

/// `Option<NaiveDate>` as `"YYYY-MM-DD"`, with `""` meaning unset.
///
/// Unparsable strings read back as unset so a damaged date makes the card due
/// rather than failing the whole file.
pub mod optional_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => serializer.serialize_str(&d.format(FORMAT).to_string()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.and_then(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            // Accept full timestamps by keeping the date part.
            let date_part = trimmed.get(..10).unwrap_or(trimmed);
            NaiveDate::parse_from_str(date_part, FORMAT).ok()
        }))
    }
}
