//! Cross-day scheduling.

mod book;
mod scheduler;

pub use book::RecordBook;
pub use scheduler::{format_interval, DailyBatch, DailySuggestion, LongTermScheduler, ReviewStatistics};
