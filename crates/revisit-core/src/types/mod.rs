//! Core types for revisit.

mod item;
mod progress;
mod record;
mod snapshot;

pub use item::*;
pub use progress::{CardDayState, DailyProgress, DayState};
pub use record::{optional_date, LongTermRecord, DEFAULT_EASINESS_FACTOR};
pub use snapshot::*;
