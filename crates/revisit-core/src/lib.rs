//! revisit-core - Core library for revisit.
//!
//! This crate provides the scheduling engines of the revisit flashcard
//! reviewer: the in-session queue, the cross-day interval scheduler, the
//! daily gate between them, and the persistence trait they are saved through.
//!
//! # Example
//!
//! ```ignore
//! use revisit_core::{MemoryBackend, ReviewAction, ReviewItem, ReviewSession, ReviewerConfig};
//!
//! let config = ReviewerConfig::from_env()?;
//! let items = vec![ReviewItem::new("q1", "2 + 2", "4")];
//! let mut session = ReviewSession::open("arithmetic", items, MemoryBackend::new(), &config, today, None)?;
//!
//! while let Some(id) = session.next_item().cloned() {
//!     session.review(&id, ReviewAction::Recognized)?;
//! }
//! session.persist()?;
//! ```

pub mod config;
pub mod daily;
pub mod engine;
pub mod error;
pub mod long_term;
pub mod memory_store;
pub mod session;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{BackendConfig, BackendProvider, LongTermConfig, PositionRange, ReinsertionConfig, ReviewerConfig};
pub use daily::{DailyGate, GateCommit, GateOutcome};
pub use engine::{ActionBranch, ActionResult, EngineProgress, MergeOutcome, SequenceStats, ShortTermEngine};
pub use error::{ErrorCode, ReviewError, ReviewResult};
pub use long_term::{format_interval, DailyBatch, DailySuggestion, LongTermScheduler, RecordBook, ReviewStatistics};
pub use memory_store::MemoryBackend;
pub use session::{ReviewSession, SessionReview};
pub use traits::{normalize_kb_name, PersistenceBackend};
pub use types::{
    CardDayState, DailyProgress, DayState, ExportedItemState, ItemId, ItemState, ItemStatePatch, LearningStep,
    LongTermRecord, ProgressExport, ReviewAction, ReviewItem, Snapshot,
};
