//! Error types for revisit operations.
//!
//! Every variant carries a structured [`ErrorCode`] so callers (HTTP layers,
//! CLIs) can react programmatically without matching on message text.

use thiserror::Error;

/// Result type alias for revisit operations.
pub type ReviewResult<T> = Result<T, ReviewError>;

/// Main error type for all revisit operations.
#[derive(Error, Debug)]
pub enum ReviewError {
    /// Item id unknown to the engine or gate.
    #[error("Item not found: {message}")]
    ItemNotFound {
        message: String,
        code: ErrorCode,
        item_id: String,
    },

    /// Action string outside the supported set.
    #[error("Invalid action: {message}")]
    InvalidAction {
        message: String,
        code: ErrorCode,
        action: String,
    },

    /// Snapshot could not be decoded.
    #[error("Malformed snapshot: {message}")]
    MalformedSnapshot { message: String, code: ErrorCode },

    /// Item already completed for the current day.
    #[error("Day completed: {message}")]
    DayCompleted {
        message: String,
        code: ErrorCode,
        item_id: String,
    },

    /// Item is not part of today's working sequence.
    #[error("Not scheduled today: {message}")]
    NotScheduled {
        message: String,
        code: ErrorCode,
        item_id: String,
    },

    /// Storage backend failed to load or save.
    #[error("Persistence error: {message}")]
    Persistence {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation { message: String, code: ErrorCode },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Items (ITEM_xxx)
    ItemNotFound,

    // Actions (ACT_xxx)
    ActInvalid,

    // Snapshots (SNAP_xxx)
    SnapMalformed,

    // Daily gate (DAY_xxx)
    DayCompleted,
    DayNotScheduled,

    // Persistence (PERS_xxx)
    PersLoadFailed,
    PersSaveFailed,

    // Validation (VAL_xxx)
    ValInvalidInput,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ItemNotFound => "ITEM_001",
            ErrorCode::ActInvalid => "ACT_001",
            ErrorCode::SnapMalformed => "SNAP_001",
            ErrorCode::DayCompleted => "DAY_001",
            ErrorCode::DayNotScheduled => "DAY_002",
            ErrorCode::PersLoadFailed => "PERS_001",
            ErrorCode::PersSaveFailed => "PERS_002",
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl ReviewError {
    /// Create an item-not-found error.
    pub fn item_not_found(item_id: impl Into<String>) -> Self {
        let id = item_id.into();
        Self::ItemNotFound {
            message: format!("Item '{}' not found in engine", id),
            code: ErrorCode::ItemNotFound,
            item_id: id,
        }
    }

    /// Create an invalid-action error.
    pub fn invalid_action(action: impl Into<String>) -> Self {
        let action = action.into();
        Self::InvalidAction {
            message: format!("'{}' must be 'recognized' or 'forgotten'", action),
            code: ErrorCode::ActInvalid,
            action,
        }
    }

    /// Create a malformed-snapshot error.
    pub fn malformed_snapshot(message: impl Into<String>) -> Self {
        Self::MalformedSnapshot {
            message: message.into(),
            code: ErrorCode::SnapMalformed,
        }
    }

    /// Create a day-completed error.
    pub fn day_completed(item_id: impl Into<String>) -> Self {
        let id = item_id.into();
        Self::DayCompleted {
            message: format!("Item '{}' is already completed today", id),
            code: ErrorCode::DayCompleted,
            item_id: id,
        }
    }

    /// Create a not-scheduled error.
    pub fn not_scheduled(item_id: impl Into<String>) -> Self {
        let id = item_id.into();
        Self::NotScheduled {
            message: format!("Item '{}' is not in today's sequence", id),
            code: ErrorCode::DayNotScheduled,
            item_id: id,
        }
    }

    /// Create a persistence error for a failed load.
    pub fn persistence_load(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
            code: ErrorCode::PersLoadFailed,
            source: None,
        }
    }

    /// Create a persistence error for a failed save.
    pub fn persistence_save(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
            code: ErrorCode::PersSaveFailed,
            source: None,
        }
    }

    /// Wrap a backend-specific error as a persistence failure.
    pub fn persistence_with_source(
        code: ErrorCode,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Persistence {
            message: source.to_string(),
            code,
            source: Some(Box::new(source)),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
        }
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ItemNotFound { code, .. } => *code,
            Self::InvalidAction { code, .. } => *code,
            Self::MalformedSnapshot { code, .. } => *code,
            Self::DayCompleted { code, .. } => *code,
            Self::NotScheduled { code, .. } => *code,
            Self::Persistence { code, .. } => *code,
            Self::Validation { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::ItemNotFound { .. } => {
                Some("Reload the knowledge base so the engine learns about new items")
            }
            Self::InvalidAction { .. } => Some("Use 'recognized' or 'forgotten'"),
            Self::DayCompleted { .. } => Some("The item is done for today; review it tomorrow"),
            Self::MalformedSnapshot { .. } => Some("Delete the stored engine file to start the session fresh"),
            Self::Persistence { .. } => Some("Check the data directory and retry the save"),
            _ => None,
        }
    }

    /// Whether the session can keep going after this error.
    ///
    /// Gate refusals and persistence failures leave in-memory state intact.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DayCompleted { .. }
                | Self::NotScheduled { .. }
                | Self::Persistence { .. }
                | Self::MalformedSnapshot { .. }
        )
    }

    /// Whether this error came from the storage backend.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence { .. } | Self::Io(_))
    }
}
