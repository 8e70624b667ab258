//! Configuration system for revisit.
//!
//! Values resolve in this order: explicit arguments, environment variables
//! (`REVISIT_*`, `.env` honoured), a config file, then defaults.

use std::path::{Path, PathBuf};

use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{ReviewError, ReviewResult};

/// Section name accepted at the top of YAML/TOML config files.
const CONFIG_SECTION: &str = "learning_reviewer";

/// Storage backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BackendProvider {
    /// JSON files under the data directory.
    #[default]
    Json,
    /// Single SQLite database.
    Sqlite,
    /// Process memory only; nothing survives a restart.
    Memory,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend type.
    pub provider: BackendProvider,
    /// Backend-specific location (database file for SQLite). Falls back to
    /// the data directory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Cross-day interval parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LongTermConfig {
    /// Base interval in days for consecutive-day counts 1..=len.
    pub base_intervals: Vec<u32>,
    /// Easiness factor of a fresh record.
    pub initial_ef: f64,
    /// Easiness factor floor.
    pub min_ef: f64,
    /// Easiness factor reduction per wrong answer.
    pub ef_penalty: f64,
    /// Consecutive-day count at which a record is mastered.
    pub mastery_threshold: u32,
}

impl Default for LongTermConfig {
    fn default() -> Self {
        Self {
            base_intervals: vec![1, 1, 3, 7, 15, 30],
            initial_ef: 2.5,
            min_ef: 1.3,
            ef_penalty: 0.2,
            mastery_threshold: 7,
        }
    }
}

/// Inclusive range of reinsertion positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRange {
    pub min: usize,
    pub max: usize,
}

impl PositionRange {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    /// Bounds in ascending order.
    fn bounds(&self) -> (usize, usize) {
        (self.min.min(self.max), self.min.max(self.max))
    }

    /// Draw a uniform position from the range, both ends inclusive.
    ///
    /// Inverted bounds are read as the same range in ascending order.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let (low, high) = self.bounds();
        rng.gen_range(low..=high)
    }

    pub fn contains(&self, value: usize) -> bool {
        let (low, high) = self.bounds();
        (low..=high).contains(&value)
    }
}

/// How far forgotten and recovering items are pushed back in a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReinsertionConfig {
    /// Positions ahead after a forget.
    pub forgotten: PositionRange,
    /// Positions ahead after the first recognition following a forget.
    pub recognized: PositionRange,
}

impl Default for ReinsertionConfig {
    fn default() -> Self {
        Self {
            forgotten: PositionRange::new(8, 12),
            recognized: PositionRange::new(15, 20),
        }
    }
}

/// Main reviewer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewerConfig {
    /// Root directory for persisted review data.
    pub data_dir: PathBuf,
    /// Storage backend selection.
    pub backend: BackendConfig,
    /// Verbose diagnostics.
    pub debug_mode: bool,
    /// Cards selected per day.
    pub default_review_limit: usize,
    /// Cross-day parameters; accepted flat at the top level of config files.
    #[serde(flatten)]
    pub long_term: LongTermConfig,
    /// In-session reinsertion ranges.
    pub reinsertion: ReinsertionConfig,
}

impl Default for ReviewerConfig {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .map(|h| h.join(".revisit"))
            .unwrap_or_else(|| PathBuf::from(".revisit"));

        Self {
            data_dir,
            backend: BackendConfig::default(),
            debug_mode: false,
            default_review_limit: 20,
            long_term: LongTermConfig::default(),
            reinsertion: ReinsertionConfig::default(),
        }
    }
}

impl ReviewerConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    ///
    /// A top-level `learning_reviewer` table is unwrapped when present.
    pub fn from_file(path: impl AsRef<Path>) -> ReviewResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let value: serde_json::Value = match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| ReviewError::Configuration(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| ReviewError::Configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| ReviewError::Configuration(e.to_string()))?,
            _ => {
                return Err(ReviewError::Configuration(
                    "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
                ))
            }
        };

        let section = match value {
            serde_json::Value::Object(mut map) if map.contains_key(CONFIG_SECTION) => {
                map.remove(CONFIG_SECTION).unwrap_or_default()
            }
            other => other,
        };

        let config: Self = serde_json::from_value(section)
            .map_err(|e| ReviewError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables over the defaults.
    pub fn from_env() -> ReviewResult<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Resolve the effective configuration.
    ///
    /// `data_dir` wins over `REVISIT_DATA_DIR`, which wins over the file.
    pub fn resolve(data_dir: Option<PathBuf>, config_file: Option<&Path>) -> ReviewResult<Self> {
        let _ = dotenvy::dotenv();

        let mut config = match config_file {
            Some(path) if path.exists() => Self::from_file(path)?,
            Some(path) => {
                tracing::debug!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());

        if let Some(dir) = data_dir {
            config.data_dir = dir;
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply `REVISIT_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("REVISIT_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Some(debug) = lookup("REVISIT_DEBUG") {
            self.debug_mode = matches!(debug.to_lowercase().as_str(), "true" | "1" | "yes");
        }

        if let Some(provider) = lookup("REVISIT_BACKEND") {
            match provider.parse::<BackendProvider>() {
                Ok(p) => self.backend.provider = p,
                Err(_) => tracing::warn!(provider = %provider, "Unknown backend in REVISIT_BACKEND, keeping {}", self.backend.provider),
            }
        }

        if let Some(limit) = lookup("REVISIT_REVIEW_LIMIT") {
            match limit.parse::<usize>() {
                Ok(l) => self.default_review_limit = l,
                Err(_) => tracing::warn!(limit = %limit, "Ignoring non-numeric REVISIT_REVIEW_LIMIT"),
            }
        }
    }

    /// Reject inconsistent parameter combinations.
    pub fn validate(&self) -> ReviewResult<()> {
        let lt = &self.long_term;

        if lt.base_intervals.is_empty() {
            return Err(ReviewError::validation("base_intervals must not be empty"));
        }
        if lt.base_intervals.iter().any(|&d| d == 0) {
            return Err(ReviewError::validation("base_intervals must be at least 1 day"));
        }
        if lt.mastery_threshold == 0 {
            return Err(ReviewError::validation("mastery_threshold must be at least 1"));
        }
        if (lt.base_intervals.len() as u32) < lt.mastery_threshold - 1 {
            return Err(ReviewError::validation(format!(
                "base_intervals needs {} entries for mastery_threshold {}",
                lt.mastery_threshold - 1,
                lt.mastery_threshold
            )));
        }
        if lt.min_ef <= 0.0 || lt.min_ef > lt.initial_ef {
            return Err(ReviewError::validation("min_ef must be positive and not above initial_ef"));
        }
        if lt.ef_penalty < 0.0 {
            return Err(ReviewError::validation("ef_penalty must not be negative"));
        }

        for (name, range) in [
            ("forgotten", self.reinsertion.forgotten),
            ("recognized", self.reinsertion.recognized),
        ] {
            if range.min == 0 || range.min > range.max {
                return Err(ReviewError::validation(format!(
                    "reinsertion.{} must satisfy 1 <= min <= max",
                    name
                )));
            }
        }

        if self.default_review_limit == 0 {
            return Err(ReviewError::validation("default_review_limit must be positive"));
        }

        Ok(())
    }

    /// Location of the SQLite database when that backend is selected.
    pub fn sqlite_path(&self) -> PathBuf {
        self.backend
            .path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("revisit.db"))
    }
}
