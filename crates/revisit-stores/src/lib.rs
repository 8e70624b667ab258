//! revisit-stores - Persistence backends for revisit.
//!
//! # Backends
//! - **JSON files** - one params, progress and engine file per knowledge base
//! - **SQLite** (feature: `sqlite`, default) - a single database file
//!
//! The in-memory backend lives in `revisit-core`. [`create_backend`] picks
//! one from a [`ReviewerConfig`](revisit_core::ReviewerConfig).

mod factory;
mod json_file;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use factory::create_backend;
pub use json_file::{JsonFileBackend, PARAMS_VERSION};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;
