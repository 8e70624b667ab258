//! Core traits for revisit collaborators.

mod backend;

pub use backend::*;
