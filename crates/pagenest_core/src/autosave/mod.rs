//! Debounced autosave.

pub mod queue;
