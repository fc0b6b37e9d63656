//! Structured views over database rows.
//!
//! # Responsibility
//! - Read-only projections of child pages into table, board and gallery shapes.
//! - Mutations (moving a card, editing a cell) go through page updates; the
//!   projection is re-run afterwards.

pub mod projector;
