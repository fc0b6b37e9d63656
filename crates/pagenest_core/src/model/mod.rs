//! Page-centric domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep one page shape for free-form documents and database rows alike.
//!
//! # Invariants
//! - Every page is identified by a stable `PageId`.
//! - Deletion moves a page into a `DeletedPage` entry; it is never edited there.

pub mod block;
pub mod deleted_page;
pub mod page;
pub mod property;
