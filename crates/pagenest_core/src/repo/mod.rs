//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the page/trash data access contract.
//! - Isolate SQLite query details from lifecycle and workspace orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.
//! - A failed call leaves persisted state unchanged.

pub mod page_repo;
