//! Page hierarchy: forest construction and parent-link queries.
//!
//! # Invariants
//! - Construction never recurses along parent links.
//! - Every traversal carries a visited-id set; stored cycles cannot hang it.

pub mod builder;
pub mod hierarchy;
