//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls, trash transitions and autosave into
//!   workspace-level APIs.
//! - Keep CLI and host layers decoupled from storage details.

pub mod template;
pub mod workspace;
