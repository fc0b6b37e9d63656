//! Core domain logic for pagenest.
//!
//! A hierarchical page workspace: pages nest under parents, carry block
//! content, may act as databases over their children, link to each other
//! and pass through a 30-day trash before permanent removal.

pub mod autosave;
pub mod clock;
pub mod config;
pub mod content;
pub mod db;
pub mod links;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;
pub mod trash;
pub mod tree;
pub mod view;

pub use autosave::queue::{
    AutosaveQueue, DueSave, SaveOutcome, DEFAULT_AUTOSAVE_DEBOUNCE_MS,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, WorkspaceConfig};
pub use content::codec::{decode, encode, PageDocument, PageKind, ViewType};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use links::backlinks::{extract_references, index_backlinks, Backlink, BacklinkIndex};
pub use logging::{
    active_logging, default_log_level, init_logging, LogSettings, LoggingError, LoggingOutcome,
};
pub use model::block::Block;
pub use model::deleted_page::{
    DeletedPage, DeletedPageMetadata, TRASH_RETENTION_DAYS, TRASH_RETENTION_MS,
};
pub use model::page::{Page, PageId, PagePatch, UNTITLED_PAGE_TITLE};
pub use model::property::{PropertyConfig, PropertyError, PropertyType, PropertyValues};
pub use repo::page_repo::{PageRepository, RepoError, RepoResult, SqlitePageRepository};
pub use service::template::PageTemplate;
pub use service::workspace::{AutosaveReport, Workspace, WorkspaceError};
pub use store::WorkspaceStore;
pub use trash::lifecycle::{TrashError, TrashLifecycle};
pub use tree::builder::{
    build_tree, compare_pages, compare_titles, find_path, flatten, TreeNode,
};
pub use tree::hierarchy::ParentIndex;
pub use view::projector::{project, project_database, ProjectedView, ProjectionOptions};

/// Minimal health-check API for smoke tests.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
