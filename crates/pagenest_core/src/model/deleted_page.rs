//! Trash entry model.
//!
//! # Invariants
//! - `id` equals the id of the page it was created from.
//! - `permanently_delete_at == deleted_at + TRASH_RETENTION_MS`, set once.
//! - `snapshot` is the page exactly as it was when it left the live set.

use crate::model::page::{Page, PageId};
use serde::{Deserialize, Serialize};

/// Days a deleted page stays recoverable.
pub const TRASH_RETENTION_DAYS: i64 = 30;

/// Retention window in milliseconds.
pub const TRASH_RETENTION_MS: i64 = TRASH_RETENTION_DAYS * 24 * 60 * 60 * 1000;

/// Display and restore metadata captured at deletion time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedPageMetadata {
    /// Ancestor titles joined by ` / `. Absent for root pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
    /// Number of descendants deleted together with this page.
    /// Only set on the page the user deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_parent_id: Option<PageId>,
}

/// One page sitting in the trash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedPage {
    pub id: PageId,
    pub title: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub deleted_at: i64,
    pub permanently_delete_at: i64,
    #[serde(default)]
    pub metadata: DeletedPageMetadata,
    pub snapshot: Page,
}

impl DeletedPage {
    /// Snapshots a live page into a trash entry deleted at `deleted_at`.
    pub fn from_page(page: &Page, deleted_at: i64, metadata: DeletedPageMetadata) -> Self {
        Self {
            id: page.id.clone(),
            title: page.title.clone(),
            icon: page.icon.clone(),
            deleted_at,
            permanently_delete_at: purge_deadline(deleted_at),
            metadata,
            snapshot: page.clone(),
        }
    }

    /// Returns whether the scheduled purge may remove this entry at `now_ms`.
    pub fn is_purge_eligible(&self, now_ms: i64) -> bool {
        now_ms >= self.permanently_delete_at
    }

    /// Milliseconds left before purge eligibility, zero once eligible.
    pub fn remaining_ms(&self, now_ms: i64) -> i64 {
        (self.permanently_delete_at - now_ms).max(0)
    }
}

/// Computes the purge deadline for a deletion timestamp.
pub fn purge_deadline(deleted_at: i64) -> i64 {
    deleted_at + TRASH_RETENTION_MS
}
