//! Page domain model.
//!
//! # Responsibility
//! - Define the canonical page record shared by tree, views, links and trash.
//! - Define partial-update patches used by edits and debounced autosave.
//!
//! # Invariants
//! - `id` is stable and never reused for another page.
//! - `parent_id = None` means the page is a root.
//! - `tags` is a normalized set (trimmed, lowercase, deduplicated).
//! - `content` is opaque here; only `content::codec` interprets it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Stable page identifier.
///
/// Kept as an opaque string because ids may originate outside this crate.
pub type PageId = String;

/// Title assigned when the user leaves the title blank.
pub const UNTITLED_PAGE_TITLE: &str = "Untitled";

/// Canonical page record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub title: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub parent_id: Option<PageId>,
    /// Stored content JSON, see `content::codec` for accepted shapes.
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Page {
    /// Creates a blank page with a generated id.
    pub fn new(title: impl Into<String>, parent_id: Option<PageId>, now_ms: i64) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), title, parent_id, now_ms)
    }

    /// Creates a blank page with a caller-provided id.
    ///
    /// Used by import paths and tests where identity already exists.
    pub fn with_id(
        id: impl Into<PageId>,
        title: impl Into<String>,
        parent_id: Option<PageId>,
        now_ms: i64,
    ) -> Self {
        Self {
            id: id.into(),
            title: normalize_title(title.into()),
            icon: None,
            parent_id,
            content: Value::Null,
            tags: BTreeSet::new(),
            is_favorite: false,
            cover_url: None,
            is_public: false,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Returns whether this page sits at the top of the hierarchy.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Applies a patch in place and bumps `updated_at` when anything changed.
    ///
    /// Returns whether any field was modified.
    pub fn apply_patch(&mut self, patch: &PagePatch, now_ms: i64) -> bool {
        let mut changed = false;
        if let Some(title) = patch.title.as_ref() {
            let title = normalize_title(title.clone());
            changed |= self.title != title;
            self.title = title;
        }
        if let Some(icon) = patch.icon.as_ref() {
            changed |= &self.icon != icon;
            self.icon = icon.clone();
        }
        if let Some(parent_id) = patch.parent_id.as_ref() {
            changed |= &self.parent_id != parent_id;
            self.parent_id = parent_id.clone();
        }
        if let Some(content) = patch.content.as_ref() {
            changed |= &self.content != content;
            self.content = content.clone();
        }
        if let Some(tags) = patch.tags.as_ref() {
            let tags = normalize_tags(tags.iter().map(String::as_str));
            changed |= self.tags != tags;
            self.tags = tags;
        }
        if let Some(is_favorite) = patch.is_favorite {
            changed |= self.is_favorite != is_favorite;
            self.is_favorite = is_favorite;
        }
        if let Some(cover_url) = patch.cover_url.as_ref() {
            changed |= &self.cover_url != cover_url;
            self.cover_url = cover_url.clone();
        }
        if let Some(is_public) = patch.is_public {
            changed |= self.is_public != is_public;
            self.is_public = is_public;
        }
        if changed {
            self.updated_at = now_ms.max(self.updated_at);
        }
        changed
    }
}

/// Partial page update.
///
/// `None` leaves a field untouched. For nullable fields the inner option
/// distinguishes "clear" (`Some(None)`) from "set" (`Some(Some(_))`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PagePatch {
    pub title: Option<String>,
    pub icon: Option<Option<String>>,
    pub parent_id: Option<Option<PageId>>,
    pub content: Option<Value>,
    pub tags: Option<BTreeSet<String>>,
    pub is_favorite: Option<bool>,
    pub cover_url: Option<Option<String>>,
    pub is_public: Option<bool>,
}

impl PagePatch {
    pub fn title(value: impl Into<String>) -> Self {
        Self {
            title: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn content(value: Value) -> Self {
        Self {
            content: Some(value),
            ..Self::default()
        }
    }

    pub fn parent(parent_id: Option<PageId>) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::default()
        }
    }

    /// Returns whether the patch carries no field at all.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Folds a newer patch on top of this one; newer fields win.
    pub fn merge(&mut self, newer: PagePatch) {
        if newer.title.is_some() {
            self.title = newer.title;
        }
        if newer.icon.is_some() {
            self.icon = newer.icon;
        }
        if newer.parent_id.is_some() {
            self.parent_id = newer.parent_id;
        }
        if newer.content.is_some() {
            self.content = newer.content;
        }
        if newer.tags.is_some() {
            self.tags = newer.tags;
        }
        if newer.is_favorite.is_some() {
            self.is_favorite = newer.is_favorite;
        }
        if newer.cover_url.is_some() {
            self.cover_url = newer.cover_url;
        }
        if newer.is_public.is_some() {
            self.is_public = newer.is_public;
        }
    }
}

/// Trims a title and substitutes the untitled placeholder for blank input.
pub fn normalize_title(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        UNTITLED_PAGE_TITLE.to_string()
    } else if trimmed.len() == value.len() {
        value
    } else {
        trimmed.to_string()
    }
}

/// Normalizes one tag value; blank input yields `None`.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes and deduplicates tag values.
pub fn normalize_tags<'a>(tags: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    tags.into_iter().filter_map(normalize_tag).collect()
}

#[cfg(test)]
mod tests {
    use super::{normalize_tags, normalize_title, Page, PagePatch, UNTITLED_PAGE_TITLE};
    use serde_json::json;

    #[test]
    fn blank_title_becomes_untitled() {
        assert_eq!(normalize_title("   ".to_string()), UNTITLED_PAGE_TITLE);
        assert_eq!(normalize_title("  Plans ".to_string()), "Plans");
    }

    #[test]
    fn tags_are_lowercased_and_deduplicated() {
        let tags = normalize_tags(["Work", " work ", "", "Home"]);
        assert_eq!(
            tags.into_iter().collect::<Vec<_>>(),
            vec!["home".to_string(), "work".to_string()]
        );
    }

    #[test]
    fn apply_patch_reports_changes_and_bumps_timestamp() {
        let mut page = Page::with_id("p1", "Draft", None, 1_000);
        let patch = PagePatch {
            icon: Some(Some("📝".to_string())),
            content: Some(json!({"blocks": []})),
            ..PagePatch::default()
        };
        assert!(page.apply_patch(&patch, 2_000));
        assert_eq!(page.updated_at, 2_000);
        assert_eq!(page.icon.as_deref(), Some("📝"));

        assert!(!page.apply_patch(&patch, 3_000));
        assert_eq!(page.updated_at, 2_000);
    }

    #[test]
    fn merge_keeps_older_fields_and_overrides_newer_ones() {
        let mut pending = PagePatch::title("First");
        pending.merge(PagePatch {
            icon: Some(None),
            ..PagePatch::default()
        });
        pending.merge(PagePatch::title("Second"));

        assert_eq!(pending.title.as_deref(), Some("Second"));
        assert_eq!(pending.icon, Some(None));
        assert!(pending.content.is_none());
    }
}
