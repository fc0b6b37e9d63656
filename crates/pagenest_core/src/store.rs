//! In-memory workspace snapshot.
//!
//! # Responsibility
//! - Hold the live page set and the trash set that reads are computed from.
//!
//! # Invariants
//! - A page id is present in at most one of the live and trash maps.
//! - Mutators are crate-private and only called after the repository
//!   accepted the matching write.

use crate::model::deleted_page::DeletedPage;
use crate::model::page::{Page, PageId};
use crate::repo::page_repo::{PageRepository, RepoResult};
use std::collections::HashMap;

/// Live pages plus trash entries.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceStore {
    live: HashMap<PageId, Page>,
    trash: HashMap<PageId, DeletedPage>,
}

impl WorkspaceStore {
    /// Builds a store from already-loaded records.
    ///
    /// Trash entries whose id is also live are dropped; the live page wins.
    pub fn from_parts(
        pages: impl IntoIterator<Item = Page>,
        deleted: impl IntoIterator<Item = DeletedPage>,
    ) -> Self {
        let live: HashMap<PageId, Page> = pages
            .into_iter()
            .map(|page| (page.id.clone(), page))
            .collect();
        let trash = deleted
            .into_iter()
            .filter(|entry| !live.contains_key(&entry.id))
            .map(|entry| (entry.id.clone(), entry))
            .collect();
        Self { live, trash }
    }

    /// Loads both sets from a repository.
    pub fn load<R: PageRepository>(repo: &R) -> RepoResult<Self> {
        Ok(Self::from_parts(
            repo.list_pages()?,
            repo.list_deleted_pages()?,
        ))
    }

    pub fn page(&self, id: &str) -> Option<&Page> {
        self.live.get(id)
    }

    pub fn deleted_page(&self, id: &str) -> Option<&DeletedPage> {
        self.trash.get(id)
    }

    pub fn is_live(&self, id: &str) -> bool {
        self.live.contains_key(id)
    }

    pub fn is_deleted(&self, id: &str) -> bool {
        self.trash.contains_key(id)
    }

    /// Unordered iterator over live pages.
    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.live.values()
    }

    /// Unordered iterator over trash entries.
    pub fn deleted_pages(&self) -> impl Iterator<Item = &DeletedPage> {
        self.trash.values()
    }

    /// Live pages ordered by creation time, then id.
    pub fn pages_by_creation(&self) -> Vec<&Page> {
        let mut pages: Vec<&Page> = self.live.values().collect();
        pages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        pages
    }

    /// Trash entries, most recently deleted first, then id.
    pub fn trash_by_recency(&self) -> Vec<&DeletedPage> {
        let mut entries: Vec<&DeletedPage> = self.trash.values().collect();
        entries.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at).then_with(|| a.id.cmp(&b.id)));
        entries
    }

    pub fn live_len(&self) -> usize {
        self.live.len()
    }

    pub fn trash_len(&self) -> usize {
        self.trash.len()
    }

    pub(crate) fn insert_page(&mut self, page: Page) {
        self.trash.remove(&page.id);
        self.live.insert(page.id.clone(), page);
    }

    pub(crate) fn move_to_trash(&mut self, entries: &[DeletedPage]) {
        for entry in entries {
            self.live.remove(&entry.id);
            self.trash.insert(entry.id.clone(), entry.clone());
        }
    }

    pub(crate) fn remove_deleted(&mut self, id: &str) -> Option<DeletedPage> {
        self.trash.remove(id)
    }

    pub(crate) fn clear_trash(&mut self) -> usize {
        let count = self.trash.len();
        self.trash.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::WorkspaceStore;
    use crate::model::deleted_page::{DeletedPage, DeletedPageMetadata};
    use crate::model::page::Page;

    #[test]
    fn live_page_shadows_stale_trash_entry() {
        let page = Page::with_id("p1", "One", None, 10);
        let stale = DeletedPage::from_page(&page, 5, DeletedPageMetadata::default());
        let store = WorkspaceStore::from_parts(vec![page], vec![stale]);
        assert!(store.is_live("p1"));
        assert!(!store.is_deleted("p1"));
    }

    #[test]
    fn move_to_trash_and_reinsert_keep_sets_disjoint() {
        let page = Page::with_id("p1", "One", None, 10);
        let mut store = WorkspaceStore::from_parts(vec![page.clone()], Vec::new());
        let entry = DeletedPage::from_page(&page, 20, DeletedPageMetadata::default());

        store.move_to_trash(&[entry]);
        assert_eq!((store.live_len(), store.trash_len()), (0, 1));

        store.insert_page(page);
        assert_eq!((store.live_len(), store.trash_len()), (1, 0));
    }

    #[test]
    fn orderings_are_deterministic() {
        let a = Page::with_id("a", "A", None, 2);
        let b = Page::with_id("b", "B", None, 1);
        let c = Page::with_id("c", "C", None, 1);
        let store = WorkspaceStore::from_parts(vec![a, b, c], Vec::new());
        let ids: Vec<&str> = store
            .pages_by_creation()
            .into_iter()
            .map(|page| page.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }
}
