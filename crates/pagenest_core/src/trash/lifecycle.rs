//! Soft delete, restore and purge of pages.
//!
//! # Responsibility
//! - Plan trash transitions from the in-memory snapshot.
//! - Commit each transition through the repository, then mirror it in the
//!   store.
//!
//! # Invariants
//! - Deleting a page moves its whole live subtree in one repository call.
//! - Only the deleted root records `child_count`.
//! - Restore never resurrects descendants implicitly.
//! - The store is never advanced past a failed repository call.

use crate::model::deleted_page::{DeletedPage, DeletedPageMetadata};
use crate::model::page::{Page, PageId};
use crate::repo::page_repo::{PageRepository, RepoError};
use crate::store::WorkspaceStore;
use crate::tree::hierarchy::ParentIndex;
use log::{error, info};
use std::collections::{HashMap, HashSet, VecDeque};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Errors from trash lifecycle operations.
#[derive(Debug)]
pub enum TrashError {
    /// No live page (delete) or trash entry (restore, purge) has this id.
    NotFound(PageId),
    /// Restore target is already live.
    AlreadyLive(PageId),
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for TrashError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "page not found: {id}"),
            Self::AlreadyLive(id) => write!(f, "page is not in trash: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TrashError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TrashError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::Conflict(id) => Self::AlreadyLive(id),
            other => Self::Repo(other),
        }
    }
}

/// Builds the trash entries produced by deleting `page_id` at `now_ms`.
///
/// Entries are ordered breadth-first with the deleted page first.
pub fn plan_delete(
    store: &WorkspaceStore,
    page_id: &str,
    now_ms: i64,
) -> Result<Vec<DeletedPage>, TrashError> {
    if !store.is_live(page_id) {
        return Err(TrashError::NotFound(page_id.to_string()));
    }
    let index = ParentIndex::new(store.pages());
    let members = index.subtree(page_id);
    let descendants = members.len().saturating_sub(1);

    Ok(members
        .into_iter()
        .map(|page| {
            let metadata = DeletedPageMetadata {
                original_path: index.ancestor_path(&page.id),
                child_count: (page.id == page_id)
                    .then(|| u32::try_from(descendants).unwrap_or(u32::MAX)),
                original_parent_id: page.parent_id.clone(),
            };
            DeletedPage::from_page(page, now_ms, metadata)
        })
        .collect())
}

/// Builds the page reinstated by restoring `page_id`.
///
/// `parent_id` is cleared when the original parent is not live.
pub fn plan_restore(store: &WorkspaceStore, page_id: &str) -> Result<Page, TrashError> {
    if store.is_live(page_id) {
        return Err(TrashError::AlreadyLive(page_id.to_string()));
    }
    let entry = store
        .deleted_page(page_id)
        .ok_or_else(|| TrashError::NotFound(page_id.to_string()))?;
    let mut page = entry.snapshot.clone();
    if let Some(parent_id) = page.parent_id.as_deref() {
        if !store.is_live(parent_id) {
            page.parent_id = None;
        }
    }
    Ok(page)
}

/// Trash entries that descend from `page_id` by snapshot parent links,
/// parent-first, the entry itself included.
pub fn trashed_descendants<'s>(store: &'s WorkspaceStore, page_id: &str) -> Vec<&'s DeletedPage> {
    let Some(root) = store.deleted_page(page_id) else {
        return Vec::new();
    };
    let mut children: HashMap<&str, Vec<&DeletedPage>> = HashMap::new();
    for entry in store.trash_by_recency() {
        if let Some(parent_id) = entry.snapshot.parent_id.as_deref() {
            children.entry(parent_id).or_default().push(entry);
        }
    }
    for list in children.values_mut() {
        list.sort_by(|a, b| a.id.cmp(&b.id));
    }

    let mut visited = HashSet::from([root.id.as_str()]);
    let mut queue = VecDeque::from([root]);
    let mut out = Vec::new();
    while let Some(entry) = queue.pop_front() {
        out.push(entry);
        for &child in children.get(entry.id.as_str()).map(Vec::as_slice).unwrap_or(&[]) {
            if visited.insert(child.id.as_str()) {
                queue.push_back(child);
            }
        }
    }
    out
}

/// Ids of trash entries eligible for purge at `now_ms`, sorted.
pub fn expired_ids(store: &WorkspaceStore, now_ms: i64) -> Vec<PageId> {
    let mut ids: Vec<PageId> = store
        .deleted_pages()
        .filter(|entry| entry.is_purge_eligible(now_ms))
        .map(|entry| entry.id.clone())
        .collect();
    ids.sort();
    ids
}

/// Trash state machine over one store and repository.
pub struct TrashLifecycle<'a, R: PageRepository> {
    repo: &'a R,
    store: &'a mut WorkspaceStore,
}

impl<'a, R: PageRepository> TrashLifecycle<'a, R> {
    pub fn new(repo: &'a R, store: &'a mut WorkspaceStore) -> Self {
        Self { repo, store }
    }

    /// Moves a live page and its live descendants to trash.
    pub fn delete(&mut self, page_id: &str, now_ms: i64) -> Result<Vec<DeletedPage>, TrashError> {
        let started_at = Instant::now();
        let entries = plan_delete(self.store, page_id, now_ms)?;
        if let Err(err) = self.repo.trash_pages(&entries) {
            error!(
                "event=trash_delete module=trash status=error page_id={} duration_ms={} error={}",
                page_id,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
        self.store.move_to_trash(&entries);
        info!(
            "event=trash_delete module=trash status=ok page_id={} pages={} duration_ms={}",
            page_id,
            entries.len(),
            started_at.elapsed().as_millis()
        );
        Ok(entries)
    }

    /// Reinstates one trashed page without its descendants.
    pub fn restore(&mut self, page_id: &str) -> Result<Page, TrashError> {
        let page = plan_restore(self.store, page_id)?;
        if let Err(err) = self.repo.restore_page(&page) {
            error!(
                "event=trash_restore module=trash status=error page_id={} error={}",
                page_id, err
            );
            return Err(err.into());
        }
        self.store.insert_page(page.clone());
        info!(
            "event=trash_restore module=trash status=ok page_id={} reparented_to_root={}",
            page_id,
            page.parent_id.is_none()
        );
        Ok(page)
    }

    /// Restores a trashed page and every trashed descendant, parent first.
    ///
    /// Stops at the first failure; pages restored before it stay live.
    pub fn restore_with_children(&mut self, page_id: &str) -> Result<Vec<Page>, TrashError> {
        if self.store.is_live(page_id) {
            return Err(TrashError::AlreadyLive(page_id.to_string()));
        }
        let ids: Vec<PageId> = trashed_descendants(self.store, page_id)
            .into_iter()
            .map(|entry| entry.id.clone())
            .collect();
        if ids.is_empty() {
            return Err(TrashError::NotFound(page_id.to_string()));
        }
        let mut restored = Vec::with_capacity(ids.len());
        for id in ids {
            restored.push(self.restore(&id)?);
        }
        Ok(restored)
    }

    /// Permanently removes one trash entry.
    pub fn purge(&mut self, page_id: &str) -> Result<(), TrashError> {
        if !self.store.is_deleted(page_id) {
            return Err(TrashError::NotFound(page_id.to_string()));
        }
        let ids = [page_id.to_string()];
        self.repo.purge_pages(&ids)?;
        self.store.remove_deleted(page_id);
        info!(
            "event=trash_purge module=trash status=ok page_id={}",
            page_id
        );
        Ok(())
    }

    /// Permanently removes every trash entry; returns how many were removed.
    pub fn empty_trash(&mut self) -> Result<usize, TrashError> {
        self.repo.purge_all()?;
        let removed = self.store.clear_trash();
        info!(
            "event=trash_empty module=trash status=ok removed={}",
            removed
        );
        Ok(removed)
    }

    /// Purges every entry whose retention window has elapsed at `now_ms`.
    pub fn sweep_expired(&mut self, now_ms: i64) -> Result<Vec<PageId>, TrashError> {
        let started_at = Instant::now();
        let ids = expired_ids(self.store, now_ms);
        if ids.is_empty() {
            return Ok(ids);
        }
        if let Err(err) = self.repo.purge_pages(&ids) {
            error!(
                "event=trash_sweep module=trash status=error candidates={} error={}",
                ids.len(),
                err
            );
            return Err(err.into());
        }
        for id in &ids {
            self.store.remove_deleted(id);
        }
        info!(
            "event=trash_sweep module=trash status=ok purged={} duration_ms={}",
            ids.len(),
            started_at.elapsed().as_millis()
        );
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::{expired_ids, plan_delete, plan_restore, trashed_descendants, TrashError};
    use crate::model::deleted_page::TRASH_RETENTION_MS;
    use crate::model::page::Page;
    use crate::store::WorkspaceStore;

    fn page(id: &str, title: &str, parent: Option<&str>) -> Page {
        Page::with_id(id, title, parent.map(str::to_string), 0)
    }

    fn store() -> WorkspaceStore {
        WorkspaceStore::from_parts(
            vec![
                page("root", "Root", None),
                page("child", "Child", Some("root")),
                page("grand", "Grandchild", Some("child")),
                page("other", "Other", None),
            ],
            Vec::new(),
        )
    }

    #[test]
    fn plan_delete_covers_subtree_and_counts_on_root_only() {
        let store = store();
        let entries = plan_delete(&store, "child", 100).expect("child is live");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "child");
        assert_eq!(entries[0].metadata.child_count, Some(1));
        assert_eq!(entries[0].metadata.original_path.as_deref(), Some("Root"));
        assert_eq!(entries[1].metadata.child_count, None);
        assert_eq!(
            entries[1].metadata.original_path.as_deref(),
            Some("Root / Child")
        );
        assert!(entries
            .iter()
            .all(|entry| entry.permanently_delete_at == 100 + TRASH_RETENTION_MS));
    }

    #[test]
    fn plan_delete_rejects_unknown_pages() {
        assert!(matches!(
            plan_delete(&store(), "ghost", 0),
            Err(TrashError::NotFound(id)) if id == "ghost"
        ));
    }

    #[test]
    fn plan_restore_drops_parent_that_is_not_live() {
        let mut store = store();
        let entries = plan_delete(&store, "child", 0).expect("plan");
        store.move_to_trash(&entries);

        let restored = plan_restore(&store, "grand").expect("grand is trashed");
        assert_eq!(restored.parent_id, None);
        let restored = plan_restore(&store, "child").expect("child is trashed");
        assert_eq!(restored.parent_id.as_deref(), Some("root"));
        assert!(matches!(
            plan_restore(&store, "root"),
            Err(TrashError::AlreadyLive(_))
        ));
    }

    #[test]
    fn trashed_descendants_are_parent_first() {
        let mut store = store();
        let entries = plan_delete(&store, "root", 0).expect("plan");
        store.move_to_trash(&entries);
        let ids: Vec<&str> = trashed_descendants(&store, "root")
            .into_iter()
            .map(|entry| entry.id.as_str())
            .collect();
        assert_eq!(ids, vec!["root", "child", "grand"]);
    }

    #[test]
    fn expired_ids_respect_deadline() {
        let mut store = store();
        let old = plan_delete(&store, "other", 0).expect("plan");
        store.move_to_trash(&old);
        let recent = plan_delete(&store, "root", 1_000).expect("plan");
        store.move_to_trash(&recent);
        assert_eq!(expired_ids(&store, TRASH_RETENTION_MS), vec!["other"]);
        assert_eq!(expired_ids(&store, TRASH_RETENTION_MS - 1), Vec::<String>::new());
    }
}
