use pagenest_core::db::open_db_in_memory;
use pagenest_core::{
    build_tree, DeletedPage, ManualClock, Page, PageId, PagePatch, PageRepository, RepoError,
    RepoResult, SqlitePageRepository, TrashError, TrashLifecycle, Workspace, WorkspaceConfig,
    WorkspaceError, WorkspaceStore, TRASH_RETENTION_MS,
};
use std::cell::Cell;

/// Repository double whose writes can be switched to fail.
#[derive(Default)]
struct FlakyRepository {
    fail_writes: Cell<bool>,
    write_calls: Cell<usize>,
}

impl FlakyRepository {
    fn write(&self) -> RepoResult<()> {
        self.write_calls.set(self.write_calls.get() + 1);
        if self.fail_writes.get() {
            Err(RepoError::Unavailable("disk detached".to_string()))
        } else {
            Ok(())
        }
    }
}

impl PageRepository for FlakyRepository {
    fn create_page(&self, _page: &Page) -> RepoResult<()> {
        self.write()
    }

    fn update_page(&self, id: &str, _patch: &PagePatch, _now_ms: i64) -> RepoResult<Page> {
        self.write()?;
        Err(RepoError::NotFound(id.to_string()))
    }

    fn get_page(&self, _id: &str) -> RepoResult<Option<Page>> {
        Ok(None)
    }

    fn list_pages(&self) -> RepoResult<Vec<Page>> {
        Ok(Vec::new())
    }

    fn list_deleted_pages(&self) -> RepoResult<Vec<DeletedPage>> {
        Ok(Vec::new())
    }

    fn trash_pages(&self, _entries: &[DeletedPage]) -> RepoResult<()> {
        self.write()
    }

    fn restore_page(&self, _page: &Page) -> RepoResult<()> {
        self.write()
    }

    fn purge_pages(&self, ids: &[PageId]) -> RepoResult<usize> {
        self.write().map(|()| ids.len())
    }

    fn purge_all(&self) -> RepoResult<usize> {
        self.write().map(|()| 0)
    }
}

fn page(id: &str, title: &str, parent: Option<&str>) -> Page {
    Page::with_id(id, title, parent.map(str::to_string), 0)
}

fn family() -> Vec<Page> {
    vec![
        page("root", "Root", None),
        page("child", "Child", Some("root")),
        page("grand", "Grandchild", Some("child")),
    ]
}

#[test]
fn deleting_child_trashes_grandchild_and_detaches_from_root() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePageRepository::try_new(&conn).unwrap();
    let clock = ManualClock::new(10_000);
    let mut workspace =
        Workspace::with_clock(repo, WorkspaceConfig::default(), &clock).unwrap();

    let root = workspace.create_page("Root", None).unwrap();
    let child = workspace.create_page("Child", Some(root.id.as_str())).unwrap();
    let grand = workspace.create_page("Grandchild", Some(child.id.as_str())).unwrap();

    clock.advance(500);
    let entries = workspace.delete_page(&child.id).unwrap();
    assert_eq!(entries.len(), 2);

    let child_entry = entries.iter().find(|entry| entry.id == child.id).unwrap();
    let grand_entry = entries.iter().find(|entry| entry.id == grand.id).unwrap();
    assert_eq!(child_entry.metadata.child_count, Some(1));
    assert_eq!(grand_entry.metadata.child_count, None);
    assert_eq!(child_entry.metadata.original_path.as_deref(), Some("Root"));
    assert_eq!(
        grand_entry.metadata.original_path.as_deref(),
        Some("Root / Child")
    );
    assert_eq!(
        child_entry.metadata.original_parent_id.as_deref(),
        Some(root.id.as_str())
    );
    for entry in &entries {
        assert_eq!(entry.deleted_at, 10_500);
        assert_eq!(entry.permanently_delete_at, 10_500 + 2_592_000_000);
    }

    let forest = workspace.tree();
    assert_eq!(forest.len(), 1);
    assert!(forest[0].children.is_empty());
    assert!(workspace.children(&root.id).is_empty());
}

#[test]
fn cascade_counts_every_descendant_on_the_deleted_root() {
    let mut store = WorkspaceStore::from_parts(family(), Vec::new());
    let repo = FlakyRepository::default();
    let entries = TrashLifecycle::new(&repo, &mut store)
        .delete("root", 7)
        .unwrap();

    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].id, "root");
    assert_eq!(entries[0].metadata.child_count, Some(2));
    assert!(entries[1..]
        .iter()
        .all(|entry| entry.metadata.child_count.is_none()));
    assert_eq!(store.live_len(), 0);
    assert_eq!(store.trash_len(), 3);
}

#[test]
fn failed_repository_call_leaves_store_untouched() {
    let mut store = WorkspaceStore::from_parts(family(), Vec::new());
    let repo = FlakyRepository::default();
    repo.fail_writes.set(true);

    let err = TrashLifecycle::new(&repo, &mut store)
        .delete("child", 7)
        .unwrap_err();
    assert!(matches!(err, TrashError::Repo(RepoError::Unavailable(_))));
    assert_eq!(repo.write_calls.get(), 1);
    assert_eq!(store.live_len(), 3);
    assert_eq!(store.trash_len(), 0);

    repo.fail_writes.set(false);
    TrashLifecycle::new(&repo, &mut store)
        .delete("child", 7)
        .unwrap();
    repo.fail_writes.set(true);
    let err = TrashLifecycle::new(&repo, &mut store)
        .restore("child")
        .unwrap_err();
    assert!(matches!(err, TrashError::Repo(_)));
    assert!(store.is_deleted("child"));
    assert!(!store.is_live("child"));
}

#[test]
fn restore_reinstates_only_the_target_page() {
    let mut store = WorkspaceStore::from_parts(family(), Vec::new());
    let repo = FlakyRepository::default();
    let mut lifecycle = TrashLifecycle::new(&repo, &mut store);
    lifecycle.delete("child", 100).unwrap();

    let restored = lifecycle.restore("child").unwrap();
    assert_eq!(restored.parent_id.as_deref(), Some("root"));
    assert!(matches!(
        lifecycle.restore("child"),
        Err(TrashError::AlreadyLive(_))
    ));
    assert!(matches!(
        lifecycle.restore("nobody"),
        Err(TrashError::NotFound(_))
    ));

    assert!(store.is_live("child"));
    assert!(store.is_deleted("grand"));
    let forest = build_tree(store.pages());
    assert_eq!(forest[0].descendant_count(), 1);
}

#[test]
fn restoring_an_orphan_promotes_it_to_root() {
    let mut store = WorkspaceStore::from_parts(family(), Vec::new());
    let repo = FlakyRepository::default();
    let mut lifecycle = TrashLifecycle::new(&repo, &mut store);
    lifecycle.delete("child", 100).unwrap();

    let restored = lifecycle.restore("grand").unwrap();
    assert!(restored.is_root());
}

#[test]
fn restore_with_children_brings_back_the_subtree_parent_first() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePageRepository::try_new(&conn).unwrap();
    let clock = ManualClock::new(0);
    let mut workspace =
        Workspace::with_clock(repo, WorkspaceConfig::default(), &clock).unwrap();
    let root = workspace.create_page("Root", None).unwrap();
    let child = workspace.create_page("Child", Some(root.id.as_str())).unwrap();
    workspace.create_page("Grandchild", Some(child.id.as_str())).unwrap();

    workspace.delete_page(&root.id).unwrap();
    let restored = workspace.restore_page_with_children(&root.id).unwrap();
    let titles: Vec<&str> = restored.iter().map(|page| page.title.as_str()).collect();
    assert_eq!(titles, vec!["Root", "Child", "Grandchild"]);
    assert!(restored[1..].iter().all(|page| page.parent_id.is_some()));
    assert!(workspace.list_deleted_pages().is_empty());
    assert_eq!(workspace.tree()[0].descendant_count(), 2);
}

#[test]
fn sweep_purges_only_expired_entries() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePageRepository::try_new(&conn).unwrap();
    let clock = ManualClock::new(0);
    let mut workspace =
        Workspace::with_clock(repo, WorkspaceConfig::default(), &clock).unwrap();
    let old = workspace.create_page("Old", None).unwrap();
    let fresh = workspace.create_page("Fresh", None).unwrap();

    workspace.delete_page(&old.id).unwrap();
    clock.set(TRASH_RETENTION_MS / 2);
    workspace.delete_page(&fresh.id).unwrap();

    clock.set(TRASH_RETENTION_MS - 1);
    assert!(workspace.purge_expired().unwrap().is_empty());

    clock.set(TRASH_RETENTION_MS);
    assert_eq!(workspace.purge_expired().unwrap(), vec![old.id.clone()]);
    let remaining: Vec<&str> = workspace
        .list_deleted_pages()
        .into_iter()
        .map(|entry| entry.id.as_str())
        .collect();
    assert_eq!(remaining, vec![fresh.id.as_str()]);
}

#[test]
fn purge_and_empty_trash_are_permanent() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePageRepository::try_new(&conn).unwrap();
    let mut workspace = Workspace::open(repo, WorkspaceConfig::default()).unwrap();
    let a = workspace.create_page("A", None).unwrap();
    let b = workspace.create_page("B", None).unwrap();
    let c = workspace.create_page("C", None).unwrap();
    for id in [&a.id, &b.id, &c.id] {
        workspace.delete_page(id).unwrap();
    }

    workspace.permanently_delete_page(&a.id).unwrap();
    assert!(matches!(
        workspace.restore_page(&a.id),
        Err(WorkspaceError::NotFound(_))
    ));
    assert!(matches!(
        workspace.permanently_delete_page(&a.id),
        Err(WorkspaceError::NotFound(_))
    ));

    assert_eq!(workspace.empty_trash().unwrap(), 2);
    assert!(workspace.list_deleted_pages().is_empty());
    assert!(workspace.list_pages().is_empty());
}

#[test]
fn trash_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pages.db");
    let deleted_id = {
        let conn = pagenest_core::open_db(&path).unwrap();
        let repo = SqlitePageRepository::try_new(&conn).unwrap();
        let mut workspace = Workspace::open(repo, WorkspaceConfig::default()).unwrap();
        let page = workspace.create_page("Keep me", None).unwrap();
        workspace.delete_page(&page.id).unwrap();
        page.id
    };

    let conn = pagenest_core::open_db(&path).unwrap();
    let repo = SqlitePageRepository::try_new(&conn).unwrap();
    let mut workspace = Workspace::open(repo, WorkspaceConfig::default()).unwrap();
    assert_eq!(workspace.list_deleted_pages()[0].title, "Keep me");
    let restored = workspace.restore_page(&deleted_id).unwrap();
    assert_eq!(restored.title, "Keep me");
}
