use pagenest_core::db::open_db_in_memory;
use pagenest_core::{
    DeletedPage, DeletedPageMetadata, Page, PagePatch, PageRepository, RepoError,
    SqlitePageRepository,
};
use rusqlite::Connection;
use serde_json::json;
use std::collections::BTreeSet;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn page(id: &str, title: &str, parent: Option<&str>) -> Page {
    Page::with_id(id, title, parent.map(str::to_string), 1_000)
}

#[test]
fn try_new_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqlitePageRepository::try_new(&conn)
        .err()
        .expect("bare connection must be rejected");
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn create_and_get_round_trips_all_fields() {
    let conn = setup();
    let repo = SqlitePageRepository::try_new(&conn).unwrap();

    let mut original = page("p1", "Plans", None);
    original.icon = Some("🗺️".to_string());
    original.content = json!({"blocks": [{"id": "b1", "type": "paragraph", "content": "hi"}]});
    original.tags = BTreeSet::from(["work".to_string(), "q3".to_string()]);
    original.is_favorite = true;
    original.cover_url = Some("https://example.test/cover.png".to_string());
    repo.create_page(&original).unwrap();

    let loaded = repo.get_page("p1").unwrap().expect("page should exist");
    assert_eq!(loaded, original);
    assert!(repo.get_page("missing").unwrap().is_none());
}

#[test]
fn duplicate_ids_conflict() {
    let conn = setup();
    let repo = SqlitePageRepository::try_new(&conn).unwrap();
    repo.create_page(&page("p1", "A", None)).unwrap();

    let err = repo.create_page(&page("p1", "B", None)).unwrap_err();
    assert!(matches!(err, RepoError::Conflict(id) if id == "p1"));
}

#[test]
fn update_applies_patch_and_replaces_tags() {
    let conn = setup();
    let repo = SqlitePageRepository::try_new(&conn).unwrap();
    let mut original = page("p1", "Draft", None);
    original.tags = BTreeSet::from(["old".to_string()]);
    repo.create_page(&original).unwrap();

    let patch = PagePatch {
        title: Some("Final".to_string()),
        tags: Some(BTreeSet::from(["New".to_string(), " new ".to_string()])),
        ..PagePatch::default()
    };
    let updated = repo.update_page("p1", &patch, 2_000).unwrap();
    assert_eq!(updated.title, "Final");
    assert_eq!(updated.updated_at, 2_000);

    let loaded = repo.get_page("p1").unwrap().unwrap();
    assert_eq!(loaded.tags, BTreeSet::from(["new".to_string()]));
    assert_eq!(repo.list_tags().unwrap(), vec!["new".to_string()]);

    let err = repo
        .update_page("ghost", &PagePatch::title("x"), 3_000)
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(_)));
}

#[test]
fn non_json_content_is_read_back_as_text() {
    let conn = setup();
    conn.execute(
        "INSERT INTO pages (id, title, content, created_at, updated_at)
         VALUES ('legacy', 'Legacy', 'just words', 0, 0);",
        [],
    )
    .unwrap();
    let repo = SqlitePageRepository::try_new(&conn).unwrap();
    let loaded = repo.get_page("legacy").unwrap().unwrap();
    assert_eq!(loaded.content, json!("just words"));
}

#[test]
fn trash_and_restore_move_rows_atomically() {
    let conn = setup();
    let repo = SqlitePageRepository::try_new(&conn).unwrap();
    let root = page("root", "Root", None);
    let mut child = page("child", "Child", Some("root"));
    child.tags = BTreeSet::from(["kept".to_string()]);
    repo.create_page(&root).unwrap();
    repo.create_page(&child).unwrap();

    let entry = DeletedPage::from_page(
        &child,
        5_000,
        DeletedPageMetadata {
            original_path: Some("Root".to_string()),
            child_count: Some(0),
            original_parent_id: Some("root".to_string()),
        },
    );
    repo.trash_pages(std::slice::from_ref(&entry)).unwrap();

    assert!(repo.get_page("child").unwrap().is_none());
    let trashed = repo.list_deleted_pages().unwrap();
    assert_eq!(trashed, vec![entry]);

    repo.restore_page(&child).unwrap();
    assert_eq!(repo.get_page("child").unwrap(), Some(child));
    assert!(repo.list_deleted_pages().unwrap().is_empty());
}

#[test]
fn failed_trash_batch_leaves_everything_live() {
    let conn = setup();
    let repo = SqlitePageRepository::try_new(&conn).unwrap();
    let live = page("live", "Live", None);
    repo.create_page(&live).unwrap();
    let ghost = page("ghost", "Ghost", None);

    let entries = vec![
        DeletedPage::from_page(&live, 0, DeletedPageMetadata::default()),
        DeletedPage::from_page(&ghost, 0, DeletedPageMetadata::default()),
    ];
    let err = repo.trash_pages(&entries).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == "ghost"));
    assert!(repo.get_page("live").unwrap().is_some());
    assert!(repo.list_deleted_pages().unwrap().is_empty());
}

#[test]
fn purge_removes_only_named_entries() {
    let conn = setup();
    let repo = SqlitePageRepository::try_new(&conn).unwrap();
    let a = page("a", "A", None);
    let b = page("b", "B", None);
    repo.create_page(&a).unwrap();
    repo.create_page(&b).unwrap();
    repo.trash_pages(&[
        DeletedPage::from_page(&a, 0, DeletedPageMetadata::default()),
        DeletedPage::from_page(&b, 10, DeletedPageMetadata::default()),
    ])
    .unwrap();

    assert_eq!(
        repo.purge_pages(&["a".to_string(), "missing".to_string()])
            .unwrap(),
        1
    );
    let remaining: Vec<String> = repo
        .list_deleted_pages()
        .unwrap()
        .into_iter()
        .map(|entry| entry.id)
        .collect();
    assert_eq!(remaining, vec!["b".to_string()]);
    assert_eq!(repo.purge_all().unwrap(), 1);
}
