//! Page and trash repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist live pages, their tags, and trash entries.
//! - Keep SQL details and transaction boundaries inside the repository.
//!
//! # Invariants
//! - A page id lives in exactly one of `pages` or `deleted_pages`.
//! - Moving pages to trash, restoring, and tag replacement are atomic.
//! - Read paths reject undecodable persisted rows instead of masking them,
//!   except page content, which is opaque and left to the content codec.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::deleted_page::{DeletedPage, DeletedPageMetadata};
use crate::model::page::{Page, PageId, PagePatch};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde_json::Value;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

const PAGE_SELECT_SQL: &str = "SELECT
    id,
    title,
    icon,
    parent_id,
    content,
    is_favorite,
    cover_url,
    is_public,
    created_at,
    updated_at
FROM pages";

const DELETED_PAGE_SELECT_SQL: &str = "SELECT
    id,
    title,
    icon,
    deleted_at,
    permanently_delete_at,
    original_path,
    child_count,
    original_parent_id,
    snapshot
FROM deleted_pages";

/// Result type used by page repository operations.
pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from page repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target page (or trash entry) does not exist.
    NotFound(PageId),
    /// Id is already taken by a live page or a trash entry.
    Conflict(PageId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    /// Storage backend is unreachable (used by remote or test doubles).
    Unavailable(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "page not found: {id}"),
            Self::Conflict(id) => write!(f, "page id already in use: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "page repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "page repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted page data: {message}"),
            Self::Unavailable(message) => write!(f, "page storage unavailable: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persistence collaborator for pages and trash entries.
pub trait PageRepository {
    /// Inserts a new live page.
    fn create_page(&self, page: &Page) -> RepoResult<()>;
    /// Applies a partial update to a live page and returns the stored result.
    fn update_page(&self, id: &str, patch: &PagePatch, now_ms: i64) -> RepoResult<Page>;
    /// Loads one live page.
    fn get_page(&self, id: &str) -> RepoResult<Option<Page>>;
    /// Lists all live pages.
    fn list_pages(&self) -> RepoResult<Vec<Page>>;
    /// Lists all trash entries, most recently deleted first.
    fn list_deleted_pages(&self) -> RepoResult<Vec<DeletedPage>>;
    /// Moves pages into the trash in one atomic step.
    fn trash_pages(&self, entries: &[DeletedPage]) -> RepoResult<()>;
    /// Removes the trash entry for `page.id` and reinstates `page`, atomically.
    fn restore_page(&self, page: &Page) -> RepoResult<()>;
    /// Permanently removes the given trash entries; returns how many existed.
    fn purge_pages(&self, ids: &[PageId]) -> RepoResult<usize>;
    /// Permanently removes every trash entry.
    fn purge_all(&self) -> RepoResult<usize>;
}

/// SQLite-backed page repository.
pub struct SqlitePageRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePageRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_page_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Lists distinct tags across live pages.
    pub fn list_tags(&self) -> RepoResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT tag FROM page_tags ORDER BY tag ASC;")?;
        let mut rows = stmt.query([])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(row.get(0)?);
        }
        Ok(tags)
    }
}

impl PageRepository for SqlitePageRepository<'_> {
    fn create_page(&self, page: &Page) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if page_exists(&tx, &page.id)? || deleted_page_exists(&tx, &page.id)? {
            return Err(RepoError::Conflict(page.id.clone()));
        }
        insert_page(&tx, page)?;
        tx.commit()?;
        Ok(())
    }

    fn update_page(&self, id: &str, patch: &PagePatch, now_ms: i64) -> RepoResult<Page> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut page =
            load_page(&tx, id)?.ok_or_else(|| RepoError::NotFound(id.to_string()))?;
        if !page.apply_patch(patch, now_ms) {
            return Ok(page);
        }

        tx.execute(
            "UPDATE pages
             SET
                title = ?2,
                icon = ?3,
                parent_id = ?4,
                content = ?5,
                is_favorite = ?6,
                cover_url = ?7,
                is_public = ?8,
                updated_at = ?9
             WHERE id = ?1;",
            params![
                page.id,
                page.title,
                page.icon,
                page.parent_id,
                encode_json(&page.content)?,
                bool_to_int(page.is_favorite),
                page.cover_url,
                bool_to_int(page.is_public),
                page.updated_at,
            ],
        )?;
        if patch.tags.is_some() {
            replace_tags(&tx, &page.id, &page.tags)?;
        }
        tx.commit()?;
        Ok(page)
    }

    fn get_page(&self, id: &str) -> RepoResult<Option<Page>> {
        load_page(self.conn, id)
    }

    fn list_pages(&self) -> RepoResult<Vec<Page>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PAGE_SELECT_SQL} ORDER BY created_at ASC, id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut pages = Vec::new();
        while let Some(row) = rows.next()? {
            let mut page = parse_page_row(row)?;
            page.tags = load_tags(self.conn, &page.id)?;
            pages.push(page);
        }
        Ok(pages)
    }

    fn list_deleted_pages(&self) -> RepoResult<Vec<DeletedPage>> {
        let mut stmt = self.conn.prepare(&format!(
            "{DELETED_PAGE_SELECT_SQL} ORDER BY deleted_at DESC, id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_deleted_page_row(row)?);
        }
        Ok(entries)
    }

    fn trash_pages(&self, entries: &[DeletedPage]) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for entry in entries {
            let removed = tx.execute("DELETE FROM pages WHERE id = ?1;", [entry.id.as_str()])?;
            if removed == 0 {
                return Err(RepoError::NotFound(entry.id.clone()));
            }
            tx.execute(
                "INSERT INTO deleted_pages (
                    id,
                    title,
                    icon,
                    deleted_at,
                    permanently_delete_at,
                    original_path,
                    child_count,
                    original_parent_id,
                    snapshot
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
                params![
                    entry.id,
                    entry.title,
                    entry.icon,
                    entry.deleted_at,
                    entry.permanently_delete_at,
                    entry.metadata.original_path,
                    entry.metadata.child_count,
                    entry.metadata.original_parent_id,
                    encode_snapshot(&entry.snapshot)?,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn restore_page(&self, page: &Page) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let removed = tx.execute("DELETE FROM deleted_pages WHERE id = ?1;", [page.id.as_str()])?;
        if removed == 0 {
            return Err(RepoError::NotFound(page.id.clone()));
        }
        if page_exists(&tx, &page.id)? {
            return Err(RepoError::Conflict(page.id.clone()));
        }
        insert_page(&tx, page)?;
        tx.commit()?;
        Ok(())
    }

    fn purge_pages(&self, ids: &[PageId]) -> RepoResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut removed = 0;
        for id in ids {
            removed += tx.execute("DELETE FROM deleted_pages WHERE id = ?1;", [id.as_str()])?;
        }
        tx.commit()?;
        Ok(removed)
    }

    fn purge_all(&self) -> RepoResult<usize> {
        Ok(self.conn.execute("DELETE FROM deleted_pages;", [])?)
    }
}

fn insert_page(conn: &Connection, page: &Page) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO pages (
            id,
            title,
            icon,
            parent_id,
            content,
            is_favorite,
            cover_url,
            is_public,
            created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
        params![
            page.id,
            page.title,
            page.icon,
            page.parent_id,
            encode_json(&page.content)?,
            bool_to_int(page.is_favorite),
            page.cover_url,
            bool_to_int(page.is_public),
            page.created_at,
            page.updated_at,
        ],
    )?;
    replace_tags(conn, &page.id, &page.tags)
}

fn replace_tags(conn: &Connection, page_id: &str, tags: &BTreeSet<String>) -> RepoResult<()> {
    conn.execute("DELETE FROM page_tags WHERE page_id = ?1;", [page_id])?;
    for tag in tags {
        conn.execute(
            "INSERT OR IGNORE INTO page_tags (page_id, tag) VALUES (?1, ?2);",
            params![page_id, tag],
        )?;
    }
    Ok(())
}

fn load_page(conn: &Connection, id: &str) -> RepoResult<Option<Page>> {
    let mut stmt = conn.prepare(&format!("{PAGE_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        let mut page = parse_page_row(row)?;
        page.tags = load_tags(conn, &page.id)?;
        return Ok(Some(page));
    }
    Ok(None)
}

fn load_tags(conn: &Connection, page_id: &str) -> RepoResult<BTreeSet<String>> {
    let mut stmt = conn.prepare("SELECT tag FROM page_tags WHERE page_id = ?1;")?;
    let mut rows = stmt.query([page_id])?;
    let mut tags = BTreeSet::new();
    while let Some(row) = rows.next()? {
        tags.insert(row.get(0)?);
    }
    Ok(tags)
}

fn page_exists(conn: &Connection, id: &str) -> RepoResult<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM pages WHERE id = ?1;", [id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn deleted_page_exists(conn: &Connection, id: &str) -> RepoResult<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM deleted_pages WHERE id = ?1;", [id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

fn parse_page_row(row: &Row<'_>) -> RepoResult<Page> {
    let content_text: String = row.get("content")?;
    Ok(Page {
        id: row.get("id")?,
        title: row.get("title")?,
        icon: row.get("icon")?,
        parent_id: row.get("parent_id")?,
        content: decode_content(content_text),
        tags: BTreeSet::new(),
        is_favorite: int_to_bool(row.get("is_favorite")?, "pages.is_favorite")?,
        cover_url: row.get("cover_url")?,
        is_public: int_to_bool(row.get("is_public")?, "pages.is_public")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_deleted_page_row(row: &Row<'_>) -> RepoResult<DeletedPage> {
    let id: String = row.get("id")?;
    let snapshot_text: String = row.get("snapshot")?;
    let snapshot: Page = serde_json::from_str(&snapshot_text).map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid snapshot for `{id}` in deleted_pages.snapshot: {err}"
        ))
    })?;
    Ok(DeletedPage {
        id,
        title: row.get("title")?,
        icon: row.get("icon")?,
        deleted_at: row.get("deleted_at")?,
        permanently_delete_at: row.get("permanently_delete_at")?,
        metadata: DeletedPageMetadata {
            original_path: row.get("original_path")?,
            child_count: row.get("child_count")?,
            original_parent_id: row.get("original_parent_id")?,
        },
        snapshot,
    })
}

// Content is opaque: text that is not valid JSON is kept as a string value.
fn decode_content(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

fn encode_json(value: &Value) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("content is not serializable: {err}")))
}

fn encode_snapshot(page: &Page) -> RepoResult<String> {
    serde_json::to_string(page)
        .map_err(|err| RepoError::InvalidData(format!("snapshot is not serializable: {err}")))
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

fn int_to_bool(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

fn ensure_page_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["pages", "page_tags", "deleted_pages"] {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}
