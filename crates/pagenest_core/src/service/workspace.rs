//! Page workspace use-case service.
//!
//! # Responsibility
//! - Validate page writes (parents, cycles, titles, properties) above the
//!   repository layer.
//! - Own the in-memory snapshot and the autosave queue for one workspace.
//! - Expose read models: tree, breadcrumbs, projections, backlinks, tags.
//!
//! # Invariants
//! - Every write reaches the repository before the snapshot changes.
//! - Re-parenting never creates a parent cycle.
//! - A parent must be a live page.
//! - Page properties always satisfy the governing schema at write time.

use crate::autosave::queue::{AutosaveQueue, DueSave, SaveOutcome};
use crate::clock::{Clock, SystemClock};
use crate::config::WorkspaceConfig;
use crate::content::codec::{decode, encode, PageDocument};
use crate::links::backlinks::{index_backlinks, Backlink, BacklinkIndex};
use crate::model::deleted_page::DeletedPage;
use crate::model::page::{normalize_tags, Page, PageId, PagePatch};
use crate::model::property::{validate_properties, validate_schema, PropertyConfig, PropertyError};
use crate::repo::page_repo::{PageRepository, RepoError};
use crate::service::template::PageTemplate;
use crate::store::WorkspaceStore;
use crate::trash::lifecycle::{TrashError, TrashLifecycle};
use crate::tree::builder::{build_tree, compare_pages, TreeNode};
use crate::tree::hierarchy::ParentIndex;
use crate::view::projector::{project_database, ProjectedView};
use chrono::{DateTime, NaiveDate, Utc};
use log::{info, warn};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Longest accepted page title, in characters.
pub const MAX_TITLE_CHARS: usize = 500;

/// Tag attached to pages produced by the daily-note generator.
pub const DAILY_NOTE_TAG: &str = "daily";

const DAILY_NOTE_TITLE_FORMAT: &str = "%Y-%m-%d";

/// Errors from workspace operations.
#[derive(Debug)]
pub enum WorkspaceError {
    /// Target page is not live (or, for trash operations, not in trash).
    NotFound(PageId),
    /// Target is in the wrong lifecycle state for the operation.
    Conflict(PageId),
    /// Requested parent is not a live page.
    ParentNotFound(PageId),
    /// Re-parenting would make the page its own ancestor.
    CycleDetected { page_id: PageId, parent_id: PageId },
    /// Title is too long or contains line breaks.
    InvalidTitle(String),
    /// Content properties do not satisfy the governing schema.
    InvalidProperty(PropertyError),
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for WorkspaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "page not found: {id}"),
            Self::Conflict(id) => write!(f, "page is in a conflicting state: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent page not found: {id}"),
            Self::CycleDetected { page_id, parent_id } => write!(
                f,
                "move would create cycle: page {page_id} under parent {parent_id}"
            ),
            Self::InvalidTitle(reason) => write!(f, "invalid title: {reason}"),
            Self::InvalidProperty(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WorkspaceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidProperty(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for WorkspaceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::Conflict(id) => Self::Conflict(id),
            other => Self::Repo(other),
        }
    }
}

impl From<TrashError> for WorkspaceError {
    fn from(value: TrashError) -> Self {
        match value {
            TrashError::NotFound(id) => Self::NotFound(id),
            TrashError::AlreadyLive(id) => Self::Conflict(id),
            TrashError::Repo(err) => Self::Repo(err),
        }
    }
}

impl From<PropertyError> for WorkspaceError {
    fn from(value: PropertyError) -> Self {
        Self::InvalidProperty(value)
    }
}

/// Outcome of one autosave flush.
#[derive(Debug, Default)]
pub struct AutosaveReport {
    pub saved: Vec<PageId>,
    pub failed: Vec<(PageId, WorkspaceError)>,
}

impl AutosaveReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Page workspace facade.
pub struct Workspace<R: PageRepository, C: Clock = SystemClock> {
    repo: R,
    clock: C,
    config: WorkspaceConfig,
    store: WorkspaceStore,
    autosave: AutosaveQueue,
}

impl<R: PageRepository> Workspace<R> {
    /// Opens a workspace on the wall clock.
    pub fn open(repo: R, config: WorkspaceConfig) -> Result<Self, WorkspaceError> {
        Self::with_clock(repo, config, SystemClock)
    }
}

impl<R: PageRepository, C: Clock> Workspace<R, C> {
    /// Opens a workspace and loads its snapshot from the repository.
    pub fn with_clock(repo: R, config: WorkspaceConfig, clock: C) -> Result<Self, WorkspaceError> {
        let store = WorkspaceStore::load(&repo)?;
        info!(
            "event=workspace_open module=workspace status=ok pages={} trashed={}",
            store.live_len(),
            store.trash_len()
        );
        let autosave = AutosaveQueue::new(config.autosave_debounce_ms);
        Ok(Self {
            repo,
            clock,
            config,
            store,
            autosave,
        })
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn store(&self) -> &WorkspaceStore {
        &self.store
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn autosave(&self) -> &AutosaveQueue {
        &self.autosave
    }

    pub fn get_page(&self, id: &str) -> Option<&Page> {
        self.store.page(id)
    }

    /// Creates a blank page, optionally under a live parent.
    pub fn create_page(
        &mut self,
        title: &str,
        parent_id: Option<&str>,
    ) -> Result<Page, WorkspaceError> {
        self.create_from_template(PageTemplate::Blank, Some(title), parent_id)
    }

    /// Creates a page with a template's initial content.
    ///
    /// `title = None` uses the template's default title.
    pub fn create_from_template(
        &mut self,
        template: PageTemplate,
        title: Option<&str>,
        parent_id: Option<&str>,
    ) -> Result<Page, WorkspaceError> {
        let title = title.unwrap_or(template.default_title());
        validate_title(title)?;
        if let Some(parent_id) = parent_id {
            self.ensure_live_parent(parent_id)?;
        }
        let mut page = Page::new(title, parent_id.map(str::to_string), self.clock.now_ms());
        page.icon = template.icon().map(str::to_string);
        page.tags = normalize_tags(template.tags().iter().copied());
        page.content = encode(&template.document());
        self.insert_new_page(page)
    }

    /// Returns the daily note for `date`, creating it on first use.
    pub fn create_daily_note(&mut self, date: NaiveDate) -> Result<Page, WorkspaceError> {
        let title = date.format(DAILY_NOTE_TITLE_FORMAT).to_string();
        if let Some(existing) = self.store.pages().find(|page| {
            page.title == title && page.is_root() && page.tags.contains(DAILY_NOTE_TAG)
        }) {
            return Ok(existing.clone());
        }
        let mut page = Page::new(title, None, self.clock.now_ms());
        page.icon = Some("📅".to_string());
        page.tags = BTreeSet::from([DAILY_NOTE_TAG.to_string()]);
        page.content = encode(&PageDocument::default());
        self.insert_new_page(page)
    }

    /// Daily note for the clock's current UTC date.
    pub fn create_todays_note(&mut self) -> Result<Page, WorkspaceError> {
        let now_ms = self.clock.now_ms();
        let date = DateTime::<Utc>::from_timestamp_millis(now_ms)
            .map(|moment| moment.date_naive())
            .unwrap_or_default();
        self.create_daily_note(date)
    }

    /// Applies a partial update after validating it against the snapshot.
    pub fn update_page(&mut self, id: &str, patch: PagePatch) -> Result<Page, WorkspaceError> {
        let current = self
            .store
            .page(id)
            .ok_or_else(|| WorkspaceError::NotFound(id.to_string()))?;

        if let Some(title) = patch.title.as_deref() {
            validate_title(title)?;
        }

        let target_parent = match patch.parent_id.as_ref() {
            Some(parent_id) => parent_id.clone(),
            None => current.parent_id.clone(),
        };
        if let Some(Some(parent_id)) = patch.parent_id.as_ref() {
            self.ensure_live_parent(parent_id)?;
            if ParentIndex::new(self.store.pages()).would_create_cycle(id, parent_id) {
                warn!(
                    "event=page_update module=workspace status=rejected reason=cycle page_id={} parent_id={}",
                    id, parent_id
                );
                return Err(WorkspaceError::CycleDetected {
                    page_id: id.to_string(),
                    parent_id: parent_id.clone(),
                });
            }
        }

        // A move changes the governing schema even when content is untouched.
        let parent_changed = patch
            .parent_id
            .as_ref()
            .is_some_and(|parent_id| *parent_id != current.parent_id);
        if patch.content.is_some() || parent_changed {
            let content = patch.content.as_ref().unwrap_or(&current.content);
            self.validate_content(content, target_parent.as_deref())?;
        }

        let updated = self.repo.update_page(id, &patch, self.clock.now_ms())?;
        self.store.insert_page(updated.clone());
        Ok(updated)
    }

    /// Records an edit for debounced saving.
    pub fn queue_edit(&mut self, id: &str, patch: PagePatch) -> Result<(), WorkspaceError> {
        if !self.store.is_live(id) {
            return Err(WorkspaceError::NotFound(id.to_string()));
        }
        self.autosave.record(id, patch, self.clock.now_ms());
        Ok(())
    }

    /// Saves every queued edit whose debounce deadline has passed.
    pub fn flush_due(&mut self) -> AutosaveReport {
        let due = self.autosave.take_due(self.clock.now_ms());
        let mut report = AutosaveReport::default();
        for save in due {
            self.run_save(save, &mut report);
        }
        report
    }

    /// Saves one page's queued edits now (navigate-away flush).
    pub fn flush_page(&mut self, id: &str) -> Result<Option<Page>, WorkspaceError> {
        let Some(save) = self.autosave.take_page(id) else {
            return Ok(None);
        };
        let page_id = save.page_id.clone();
        let result = self.update_page(&page_id, save.patch);
        self.autosave
            .complete(&page_id, save_outcome(&result), self.clock.now_ms());
        result.map(Some)
    }

    /// Moves a page and its live descendants to trash.
    pub fn delete_page(&mut self, id: &str) -> Result<Vec<DeletedPage>, WorkspaceError> {
        let now_ms = self.clock.now_ms();
        let entries = TrashLifecycle::new(&self.repo, &mut self.store).delete(id, now_ms)?;
        for entry in &entries {
            self.autosave.discard(&entry.id);
        }
        Ok(entries)
    }

    /// Live pages ordered by creation time.
    pub fn list_pages(&self) -> Vec<&Page> {
        self.store.pages_by_creation()
    }

    /// Trash entries, most recently deleted first.
    pub fn list_deleted_pages(&self) -> Vec<&DeletedPage> {
        self.store.trash_by_recency()
    }

    pub fn restore_page(&mut self, id: &str) -> Result<Page, WorkspaceError> {
        Ok(TrashLifecycle::new(&self.repo, &mut self.store).restore(id)?)
    }

    pub fn restore_page_with_children(&mut self, id: &str) -> Result<Vec<Page>, WorkspaceError> {
        Ok(TrashLifecycle::new(&self.repo, &mut self.store).restore_with_children(id)?)
    }

    pub fn permanently_delete_page(&mut self, id: &str) -> Result<(), WorkspaceError> {
        Ok(TrashLifecycle::new(&self.repo, &mut self.store).purge(id)?)
    }

    pub fn empty_trash(&mut self) -> Result<usize, WorkspaceError> {
        Ok(TrashLifecycle::new(&self.repo, &mut self.store).empty_trash()?)
    }

    /// Purges trash entries past their retention window.
    pub fn purge_expired(&mut self) -> Result<Vec<PageId>, WorkspaceError> {
        let now_ms = self.clock.now_ms();
        Ok(TrashLifecycle::new(&self.repo, &mut self.store).sweep_expired(now_ms)?)
    }

    /// Forest of live pages.
    pub fn tree(&self) -> Vec<TreeNode> {
        build_tree(self.store.pages())
    }

    /// Direct live children in sibling order.
    pub fn children(&self, id: &str) -> Vec<&Page> {
        let mut children: Vec<&Page> = self
            .store
            .pages()
            .filter(|page| page.parent_id.as_deref() == Some(id) && page.id != id)
            .collect();
        children.sort_by(|a, b| compare_pages(a, b));
        children
    }

    /// Ancestors of a live page followed by the page itself.
    pub fn breadcrumbs(&self, id: &str) -> Result<Vec<&Page>, WorkspaceError> {
        let page = self
            .store
            .page(id)
            .ok_or_else(|| WorkspaceError::NotFound(id.to_string()))?;
        let mut chain = ParentIndex::new(self.store.pages()).ancestors(id);
        chain.push(page);
        Ok(chain)
    }

    /// Decoded content of a live page.
    pub fn document(&self, id: &str) -> Option<PageDocument> {
        self.store.page(id).map(|page| decode(&page.content))
    }

    /// Projects a database page over its live children.
    ///
    /// Returns `None` for unknown or free-form pages.
    pub fn project<'a>(&self, database_id: &str, rows: &'a [Page]) -> Option<ProjectedView<'a>> {
        let database = self.store.page(database_id)?;
        project_database(database, rows, &self.config.projection_options())
    }

    /// Live children of a database page as owned rows, in sibling order.
    pub fn database_rows(&self, database_id: &str) -> Vec<Page> {
        self.children(database_id).into_iter().cloned().collect()
    }

    /// Full backlink index over live pages.
    pub fn backlinks(&self) -> BacklinkIndex {
        index_backlinks(self.store.pages())
    }

    /// Links pointing at one page.
    pub fn backlinks_to(&self, id: &str) -> Vec<Backlink> {
        self.backlinks().backlinks_to(id).to_vec()
    }

    /// Distinct tags across live pages, sorted.
    pub fn list_tags(&self) -> Vec<String> {
        let tags: BTreeSet<&String> = self.store.pages().flat_map(|page| &page.tags).collect();
        tags.into_iter().cloned().collect()
    }

    /// Favorite live pages in sibling order.
    pub fn favorites(&self) -> Vec<&Page> {
        let mut pages: Vec<&Page> = self.store.pages().filter(|page| page.is_favorite).collect();
        pages.sort_by(|a, b| compare_pages(a, b));
        pages
    }

    fn insert_new_page(&mut self, page: Page) -> Result<Page, WorkspaceError> {
        self.repo.create_page(&page)?;
        info!(
            "event=page_create module=workspace status=ok page_id={} has_parent={}",
            page.id,
            page.parent_id.is_some()
        );
        self.store.insert_page(page.clone());
        Ok(page)
    }

    fn ensure_live_parent(&self, parent_id: &str) -> Result<(), WorkspaceError> {
        if self.store.is_live(parent_id) {
            Ok(())
        } else {
            Err(WorkspaceError::ParentNotFound(parent_id.to_string()))
        }
    }

    fn validate_content(
        &self,
        content: &serde_json::Value,
        parent_id: Option<&str>,
    ) -> Result<(), WorkspaceError> {
        let doc = decode(content);
        validate_schema(&doc.schema)?;
        let parent_schema: Vec<PropertyConfig>;
        let governing: &[PropertyConfig] = if !doc.schema.is_empty() {
            &doc.schema
        } else {
            parent_schema = parent_id
                .and_then(|parent_id| self.store.page(parent_id))
                .map(|parent| decode(&parent.content).schema)
                .unwrap_or_default();
            &parent_schema
        };
        validate_properties(governing, &doc.properties)?;
        Ok(())
    }

    fn run_save(&mut self, save: DueSave, report: &mut AutosaveReport) {
        let DueSave { page_id, patch, .. } = save;
        if !self.store.is_live(&page_id) {
            self.autosave
                .complete(&page_id, SaveOutcome::Rejected, self.clock.now_ms());
            return;
        }
        let result = self.update_page(&page_id, patch);
        self.autosave
            .complete(&page_id, save_outcome(&result), self.clock.now_ms());
        match result {
            Ok(_) => report.saved.push(page_id),
            Err(err) => {
                warn!(
                    "event=autosave_flush module=workspace status=error page_id={} error={}",
                    page_id, err
                );
                report.failed.push((page_id, err));
            }
        }
    }
}

// Only storage failures are worth retrying; a rejected patch would fail again.
fn save_outcome<T>(result: &Result<T, WorkspaceError>) -> SaveOutcome {
    match result {
        Ok(_) => SaveOutcome::Saved,
        Err(WorkspaceError::Repo(_)) => SaveOutcome::Failed,
        Err(_) => SaveOutcome::Rejected,
    }
}

fn validate_title(title: &str) -> Result<(), WorkspaceError> {
    if title.contains(['\n', '\r']) {
        return Err(WorkspaceError::InvalidTitle(
            "title must be a single line".to_string(),
        ));
    }
    if title.trim().chars().count() > MAX_TITLE_CHARS {
        return Err(WorkspaceError::InvalidTitle(format!(
            "title exceeds {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(())
}
