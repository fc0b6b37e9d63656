//! Debounced per-page save queue.
//!
//! # Responsibility
//! - Coalesce rapid edits of one page into a single pending patch.
//! - Hand out saves once their debounce deadline passes, or on explicit
//!   flush when the user navigates away.
//!
//! # Invariants
//! - At most one pending slot and one in-flight save exist per page.
//! - Each recorded edit restarts that page's deadline.
//! - An in-flight save is never cancelled; edits made meanwhile open a new
//!   pending slot.
//! - A save that failed to reach storage is merged back beneath newer
//!   pending edits. A rejected save is dropped so later edits still land.

use crate::model::page::{PageId, PagePatch};
use log::{debug, warn};
use std::collections::HashMap;

/// Default quiet period before a pending edit is saved.
pub const DEFAULT_AUTOSAVE_DEBOUNCE_MS: i64 = 1_000;

#[derive(Debug, Clone, PartialEq)]
struct PendingSave {
    patch: PagePatch,
    due_at: i64,
    edits: u32,
}

/// One save handed to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct DueSave {
    pub page_id: PageId,
    pub patch: PagePatch,
    /// Number of edits coalesced into this save.
    pub edits: u32,
}

/// How an in-flight save ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The patch was written.
    Saved,
    /// Storage failed; the patch is retried after one debounce period.
    Failed,
    /// The patch itself was invalid and is discarded.
    Rejected,
}

/// Coalescing save queue keyed by page id.
#[derive(Debug, Clone)]
pub struct AutosaveQueue {
    debounce_ms: i64,
    pending: HashMap<PageId, PendingSave>,
    in_flight: HashMap<PageId, PagePatch>,
}

impl Default for AutosaveQueue {
    fn default() -> Self {
        Self::new(DEFAULT_AUTOSAVE_DEBOUNCE_MS)
    }
}

impl AutosaveQueue {
    pub fn new(debounce_ms: i64) -> Self {
        Self {
            debounce_ms: debounce_ms.max(0),
            pending: HashMap::new(),
            in_flight: HashMap::new(),
        }
    }

    pub fn debounce_ms(&self) -> i64 {
        self.debounce_ms
    }

    /// Records an edit made at `now_ms` and restarts the page's deadline.
    pub fn record(&mut self, page_id: &str, patch: PagePatch, now_ms: i64) {
        if patch.is_empty() {
            return;
        }
        let due_at = now_ms + self.debounce_ms;
        match self.pending.get_mut(page_id) {
            Some(slot) => {
                slot.patch.merge(patch);
                slot.due_at = due_at;
                slot.edits += 1;
            }
            None => {
                self.pending.insert(
                    page_id.to_string(),
                    PendingSave {
                        patch,
                        due_at,
                        edits: 1,
                    },
                );
            }
        }
        debug!(
            "event=autosave_record module=autosave status=ok page_id={} due_at={}",
            page_id, due_at
        );
    }

    /// Takes every pending save whose deadline has passed at `now_ms`.
    ///
    /// Pages with a save still in flight are held back until it completes.
    /// Returned saves are ordered by deadline, then page id.
    pub fn take_due(&mut self, now_ms: i64) -> Vec<DueSave> {
        let mut ready: Vec<(i64, PageId)> = self
            .pending
            .iter()
            .filter(|(page_id, slot)| {
                slot.due_at <= now_ms && !self.in_flight.contains_key(page_id.as_str())
            })
            .map(|(page_id, slot)| (slot.due_at, page_id.clone()))
            .collect();
        ready.sort();
        ready
            .into_iter()
            .filter_map(|(_, page_id)| self.start(&page_id))
            .collect()
    }

    /// Takes the pending save of one page regardless of its deadline.
    ///
    /// Returns `None` when nothing is pending or a save is already in flight.
    pub fn take_page(&mut self, page_id: &str) -> Option<DueSave> {
        if self.in_flight.contains_key(page_id) {
            return None;
        }
        self.start(page_id)
    }

    /// Reports the outcome of an in-flight save.
    ///
    /// A `Failed` patch is merged back beneath newer pending edits and
    /// becomes due again at `now_ms + debounce`.
    pub fn complete(&mut self, page_id: &str, outcome: SaveOutcome, now_ms: i64) {
        let Some(patch) = self.in_flight.remove(page_id) else {
            return;
        };
        match outcome {
            SaveOutcome::Saved => return,
            SaveOutcome::Rejected => {
                warn!(
                    "event=autosave_reject module=autosave status=dropped page_id={} pending_newer={}",
                    page_id,
                    self.pending.contains_key(page_id)
                );
                return;
            }
            SaveOutcome::Failed => {}
        }
        let retry_at = now_ms + self.debounce_ms;
        let mut restored = patch;
        match self.pending.remove(page_id) {
            Some(newer) => {
                restored.merge(newer.patch);
                self.pending.insert(
                    page_id.to_string(),
                    PendingSave {
                        patch: restored,
                        due_at: newer.due_at.max(retry_at),
                        edits: newer.edits + 1,
                    },
                );
            }
            None => {
                self.pending.insert(
                    page_id.to_string(),
                    PendingSave {
                        patch: restored,
                        due_at: retry_at,
                        edits: 1,
                    },
                );
            }
        }
        warn!(
            "event=autosave_retry module=autosave status=degraded page_id={} retry_at={}",
            page_id, retry_at
        );
    }

    /// Drops pending work for a page that no longer exists.
    pub fn discard(&mut self, page_id: &str) {
        self.pending.remove(page_id);
    }

    /// Earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<i64> {
        self.pending.values().map(|slot| slot.due_at).min()
    }

    pub fn is_pending(&self, page_id: &str) -> bool {
        self.pending.contains_key(page_id)
    }

    pub fn is_in_flight(&self, page_id: &str) -> bool {
        self.in_flight.contains_key(page_id)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Returns whether nothing is pending or in flight.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }

    fn start(&mut self, page_id: &str) -> Option<DueSave> {
        let slot = self.pending.remove(page_id)?;
        self.in_flight
            .insert(page_id.to_string(), slot.patch.clone());
        Some(DueSave {
            page_id: page_id.to_string(),
            patch: slot.patch,
            edits: slot.edits,
        })
    }
}
