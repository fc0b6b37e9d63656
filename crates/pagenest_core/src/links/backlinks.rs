//! Backlink extraction and reverse index.
//!
//! # Responsibility
//! - Find page references inside block content.
//! - Build the reverse map target -> (source page, source block).
//!
//! # Invariants
//! - Only ids naming a page of the indexed set are recorded.
//! - Each (source, target, block) triple is recorded once.
//! - Self-references are kept.
//! - Nothing is persisted; every `index_backlinks` call is a full scan.

use crate::content::codec::decode;
use crate::model::block::Block;
use crate::model::page::{Page, PageId};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Inline node field naming a referenced page.
const PAGE_ID_FIELD: &str = "pageId";

// Ids are opaque; captures are loose and filtered against known pages.
static WIKI_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[\s*([^\]|\s]+)\s*(?:\|[^\]]*)?\]\]").expect("valid wiki link regex")
});
static PAGE_HREF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"/page/([^/\s?#"'<>)]+)"#).expect("valid page href regex")
});

/// Derived reference from one block of `source_page_id` to `target_page_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Backlink {
    pub source_page_id: PageId,
    pub target_page_id: PageId,
    pub source_block_id: String,
}

/// Reverse reference index over one page snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BacklinkIndex {
    by_target: HashMap<PageId, Vec<Backlink>>,
    by_source: HashMap<PageId, Vec<Backlink>>,
}

impl BacklinkIndex {
    /// Links pointing at `page_id`, by source page order then block order.
    pub fn backlinks_to(&self, page_id: &str) -> &[Backlink] {
        self.by_target
            .get(page_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Links found in the blocks of `page_id`.
    pub fn outgoing_from(&self, page_id: &str) -> &[Backlink] {
        self.by_source
            .get(page_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Distinct pages linking to `page_id`, in first-seen order.
    pub fn referencing_pages(&self, page_id: &str) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.backlinks_to(page_id)
            .iter()
            .map(|link| link.source_page_id.as_str())
            .filter(|source| seen.insert(*source))
            .collect()
    }

    /// Number of indexed links.
    pub fn len(&self) -> usize {
        self.by_target.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }

    /// Map view keyed by target page id.
    pub fn as_map(&self) -> &HashMap<PageId, Vec<Backlink>> {
        &self.by_target
    }
}

/// Scans every block of every page and builds the reverse index.
pub fn index_backlinks<'a, I>(pages: I) -> BacklinkIndex
where
    I: IntoIterator<Item = &'a Page>,
{
    let pages: Vec<&Page> = pages.into_iter().collect();
    let known: HashSet<&str> = pages.iter().map(|page| page.id.as_str()).collect();

    let mut index = BacklinkIndex::default();
    for page in &pages {
        let doc = decode(&page.content);
        for block in &doc.blocks {
            for target in extract_references(block) {
                if !known.contains(target.as_str()) {
                    continue;
                }
                let link = Backlink {
                    source_page_id: page.id.clone(),
                    target_page_id: target.clone(),
                    source_block_id: block.id.clone(),
                };
                index
                    .by_source
                    .entry(page.id.clone())
                    .or_default()
                    .push(link.clone());
                index.by_target.entry(target).or_default().push(link);
            }
        }
    }
    index
}

/// Page ids referenced by one block, deduplicated, in order of appearance.
pub fn extract_references(block: &Block) -> Vec<PageId> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    collect_references(&block.content, &mut seen, &mut out);
    for value in block.extra.values() {
        collect_references(value, &mut seen, &mut out);
    }
    out
}

fn collect_references(value: &Value, seen: &mut HashSet<String>, out: &mut Vec<PageId>) {
    match value {
        Value::String(text) => {
            for re in [&*WIKI_LINK_RE, &*PAGE_HREF_RE] {
                for caps in re.captures_iter(text) {
                    if let Some(id) = caps.get(1) {
                        push_unique(id.as_str(), seen, out);
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, seen, out);
            }
        }
        Value::Object(fields) => {
            if let Some(Value::String(id)) = fields.get(PAGE_ID_FIELD) {
                push_unique(id.trim(), seen, out);
            }
            for (key, nested) in fields {
                if key != PAGE_ID_FIELD {
                    collect_references(nested, seen, out);
                }
            }
        }
        _ => {}
    }
}

fn push_unique(id: &str, seen: &mut HashSet<String>, out: &mut Vec<PageId>) {
    if !id.is_empty() && seen.insert(id.to_string()) {
        out.push(id.to_string());
    }
}
