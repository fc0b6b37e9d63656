//! Page forest construction.
//!
//! # Responsibility
//! - Turn a flat page set into a rooted forest keyed by `parent_id`.
//! - Order siblings deterministically on every build.
//!
//! # Invariants
//! - Every input page appears exactly once in the forest.
//! - A page whose parent is missing from the input (or is itself) is a root.
//! - Pages caught in a parent cycle are promoted to roots; construction
//!   never follows parent links recursively.
//! - Siblings are ordered by `compare_titles`, then id.

use crate::model::page::Page;
use log::{debug, warn};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// One page with its ordered children.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub page: Page,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Number of nodes below this one.
    pub fn descendant_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_, depth| {
            if depth > 0 {
                count += 1;
            }
        });
        count
    }

    /// Depth-first pre-order visit of this subtree.
    ///
    /// Ids already visited are skipped, so a forest assembled from
    /// inconsistent data still terminates.
    pub fn walk<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(&'a TreeNode, usize),
    {
        let mut visited = HashSet::new();
        walk_node(self, 0, &mut visited, visit);
    }
}

fn walk_node<'a, F>(
    node: &'a TreeNode,
    depth: usize,
    visited: &mut HashSet<&'a str>,
    visit: &mut F,
) where
    F: FnMut(&'a TreeNode, usize),
{
    if !visited.insert(node.page.id.as_str()) {
        return;
    }
    visit(node, depth);
    for child in &node.children {
        walk_node(child, depth + 1, visited, visit);
    }
}

/// Builds the page forest.
///
/// Pass one indexes pages by id (first occurrence wins); pass two attaches
/// each page under its parent when that parent is present. Assembly then
/// follows the precomputed child lists with a visited set.
pub fn build_tree<'a, I>(pages: I) -> Vec<TreeNode>
where
    I: IntoIterator<Item = &'a Page>,
{
    let pages: Vec<&Page> = pages.into_iter().collect();

    let mut index_by_id: HashMap<&str, usize> = HashMap::with_capacity(pages.len());
    for (index, page) in pages.iter().enumerate() {
        index_by_id.entry(page.id.as_str()).or_insert(index);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); pages.len()];
    let mut roots = Vec::new();
    for (index, page) in pages.iter().enumerate() {
        let parent_index = page
            .parent_id
            .as_deref()
            .filter(|parent_id| *parent_id != page.id)
            .and_then(|parent_id| index_by_id.get(parent_id).copied());
        match parent_index {
            Some(parent_index) => children[parent_index].push(index),
            None => {
                if page.parent_id.is_some() {
                    debug!(
                        "event=tree_build module=tree status=degraded reason=dangling_parent page_id={}",
                        page.id
                    );
                }
                roots.push(index);
            }
        }
    }

    let order = |a: &usize, b: &usize| compare_pages(pages[*a], pages[*b]);
    roots.sort_by(order);
    for list in &mut children {
        list.sort_by(order);
    }

    let mut visited = vec![false; pages.len()];
    let mut forest: Vec<TreeNode> = roots
        .iter()
        .map(|&root| assemble(root, &pages, &children, &mut visited))
        .collect();

    if visited.iter().any(|seen| !seen) {
        let mut leftovers: Vec<usize> = (0..pages.len()).filter(|&i| !visited[i]).collect();
        leftovers.sort_by(order);
        for index in leftovers {
            if visited[index] {
                continue;
            }
            warn!(
                "event=tree_build module=tree status=degraded reason=parent_cycle page_id={}",
                pages[index].id
            );
            forest.push(assemble(index, &pages, &children, &mut visited));
        }
        forest.sort_by(|a, b| compare_pages(&a.page, &b.page));
    }

    forest
}

fn assemble(
    index: usize,
    pages: &[&Page],
    children: &[Vec<usize>],
    visited: &mut [bool],
) -> TreeNode {
    visited[index] = true;
    let mut nodes = Vec::with_capacity(children[index].len());
    for &child in &children[index] {
        if !visited[child] {
            nodes.push(assemble(child, pages, children, visited));
        }
    }
    TreeNode {
        page: pages[index].clone(),
        children: nodes,
    }
}

/// Sibling order: title (locale-style), then id.
pub fn compare_pages(a: &Page, b: &Page) -> Ordering {
    compare_titles(&a.title, &b.title).then_with(|| a.id.cmp(&b.id))
}

/// Locale-style title comparison.
///
/// Primary key ignores case and diacritics, so `Émile` sorts with `emile`.
/// Ties break on accents (unaccented first), then case (lowercase first).
pub fn compare_titles(a: &str, b: &str) -> Ordering {
    folded(a)
        .cmp(folded(b))
        .then_with(|| lowered(a).cmp(lowered(b)))
        .then_with(|| b.cmp(a))
}

fn folded(title: &str) -> impl Iterator<Item = char> + '_ {
    title
        .nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
}

fn lowered(title: &str) -> impl Iterator<Item = char> + '_ {
    title.nfd().flat_map(char::to_lowercase)
}

/// Finds the chain of pages from a root down to `page_id`, inclusive.
pub fn find_path<'a>(forest: &'a [TreeNode], page_id: &str) -> Option<Vec<&'a Page>> {
    let mut visited = HashSet::new();
    let mut path = Vec::new();
    for root in forest {
        if search_path(root, page_id, &mut visited, &mut path) {
            return Some(path);
        }
    }
    None
}

fn search_path<'a>(
    node: &'a TreeNode,
    page_id: &str,
    visited: &mut HashSet<&'a str>,
    path: &mut Vec<&'a Page>,
) -> bool {
    if !visited.insert(node.page.id.as_str()) {
        return false;
    }
    path.push(&node.page);
    if node.page.id == page_id {
        return true;
    }
    for child in &node.children {
        if search_path(child, page_id, visited, path) {
            return true;
        }
    }
    path.pop();
    false
}

/// Flattens the forest into `(depth, page)` rows in display order.
pub fn flatten(forest: &[TreeNode]) -> Vec<(usize, &Page)> {
    let mut rows = Vec::new();
    for root in forest {
        root.walk(&mut |node, depth| rows.push((depth, &node.page)));
    }
    rows
}
