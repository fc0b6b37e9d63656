//! Parent-link queries over a flat page set.
//!
//! Used by trash (subtree collection, original paths) and by the write path
//! (cycle checks). Every walk carries a visited set.

use crate::model::page::Page;
use crate::tree::builder::compare_pages;
use std::collections::{HashMap, HashSet, VecDeque};

/// Separator used when rendering an ancestor chain.
pub const PATH_SEPARATOR: &str = " / ";

/// Lookup tables over one page snapshot.
pub struct ParentIndex<'a> {
    by_id: HashMap<&'a str, &'a Page>,
    children: HashMap<&'a str, Vec<&'a Page>>,
}

impl<'a> ParentIndex<'a> {
    pub fn new<I>(pages: I) -> Self
    where
        I: IntoIterator<Item = &'a Page>,
    {
        let mut by_id = HashMap::new();
        let mut children: HashMap<&'a str, Vec<&'a Page>> = HashMap::new();
        for page in pages {
            by_id.entry(page.id.as_str()).or_insert(page);
            if let Some(parent_id) = page.parent_id.as_deref() {
                if parent_id != page.id {
                    children.entry(parent_id).or_default().push(page);
                }
            }
        }
        for list in children.values_mut() {
            list.sort_by(|a, b| compare_pages(a, b));
        }
        Self { by_id, children }
    }

    pub fn get(&self, page_id: &str) -> Option<&'a Page> {
        self.by_id.get(page_id).copied()
    }

    pub fn contains(&self, page_id: &str) -> bool {
        self.by_id.contains_key(page_id)
    }

    /// Direct children in sibling order.
    pub fn children_of(&self, page_id: &str) -> &[&'a Page] {
        self.children
            .get(page_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The page and all of its descendants, breadth-first, root first.
    ///
    /// Returns an empty list when `root_id` is not in the index.
    pub fn subtree(&self, root_id: &str) -> Vec<&'a Page> {
        let Some(root) = self.get(root_id) else {
            return Vec::new();
        };
        let mut visited = HashSet::from([root.id.as_str()]);
        let mut queue = VecDeque::from([root]);
        let mut out = Vec::new();
        while let Some(page) = queue.pop_front() {
            out.push(page);
            for &child in self.children_of(&page.id) {
                if visited.insert(child.id.as_str()) {
                    queue.push_back(child);
                }
            }
        }
        out
    }

    /// Ancestors of `page_id`, outermost first, excluding the page itself.
    ///
    /// Stops at the first missing parent or repeated id.
    pub fn ancestors(&self, page_id: &str) -> Vec<&'a Page> {
        let mut chain = Vec::new();
        let mut visited = HashSet::from([page_id]);
        let mut cursor = self.get(page_id).and_then(|page| page.parent_id.as_deref());
        while let Some(parent_id) = cursor {
            if !visited.insert(parent_id) {
                break;
            }
            let Some(parent) = self.get(parent_id) else {
                break;
            };
            chain.push(parent);
            cursor = parent.parent_id.as_deref();
        }
        chain.reverse();
        chain
    }

    /// Human-readable ancestor chain, `None` for roots.
    pub fn ancestor_path(&self, page_id: &str) -> Option<String> {
        render_path(self.ancestors(page_id).iter().map(|page| page.title.as_str()))
    }

    /// Returns whether re-parenting `page_id` under `candidate_parent_id`
    /// would make the page its own ancestor.
    pub fn would_create_cycle(&self, page_id: &str, candidate_parent_id: &str) -> bool {
        if page_id == candidate_parent_id {
            return true;
        }
        let mut visited = HashSet::new();
        let mut cursor = Some(candidate_parent_id);
        while let Some(current) = cursor {
            if current == page_id || !visited.insert(current) {
                return true;
            }
            cursor = self.get(current).and_then(|page| page.parent_id.as_deref());
        }
        false
    }
}

/// Joins titles into a display path, `None` when there are none.
pub fn render_path<'t>(titles: impl IntoIterator<Item = &'t str>) -> Option<String> {
    let parts: Vec<&str> = titles.into_iter().collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(PATH_SEPARATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::ParentIndex;
    use crate::model::page::Page;

    fn page(id: &str, title: &str, parent: Option<&str>) -> Page {
        Page::with_id(id, title, parent.map(str::to_string), 0)
    }

    fn fixture() -> Vec<Page> {
        vec![
            page("root", "Root", None),
            page("child", "Child", Some("root")),
            page("grand", "Grandchild", Some("child")),
            page("sibling", "Sibling", Some("root")),
        ]
    }

    #[test]
    fn subtree_is_breadth_first_and_scoped() {
        let pages = fixture();
        let index = ParentIndex::new(&pages);
        let ids: Vec<&str> = index
            .subtree("child")
            .into_iter()
            .map(|page| page.id.as_str())
            .collect();
        assert_eq!(ids, vec!["child", "grand"]);
        assert!(index.subtree("nope").is_empty());
    }

    #[test]
    fn ancestor_path_joins_titles_outermost_first() {
        let pages = fixture();
        let index = ParentIndex::new(&pages);
        assert_eq!(
            index.ancestor_path("grand").as_deref(),
            Some("Root / Child")
        );
        assert_eq!(index.ancestor_path("root"), None);
    }

    #[test]
    fn cycle_detection_covers_self_and_descendants() {
        let pages = fixture();
        let index = ParentIndex::new(&pages);
        assert!(index.would_create_cycle("root", "root"));
        assert!(index.would_create_cycle("root", "grand"));
        assert!(!index.would_create_cycle("grand", "sibling"));
    }

    #[test]
    fn walks_terminate_on_cyclic_input() {
        let pages = vec![page("a", "A", Some("b")), page("b", "B", Some("a"))];
        let index = ParentIndex::new(&pages);
        assert_eq!(index.ancestors("a").len(), 1);
        assert_eq!(index.subtree("a").len(), 2);
        assert!(index.would_create_cycle("c", "a"));
    }
}
