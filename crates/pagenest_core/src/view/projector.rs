//! Database view projections.
//!
//! # Responsibility
//! - Project one row set (child pages) into table, board or gallery shapes.
//!
//! # Invariants
//! - Projections borrow rows and never mutate them.
//! - Table columns follow schema order; missing cells are `null`.
//! - Board columns follow first-seen order with the "none" column last.

use crate::content::codec::{decode, PageDocument, PageKind, ViewType};
use crate::model::page::Page;
use crate::model::property::{PropertyConfig, PropertyValues};
use serde_json::Value;

/// Property used for board grouping when none is configured.
pub const DEFAULT_GROUP_BY: &str = "status";
/// Default preview length for gallery cards, in characters.
pub const DEFAULT_PREVIEW_CHARS: usize = 120;

const PREVIEW_ELLIPSIS: &str = "...";

/// Projection tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionOptions {
    pub group_by: String,
    pub preview_chars: usize,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            group_by: DEFAULT_GROUP_BY.to_string(),
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

/// Result of projecting rows into one view type.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectedView<'a> {
    Table(TableView<'a>),
    Board(BoardView<'a>),
    Gallery(GalleryView<'a>),
}

impl ProjectedView<'_> {
    pub fn view_type(&self) -> ViewType {
        match self {
            Self::Table(_) => ViewType::Table,
            Self::Board(_) => ViewType::Board,
            Self::Gallery(_) => ViewType::List,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableView<'a> {
    pub columns: Vec<PropertyConfig>,
    pub rows: Vec<TableRow<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow<'a> {
    pub page: &'a Page,
    /// One cell per column, in column order.
    pub cells: Vec<Value>,
}

/// Board column identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    Value(String),
    /// Rows whose grouping property is missing or empty.
    None,
}

impl ColumnKey {
    pub fn label(&self) -> &str {
        match self {
            Self::Value(value) => value.as_str(),
            Self::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardView<'a> {
    pub group_by: String,
    pub columns: Vec<BoardColumn<'a>>,
}

impl BoardView<'_> {
    pub fn column(&self, key: &ColumnKey) -> Option<&BoardColumn<'_>> {
        self.columns.iter().find(|column| &column.key == key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardColumn<'a> {
    pub key: ColumnKey,
    pub rows: Vec<&'a Page>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GalleryView<'a> {
    pub cards: Vec<GalleryCard<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GalleryCard<'a> {
    pub page: &'a Page,
    pub preview: Option<String>,
    pub cover_url: Option<&'a str>,
}

/// Projects rows into the requested view.
pub fn project<'a>(
    rows: &'a [Page],
    schema: &[PropertyConfig],
    view_type: ViewType,
    opts: &ProjectionOptions,
) -> ProjectedView<'a> {
    match view_type {
        ViewType::Table => ProjectedView::Table(project_table(rows, schema)),
        ViewType::Board => ProjectedView::Board(project_board(rows, &opts.group_by)),
        ViewType::List => ProjectedView::Gallery(project_gallery(rows, opts.preview_chars)),
    }
}

/// Projects a database page's rows using the page's own schema and view.
///
/// Returns `None` for free-form pages.
pub fn project_database<'a>(
    database: &Page,
    rows: &'a [Page],
    opts: &ProjectionOptions,
) -> Option<ProjectedView<'a>> {
    let doc = decode(&database.content);
    match doc.kind() {
        PageKind::FreeForm => None,
        PageKind::Database(view_type) => Some(project(rows, &doc.schema, view_type, opts)),
    }
}

pub fn project_table<'a>(rows: &'a [Page], schema: &[PropertyConfig]) -> TableView<'a> {
    let rows = rows
        .iter()
        .map(|page| {
            let properties = row_properties(page);
            let cells = schema
                .iter()
                .map(|column| properties.get(&column.key).cloned().unwrap_or(Value::Null))
                .collect();
            TableRow { page, cells }
        })
        .collect();
    TableView {
        columns: schema.to_vec(),
        rows,
    }
}

pub fn project_board<'a>(rows: &'a [Page], group_by: &str) -> BoardView<'a> {
    let mut columns: Vec<BoardColumn<'a>> = Vec::new();
    let mut ungrouped = Vec::new();
    for page in rows {
        let properties = row_properties(page);
        match properties.get(group_by).and_then(group_label) {
            Some(label) => {
                let key = ColumnKey::Value(label);
                match columns.iter_mut().find(|column| column.key == key) {
                    Some(column) => column.rows.push(page),
                    None => columns.push(BoardColumn {
                        key,
                        rows: vec![page],
                    }),
                }
            }
            None => ungrouped.push(page),
        }
    }
    if !ungrouped.is_empty() {
        columns.push(BoardColumn {
            key: ColumnKey::None,
            rows: ungrouped,
        });
    }
    BoardView {
        group_by: group_by.to_string(),
        columns,
    }
}

pub fn project_gallery(rows: &[Page], preview_chars: usize) -> GalleryView<'_> {
    let cards = rows
        .iter()
        .map(|page| GalleryCard {
            page,
            preview: preview_text(&decode(&page.content), preview_chars),
            cover_url: page.cover_url.as_deref(),
        })
        .collect();
    GalleryView { cards }
}

/// Leading characters of the first text-bearing block, whitespace collapsed.
pub fn preview_text(doc: &PageDocument, max_chars: usize) -> Option<String> {
    let text = doc.first_text_block()?.plain_text();
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return Some(collapsed);
    }
    let mut truncated: String = collapsed.chars().take(max_chars).collect();
    truncated.truncate(truncated.trim_end().len());
    truncated.push_str(PREVIEW_ELLIPSIS);
    Some(truncated)
}

fn row_properties(page: &Page) -> PropertyValues {
    decode(&page.content).properties
}

fn group_label(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        project, project_database, preview_text, ColumnKey, ProjectedView, ProjectionOptions,
    };
    use crate::content::codec::{PageDocument, ViewType};
    use crate::model::block::Block;
    use crate::model::page::Page;
    use crate::model::property::{PropertyConfig, PropertyType};
    use serde_json::{json, Value};

    fn row(id: &str, content: Value) -> Page {
        let mut page = Page::with_id(id, id, Some("db".to_string()), 0);
        page.content = content;
        page
    }

    #[test]
    fn board_groups_in_first_seen_order_with_none_last() {
        let rows = vec![
            row("r1", json!({"blocks": [], "properties": {"status": "a"}})),
            row("r2", json!({"blocks": [], "properties": {"status": "b"}})),
            row("r3", json!({"blocks": [], "properties": {"status": "a"}})),
            row("r4", json!({"blocks": []})),
        ];
        let ProjectedView::Board(board) =
            project(&rows, &[], ViewType::Board, &ProjectionOptions::default())
        else {
            panic!("board view expected");
        };
        let labels: Vec<&str> = board.columns.iter().map(|column| column.key.label()).collect();
        let counts: Vec<usize> = board.columns.iter().map(|column| column.rows.len()).collect();
        assert_eq!(labels, vec!["a", "b", "none"]);
        assert_eq!(counts, vec![2, 1, 1]);
        assert_eq!(
            board.column(&ColumnKey::None).expect("none column").rows[0].id,
            "r4"
        );
    }

    #[test]
    fn board_honors_custom_grouping_and_omits_empty_none_column() {
        let rows = vec![
            row("r1", json!({"blocks": [], "properties": {"priority": 1}})),
            row("r2", json!({"blocks": [], "properties": {"priority": 2}})),
        ];
        let opts = ProjectionOptions {
            group_by: "priority".to_string(),
            ..ProjectionOptions::default()
        };
        let ProjectedView::Board(board) = project(&rows, &[], ViewType::Board, &opts) else {
            panic!("board view expected");
        };
        assert_eq!(board.columns.len(), 2);
        assert_eq!(board.columns[0].key, ColumnKey::Value("1".to_string()));
    }

    #[test]
    fn table_cells_follow_schema_order_and_fill_missing_with_null() {
        let schema = vec![
            PropertyConfig::new("estimate", PropertyType::Number),
            PropertyConfig::new("status", PropertyType::Select),
        ];
        let rows = vec![row(
            "r1",
            json!({"blocks": [], "properties": {"status": "done", "stray": true}}),
        )];
        let ProjectedView::Table(table) =
            project(&rows, &schema, ViewType::Table, &ProjectionOptions::default())
        else {
            panic!("table view expected");
        };
        assert_eq!(table.columns, schema);
        assert_eq!(table.rows[0].cells, vec![Value::Null, json!("done")]);
        assert!(std::ptr::eq(table.rows[0].page, &rows[0]));
    }

    #[test]
    fn gallery_previews_first_text_block_without_mutating_rows() {
        let rows = vec![row(
            "r1",
            json!([
                {"id": "1", "type": "image", "content": null},
                {"id": "2", "type": "paragraph", "content": "A   fairly long\nintroduction text"}
            ]),
        )];
        let before = rows.clone();
        let opts = ProjectionOptions {
            preview_chars: 14,
            ..ProjectionOptions::default()
        };
        let ProjectedView::Gallery(gallery) = project(&rows, &[], ViewType::List, &opts) else {
            panic!("gallery view expected");
        };
        assert_eq!(gallery.cards[0].preview.as_deref(), Some("A fairly long..."));
        assert_eq!(rows, before);
    }

    #[test]
    fn preview_is_none_without_text_blocks() {
        let doc = PageDocument::from_blocks(vec![Block::empty_paragraph("b")]);
        assert_eq!(preview_text(&doc, 10), None);
    }

    #[test]
    fn free_form_pages_have_no_database_projection() {
        let page = row("plain", json!([{"id": "1", "type": "paragraph", "content": "x"}]));
        assert!(project_database(&page, &[], &ProjectionOptions::default()).is_none());

        let database = row("db", json!({"blocks": [], "viewType": "table"}));
        let view = project_database(&database, &[], &ProjectionOptions::default())
            .expect("database projection");
        assert_eq!(view.view_type(), ViewType::Table);
    }
}
