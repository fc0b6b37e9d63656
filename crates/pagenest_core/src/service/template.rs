//! Page templates.
//!
//! Templates only produce initial content; the created page is an ordinary
//! page afterwards.

use crate::content::codec::{PageDocument, ViewType};
use crate::model::block::Block;
use crate::model::property::{PropertyConfig, PropertyType};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Status choices of the database template.
pub const DATABASE_STATUS_OPTIONS: [&str; 3] = ["todo", "doing", "done"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageTemplate {
    Blank,
    /// Table database with `title` and `status` columns.
    Database,
    MeetingNotes,
}

impl PageTemplate {
    pub fn default_title(self) -> &'static str {
        match self {
            Self::Blank => "Untitled",
            Self::Database => "Untitled database",
            Self::MeetingNotes => "Meeting notes",
        }
    }

    pub fn icon(self) -> Option<&'static str> {
        match self {
            Self::Blank => None,
            Self::Database => Some("🗂️"),
            Self::MeetingNotes => Some("📝"),
        }
    }

    pub fn tags(self) -> &'static [&'static str] {
        match self {
            Self::MeetingNotes => &["meeting"],
            Self::Blank | Self::Database => &[],
        }
    }

    /// Initial document for a page created from this template.
    pub fn document(self) -> PageDocument {
        match self {
            Self::Blank => PageDocument::default(),
            Self::Database => PageDocument {
                blocks: Vec::new(),
                schema: vec![
                    PropertyConfig::new("title", PropertyType::Text),
                    PropertyConfig::new("status", PropertyType::Select)
                        .with_options(DATABASE_STATUS_OPTIONS),
                ],
                view_type: Some(ViewType::Table),
                ..PageDocument::default()
            },
            Self::MeetingNotes => PageDocument::from_blocks(vec![
                heading("agenda", "Agenda"),
                Block::new("agenda-item", "bulletListItem", json!([])),
                heading("notes", "Notes"),
                Block::empty_paragraph("notes-body"),
                heading("actions", "Action items"),
                Block::new("action-item", "checkListItem", json!([])),
            ]),
        }
    }
}

fn heading(id: &str, text: &str) -> Block {
    let mut block = Block::paragraph(id, text);
    block.kind = "heading".to_string();
    block
}
