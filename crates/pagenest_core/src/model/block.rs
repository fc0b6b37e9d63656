//! Block domain model.
//!
//! # Responsibility
//! - Represent one ordered content unit inside a page.
//! - Extract plain text from type-dependent block payloads.
//!
//! # Invariants
//! - `id` is unique within the owning page, not globally.
//! - Unknown editor fields survive a decode/encode cycle through `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Block type written for new and placeholder blocks.
pub const PARAGRAPH_BLOCK_TYPE: &str = "paragraph";

/// One content unit of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    /// Open enumeration owned by the editor (`paragraph`, `heading`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: Value,
    /// Editor-owned fields (props, children, ...) carried verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Block {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, content: Value) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            content,
            extra: Map::new(),
        }
    }

    /// Creates a paragraph block holding plain text.
    pub fn paragraph(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, PARAGRAPH_BLOCK_TYPE, Value::String(text.into()))
    }

    /// Creates a paragraph block without content.
    pub fn empty_paragraph(id: impl Into<String>) -> Self {
        Self::new(id, PARAGRAPH_BLOCK_TYPE, Value::Array(Vec::new()))
    }

    /// Returns the human-readable text carried by this block.
    ///
    /// Strings are taken as-is; inline arrays contribute their `text` runs
    /// and nested `content`; objects contribute `text` then `content`.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.content, &mut out);
        out
    }

    /// Returns whether this block carries any non-whitespace text.
    pub fn has_text(&self) -> bool {
        !self.plain_text().trim().is_empty()
    }
}

fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(text) => out.push_str(text),
        Value::Array(items) => {
            for item in items {
                collect_text(item, out);
            }
        }
        Value::Object(fields) => {
            if let Some(Value::String(text)) = fields.get("text") {
                out.push_str(text);
            }
            if let Some(nested) = fields.get("content") {
                collect_text(nested, out);
            }
        }
        _ => {}
    }
}
