//! Page content codec.
//!
//! # Responsibility
//! - Normalize stored page content JSON into a typed `PageDocument`.
//! - Encode documents back into the canonical wire shape.
//!
//! # Invariants
//! - `decode` never fails; unrecognized input degrades to `PageDocument::default()`.
//! - `decode(&encode(&doc)) == doc` for every document `decode` can produce.
//! - Block order is preserved; block ids are unique after decoding.

use crate::model::block::{Block, PARAGRAPH_BLOCK_TYPE};
use crate::model::property::{PropertyConfig, PropertyValues};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

const BLOCKS_KEY: &str = "blocks";
const SCHEMA_KEY: &str = "schema";
const PROPERTIES_KEY: &str = "properties";
const VIEW_TYPE_KEY: &str = "viewType";

/// Structured view selected by a database page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    /// Rows and schema-ordered columns.
    Table,
    /// Kanban board grouped by one property.
    Board,
    /// Gallery cards with content previews.
    List,
}

impl ViewType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Board => "board",
            Self::List => "list",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "table" => Some(Self::Table),
            "board" => Some(Self::Board),
            "list" => Some(Self::List),
            _ => None,
        }
    }
}

/// Interpretation of a page selected by its view type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    FreeForm,
    Database(ViewType),
}

/// Typed page content.
#[derive(Debug, Clone, PartialEq)]
pub struct PageDocument {
    pub blocks: Vec<Block>,
    pub schema: Vec<PropertyConfig>,
    pub properties: PropertyValues,
    pub view_type: Option<ViewType>,
}

impl Default for PageDocument {
    /// One empty paragraph, no schema, no properties.
    fn default() -> Self {
        Self {
            blocks: default_blocks(),
            schema: Vec::new(),
            properties: PropertyValues::new(),
            view_type: None,
        }
    }
}

impl PageDocument {
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            ..Self::default()
        }
    }

    pub fn kind(&self) -> PageKind {
        match self.view_type {
            Some(view_type) => PageKind::Database(view_type),
            None => PageKind::FreeForm,
        }
    }

    /// Returns the first block that carries visible text.
    pub fn first_text_block(&self) -> Option<&Block> {
        self.blocks.iter().find(|block| block.has_text())
    }
}

/// Decodes stored content into a typed document.
///
/// Accepted shapes: a bare block array (legacy), an object with `blocks`,
/// and the full object with `schema`/`properties`/`viewType`. JSON stored as
/// a string is parsed first; other text becomes a single paragraph.
pub fn decode(raw: &Value) -> PageDocument {
    match raw {
        Value::Array(items) => PageDocument::from_blocks(decode_blocks(items)),
        Value::Object(fields) if has_canonical_key(fields) => decode_object(fields),
        Value::String(text) => decode_text(text),
        Value::Null => PageDocument::default(),
        other => {
            warn!(
                "event=content_decode module=content status=degraded reason=unrecognized_shape kind={}",
                json_kind(other)
            );
            PageDocument::default()
        }
    }
}

/// Encodes a document into the canonical content shape.
pub fn encode(doc: &PageDocument) -> Value {
    let mut out = Map::new();
    out.insert(
        BLOCKS_KEY.to_string(),
        Value::Array(doc.blocks.iter().map(encode_block).collect()),
    );
    if !doc.schema.is_empty() {
        out.insert(
            SCHEMA_KEY.to_string(),
            Value::Array(doc.schema.iter().map(encode_property_config).collect()),
        );
    }
    if !doc.properties.is_empty() {
        out.insert(
            PROPERTIES_KEY.to_string(),
            Value::Object(doc.properties.clone()),
        );
    }
    if let Some(view_type) = doc.view_type {
        out.insert(
            VIEW_TYPE_KEY.to_string(),
            Value::String(view_type.as_str().to_string()),
        );
    }
    Value::Object(out)
}

fn decode_object(fields: &Map<String, Value>) -> PageDocument {
    let blocks = match fields.get(BLOCKS_KEY) {
        Some(Value::Array(items)) => decode_blocks(items),
        Some(other) => {
            warn!(
                "event=content_decode module=content status=degraded reason=blocks_not_array kind={}",
                json_kind(other)
            );
            default_blocks()
        }
        None => default_blocks(),
    };

    let schema = match fields.get(SCHEMA_KEY) {
        Some(Value::Array(items)) => decode_schema(items),
        _ => Vec::new(),
    };

    let properties = match fields.get(PROPERTIES_KEY) {
        Some(Value::Object(values)) => values.clone(),
        Some(other) if !other.is_null() => {
            warn!(
                "event=content_decode module=content status=degraded reason=properties_not_object kind={}",
                json_kind(other)
            );
            PropertyValues::new()
        }
        _ => PropertyValues::new(),
    };

    let view_type = match fields.get(VIEW_TYPE_KEY) {
        Some(Value::String(tag)) => {
            let parsed = ViewType::parse(tag);
            if parsed.is_none() {
                debug!("event=content_decode module=content status=degraded reason=unknown_view_type");
            }
            parsed
        }
        _ => None,
    };

    PageDocument {
        blocks,
        schema,
        properties,
        view_type,
    }
}

fn decode_text(text: &str) -> PageDocument {
    let trimmed = text.trim();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        if let Ok(parsed) = serde_json::from_str::<Value>(trimmed) {
            if parsed.is_array() || parsed.is_object() {
                return decode(&parsed);
            }
        }
    }
    if trimmed.is_empty() {
        return PageDocument::default();
    }
    PageDocument::from_blocks(vec![Block::paragraph(block_id_for_index(0), text)])
}

fn decode_blocks(items: &[Value]) -> Vec<Block> {
    let mut seen = HashSet::new();
    let mut blocks = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Value::Object(fields) = item else {
            debug!(
                "event=content_decode module=content status=degraded reason=block_not_object index={index}"
            );
            continue;
        };
        let mut block = decode_block(fields, index);
        block.id = unique_block_id(&mut seen, block.id);
        blocks.push(block);
    }
    blocks
}

fn decode_block(fields: &Map<String, Value>, index: usize) -> Block {
    let mut extra = fields.clone();
    let id = match extra.remove("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => id,
        Some(Value::Number(number)) => number.to_string(),
        _ => block_id_for_index(index),
    };
    let kind = match extra.remove("type") {
        Some(Value::String(kind)) if !kind.trim().is_empty() => kind,
        _ => PARAGRAPH_BLOCK_TYPE.to_string(),
    };
    let content = extra.remove("content").unwrap_or(Value::Null);
    Block {
        id,
        kind,
        content,
        extra,
    }
}

fn decode_schema(items: &[Value]) -> Vec<PropertyConfig> {
    let mut seen = HashSet::new();
    let mut schema = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<PropertyConfig>(item.clone()) {
            Ok(config) if seen.insert(config.key.clone()) => schema.push(config),
            Ok(config) => warn!(
                "event=content_decode module=content status=degraded reason=duplicate_property key={}",
                config.key
            ),
            Err(err) => warn!(
                "event=content_decode module=content status=degraded reason=invalid_property error={err}"
            ),
        }
    }
    schema
}

fn encode_block(block: &Block) -> Value {
    let mut out = block.extra.clone();
    out.insert("id".to_string(), Value::String(block.id.clone()));
    out.insert("type".to_string(), Value::String(block.kind.clone()));
    out.insert("content".to_string(), block.content.clone());
    Value::Object(out)
}

fn encode_property_config(config: &PropertyConfig) -> Value {
    let mut out = Map::new();
    out.insert("key".to_string(), Value::String(config.key.clone()));
    if let Some(name) = config.name.as_ref() {
        out.insert("name".to_string(), Value::String(name.clone()));
    }
    out.insert(
        "type".to_string(),
        Value::String(config.kind.as_str().to_string()),
    );
    if !config.options.is_empty() {
        out.insert(
            "options".to_string(),
            Value::Array(
                config
                    .options
                    .iter()
                    .map(|option| Value::String(option.clone()))
                    .collect(),
            ),
        );
    }
    Value::Object(out)
}

fn unique_block_id(seen: &mut HashSet<String>, id: String) -> String {
    if seen.insert(id.clone()) {
        return id;
    }
    let mut suffix = 1usize;
    loop {
        let candidate = format!("{id}-{suffix}");
        if seen.insert(candidate.clone()) {
            return candidate;
        }
        suffix += 1;
    }
}

fn has_canonical_key(fields: &Map<String, Value>) -> bool {
    [BLOCKS_KEY, SCHEMA_KEY, PROPERTIES_KEY, VIEW_TYPE_KEY]
        .iter()
        .any(|key| fields.contains_key(*key))
}

fn default_blocks() -> Vec<Block> {
    vec![Block::empty_paragraph(block_id_for_index(0))]
}

fn block_id_for_index(index: usize) -> String {
    format!("block-{index}")
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::{decode, encode, PageDocument, PageKind, ViewType};
    use crate::model::block::Block;
    use crate::model::property::{PropertyConfig, PropertyType};
    use serde_json::json;

    fn database_doc() -> PageDocument {
        let mut properties = serde_json::Map::new();
        properties.insert("status".to_string(), json!("done"));
        PageDocument {
            blocks: vec![
                Block::paragraph("a", "Intro"),
                Block::new("b", "heading", json!([{"type": "text", "text": "Tasks"}])),
            ],
            schema: vec![
                PropertyConfig::new("status", PropertyType::Select).with_options(["todo", "done"]),
                PropertyConfig::new("estimate", PropertyType::Number),
            ],
            properties,
            view_type: Some(ViewType::Board),
        }
    }

    #[test]
    fn encoded_document_decodes_to_the_same_value() {
        let doc = database_doc();
        assert_eq!(decode(&encode(&doc)), doc);

        let free_form = PageDocument::from_blocks(vec![Block::paragraph("x", "only text")]);
        assert_eq!(decode(&encode(&free_form)), free_form);
    }

    #[test]
    fn bare_array_matches_object_with_blocks() {
        let blocks = json!([
            {"id": "1", "type": "paragraph", "content": "one"},
            {"id": "2", "type": "bulletListItem", "content": "two", "props": {"level": 1}}
        ]);
        let legacy = decode(&blocks);
        let wrapped = decode(&json!({ "blocks": blocks }));
        assert_eq!(legacy.blocks, wrapped.blocks);
        assert_eq!(legacy.blocks[1].extra["props"]["level"], 1);
    }

    #[test]
    fn unrecognized_input_degrades_to_single_empty_paragraph() {
        for raw in [json!(null), json!(42), json!(true), json!({"foo": "bar"})] {
            let doc = decode(&raw);
            assert_eq!(doc, PageDocument::default());
            assert_eq!(doc.blocks.len(), 1);
            assert_eq!(doc.blocks[0].kind, "paragraph");
            assert!(doc.schema.is_empty());
        }
    }

    #[test]
    fn stringified_json_and_plain_text_are_accepted() {
        let doc = decode(&json!("[{\"id\":\"s1\",\"type\":\"paragraph\",\"content\":\"hi\"}]"));
        assert_eq!(doc.blocks[0].id, "s1");

        let doc = decode(&json!("just words"));
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(doc.blocks[0].plain_text(), "just words");
    }

    #[test]
    fn missing_and_duplicate_block_ids_are_made_unique() {
        let doc = decode(&json!([
            {"id": "x", "content": "a"},
            {"content": "b"},
            {"id": "x", "content": "c"},
            "not a block"
        ]));
        let ids: Vec<&str> = doc.blocks.iter().map(|block| block.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "block-1", "x-1"]);
        assert!(doc.blocks.iter().all(|block| block.kind == "paragraph"));
    }

    #[test]
    fn invalid_schema_entries_and_view_types_are_dropped() {
        let doc = decode(&json!({
            "blocks": [],
            "schema": [
                {"key": "status", "type": "select"},
                {"key": "broken", "type": "hologram"},
                {"key": "status", "type": "text"}
            ],
            "properties": "nope",
            "viewType": "timeline"
        }));
        assert!(doc.blocks.is_empty());
        assert_eq!(doc.schema.len(), 1);
        assert!(doc.properties.is_empty());
        assert_eq!(doc.kind(), PageKind::FreeForm);
    }

    #[test]
    fn encode_omits_empty_optional_sections() {
        let value = encode(&PageDocument::from_blocks(Vec::new()));
        assert_eq!(value, json!({"blocks": []}));
    }
}
