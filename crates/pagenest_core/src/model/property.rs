//! Database property schema model.
//!
//! # Responsibility
//! - Describe the columns of a page acting as a database.
//! - Check that property values are consistent with their column type.
//!
//! # Invariants
//! - `key` is unique within one schema.
//! - `null` is an accepted value for every property type (empty cell).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Property values of one page keyed by `PropertyConfig::key`.
pub type PropertyValues = Map<String, Value>;

/// Column type of a database property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Text,
    Number,
    Select,
    MultiSelect,
    Date,
    Checkbox,
    Url,
}

impl PropertyType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Select => "select",
            Self::MultiSelect => "multi_select",
            Self::Date => "date",
            Self::Checkbox => "checkbox",
            Self::Url => "url",
        }
    }
}

/// One column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyConfig {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: PropertyType,
    /// Choices for select-like types. Empty means "any value".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl PropertyConfig {
    pub fn new(key: impl Into<String>, kind: PropertyType) -> Self {
        Self {
            key: key.into(),
            name: None,
            kind,
            options: Vec::new(),
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Display label, falling back to the key.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(self.key.as_str())
    }

    /// Returns whether `value` is consistent with this column type.
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self.kind {
            PropertyType::Text | PropertyType::Url => value.is_string(),
            PropertyType::Number => value.is_number(),
            PropertyType::Checkbox => value.is_boolean(),
            PropertyType::Date => value.as_str().is_some_and(is_date_like),
            PropertyType::Select => value
                .as_str()
                .is_some_and(|choice| self.allows_choice(choice)),
            PropertyType::MultiSelect => value.as_array().is_some_and(|items| {
                items
                    .iter()
                    .all(|item| item.as_str().is_some_and(|choice| self.allows_choice(choice)))
            }),
        }
    }

    fn allows_choice(&self, choice: &str) -> bool {
        self.options.is_empty() || self.options.iter().any(|option| option == choice)
    }
}

/// Property value validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    /// Schema declares the same key twice.
    DuplicateKey(String),
    /// Value key has no column in the governing schema.
    UnknownKey(String),
    /// Value does not match its column type.
    TypeMismatch {
        key: String,
        expected: PropertyType,
    },
}

impl Display for PropertyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKey(key) => write!(f, "schema declares property `{key}` twice"),
            Self::UnknownKey(key) => write!(f, "property `{key}` is not declared by the schema"),
            Self::TypeMismatch { key, expected } => write!(
                f,
                "property `{key}` must hold a {} value",
                expected.as_str()
            ),
        }
    }
}

impl Error for PropertyError {}

/// Checks that a schema declares unique keys.
pub fn validate_schema(schema: &[PropertyConfig]) -> Result<(), PropertyError> {
    let mut seen = HashSet::new();
    for config in schema {
        if !seen.insert(config.key.as_str()) {
            return Err(PropertyError::DuplicateKey(config.key.clone()));
        }
    }
    Ok(())
}

/// Checks every value against the schema column with the same key.
pub fn validate_properties(
    schema: &[PropertyConfig],
    values: &PropertyValues,
) -> Result<(), PropertyError> {
    for (key, value) in values {
        let config = schema
            .iter()
            .find(|config| &config.key == key)
            .ok_or_else(|| PropertyError::UnknownKey(key.clone()))?;
        if !config.accepts(value) {
            return Err(PropertyError::TypeMismatch {
                key: key.clone(),
                expected: config.kind,
            });
        }
    }
    Ok(())
}

// Accepts `YYYY-MM-DD` optionally followed by an RFC 3339 time part.
fn is_date_like(value: &str) -> bool {
    let date = value.get(..10).unwrap_or(value);
    let rest = value.get(10..).unwrap_or("");
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
        && (rest.is_empty() || rest.starts_with('T') || rest.starts_with(' '))
}
