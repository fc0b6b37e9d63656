//! Workspace configuration.
//!
//! # Responsibility
//! - Describe tunables for autosave, projections, logging and storage.
//! - Normalize user-provided values into supported ranges.
//!
//! # Invariants
//! - `normalized()` output always satisfies the documented clamps.
//! - Unknown JSON fields are rejected so typos surface early.

use crate::autosave::queue::DEFAULT_AUTOSAVE_DEBOUNCE_MS;
use crate::logging::{default_log_level, parse_level, parse_log_dir};
use crate::view::projector::{ProjectionOptions, DEFAULT_GROUP_BY, DEFAULT_PREVIEW_CHARS};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const MIN_DEBOUNCE_MS: i64 = 100;
const MAX_DEBOUNCE_MS: i64 = 60_000;
const MIN_PREVIEW_CHARS: usize = 16;
const MAX_PREVIEW_CHARS: usize = 1_000;

/// Errors from loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// Workspace tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    pub autosave_debounce_ms: i64,
    pub preview_chars: usize,
    pub default_group_by: String,
    pub log_level: String,
    pub log_dir: Option<String>,
    pub db_path: Option<String>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            autosave_debounce_ms: DEFAULT_AUTOSAVE_DEBOUNCE_MS,
            preview_chars: DEFAULT_PREVIEW_CHARS,
            default_group_by: DEFAULT_GROUP_BY.to_string(),
            log_level: default_log_level().to_string(),
            log_dir: None,
            db_path: None,
        }
    }
}

impl WorkspaceConfig {
    /// Parses a JSON config document and normalizes it.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let parsed: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        parsed.normalized()
    }

    /// Reads and normalizes a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&text)
    }

    /// Applies clamps and validates logging settings.
    pub fn normalized(mut self) -> Result<Self, ConfigError> {
        self.autosave_debounce_ms = self
            .autosave_debounce_ms
            .clamp(MIN_DEBOUNCE_MS, MAX_DEBOUNCE_MS);
        self.preview_chars = self.preview_chars.clamp(MIN_PREVIEW_CHARS, MAX_PREVIEW_CHARS);

        let group_by = self.default_group_by.trim();
        self.default_group_by = if group_by.is_empty() {
            DEFAULT_GROUP_BY.to_string()
        } else {
            group_by.to_string()
        };

        self.log_level = parse_level(&self.log_level)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?
            .to_string();
        if let Some(log_dir) = self.log_dir.as_deref() {
            parse_log_dir(log_dir).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        }
        self.db_path = self
            .db_path
            .take()
            .map(|path| path.trim().to_string())
            .filter(|path| !path.is_empty());
        Ok(self)
    }

    /// Database location: an explicit path wins over `db_path`.
    pub fn resolve_db_path(&self, explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.db_path.as_deref().map(PathBuf::from))
            .ok_or_else(|| {
                ConfigError::Invalid("no database path given and `db_path` is unset".to_string())
            })
    }

    /// Projection options derived from this config.
    pub fn projection_options(&self) -> ProjectionOptions {
        ProjectionOptions {
            group_by: self.default_group_by.clone(),
            preview_chars: self.preview_chars,
        }
    }
}
