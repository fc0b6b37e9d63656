//! Page database bootstrap.
//!
//! # Responsibility
//! - Open page database files, creating missing parent directories.
//! - Bring every connection to the latest page schema before use.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - A failed migration leaves the file at its previous version.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Parent directory of the database file could not be created.
    CreateDir {
        dir: PathBuf,
        source: std::io::Error,
    },
    /// One migration script failed; the whole batch was rolled back.
    Migration {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
    /// The file was written by a newer build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::CreateDir { dir, source } => write!(
                f,
                "failed to create database directory `{}`: {source}",
                dir.display()
            ),
            Self::Migration {
                version,
                name,
                source,
            } => write!(f, "page schema migration {version} ({name}) failed: {source}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "page database schema {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::CreateDir { source, .. } => Some(source),
            Self::Migration { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
