//! Connection bootstrap utilities for SQLite.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - Returned connections have migrations fully applied.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a page database file and applies all pending migrations.
///
/// # Side effects
/// - Creates the file and its parent directories when missing.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| DbError::CreateDir {
            dir: dir.to_path_buf(),
            source,
        })?;
    }
    open_with("file", || Connection::open(path))
}

/// Opens an in-memory page database with all migrations applied.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with("memory", Connection::open_in_memory)
}

fn open_with<F>(mode: &'static str, connect: F) -> DbResult<Connection>
where
    F: FnOnce() -> rusqlite::Result<Connection>,
{
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = connect().map_err(|err| {
        error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={err}",
            started_at.elapsed().as_millis()
        );
        err
    })?;

    if let Err(err) = bootstrap_connection(&mut conn) {
        error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={err}",
            started_at.elapsed().as_millis()
        );
        return Err(err);
    }

    info!(
        "event=db_open module=db status=ok mode={mode} duration_ms={}",
        started_at.elapsed().as_millis()
    );
    Ok(conn)
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)
}
