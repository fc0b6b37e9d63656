//! SQLite migration registry and executor.
//!
//! # Invariants
//! - `version` values are strictly increasing.
//! - All pending migrations apply in one transaction; the applied version is
//!   mirrored to `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "pages",
        sql: include_str!("0001_pages.sql"),
    },
    Migration {
        version: 2,
        name: "page_tags",
        sql: include_str!("0002_page_tags.sql"),
    },
    Migration {
        version: 3,
        name: "deleted_pages",
        sql: include_str!("0003_deleted_pages.sql"),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }
    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS
        .iter()
        .filter(|migration| migration.version > current_version)
    {
        tx.execute_batch(migration.sql)
            .and_then(|()| {
                tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
            })
            .map_err(|source| DbError::Migration {
                version: migration.version,
                name: migration.name,
                source,
            })?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;

    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
