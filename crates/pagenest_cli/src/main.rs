//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `pagenest_core` linkage.
//! - Inspect a page database: print the page tree, list the trash, and run
//!   the retention sweep.
//!
//! Output is line-oriented and deterministic for quick local checks.
//!
//! ```bash
//! pagenest tree pages.db
//! pagenest --config pagenest.json sweep
//! ```

use clap::{Parser, Subcommand};
use pagenest_core::{
    flatten, init_logging, open_db, SqlitePageRepository, Workspace, WorkspaceConfig,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Page workspace inspector
#[derive(Parser, Debug)]
#[command(name = "pagenest", version, about = "Inspect a pagenest page database")]
struct Args {
    /// JSON configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Check that the core library links
    Ping,
    /// Print the core library version
    Version,
    /// Print the live page tree
    Tree {
        /// Database file (defaults to `db_path` from the config)
        db: Option<PathBuf>,
    },
    /// List trash entries, most recent first
    Trash {
        /// Database file (defaults to `db_path` from the config)
        db: Option<PathBuf>,
    },
    /// Purge trash entries past the retention window
    Sweep {
        /// Database file (defaults to `db_path` from the config)
        db: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("pagenest: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), String> {
    let config = match args.config.as_deref() {
        Some(path) => WorkspaceConfig::load(path).map_err(|err| err.to_string())?,
        None => WorkspaceConfig::default(),
    };
    init_logging(&config).map_err(|err| err.to_string())?;

    match args.command.unwrap_or(Command::Ping) {
        Command::Ping => println!("pagenest_core ping={}", pagenest_core::ping()),
        Command::Version => println!("pagenest_core version={}", pagenest_core::core_version()),
        Command::Tree { db } => with_workspace(db.as_deref(), config, |workspace| {
            for (depth, page) in flatten(&workspace.tree()) {
                println!("{}{} [{}]", "  ".repeat(depth), page.title, page.id);
            }
            Ok(())
        })?,
        Command::Trash { db } => with_workspace(db.as_deref(), config, |workspace| {
            for entry in workspace.list_deleted_pages() {
                println!(
                    "{} [{}] deleted_at={} purge_at={} path={}",
                    entry.title,
                    entry.id,
                    entry.deleted_at,
                    entry.permanently_delete_at,
                    entry.metadata.original_path.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        })?,
        Command::Sweep { db } => with_workspace(db.as_deref(), config, |workspace| {
            let purged = workspace.purge_expired().map_err(|err| err.to_string())?;
            println!("purged={}", purged.len());
            Ok(())
        })?,
    }
    Ok(())
}

fn with_workspace<F>(db: Option<&Path>, config: WorkspaceConfig, action: F) -> Result<(), String>
where
    F: FnOnce(&mut Workspace<SqlitePageRepository<'_>>) -> Result<(), String>,
{
    let db_path = config
        .resolve_db_path(db)
        .map_err(|err| err.to_string())?;
    let conn = open_db(&db_path).map_err(|err| err.to_string())?;
    let repo = SqlitePageRepository::try_new(&conn).map_err(|err| err.to_string())?;
    let mut workspace = Workspace::open(repo, config).map_err(|err| err.to_string())?;
    action(&mut workspace)
}
