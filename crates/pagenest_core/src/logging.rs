//! Process logging for pagenest hosts.
//!
//! # Responsibility
//! - Start rolling file logs from a `WorkspaceConfig`, once per process.
//! - Keep page text out of log lines, including panic payloads.
//!
//! # Invariants
//! - A config without `log_dir` leaves logging to the host process.
//! - Repeating the active settings is a no-op; different settings are
//!   rejected.
//! - Initialization never panics.

use crate::config::WorkspaceConfig;
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "pagenest";
const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 4;
const PANIC_SUMMARY_CHARS: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();

struct ActiveLogger {
    settings: LogSettings,
    _handle: LoggerHandle,
}

/// Logging setup failure.
#[derive(Debug)]
pub enum LoggingError {
    InvalidLevel(String),
    InvalidDir(String),
    CreateDir { dir: PathBuf, source: std::io::Error },
    Backend(String),
    /// Logging already runs with other settings.
    Conflict {
        active: LogSettings,
        requested: LogSettings,
    },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::InvalidDir(reason) => write!(f, "invalid log_dir: {reason}"),
            Self::CreateDir { dir, source } => {
                write!(f, "failed to create log directory `{}`: {source}", dir.display())
            }
            Self::Backend(message) => write!(f, "failed to start logger: {message}"),
            Self::Conflict { active, requested } => write!(
                f,
                "logging already runs at level `{}` in `{}`; refusing level `{}` in `{}`",
                active.level,
                active.dir.display(),
                requested.level,
                requested.dir.display()
            ),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Validated logging target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: &'static str,
    pub dir: PathBuf,
}

impl LogSettings {
    pub fn new(level: &str, dir: &str) -> Result<Self, LoggingError> {
        Ok(Self {
            level: parse_level(level)?,
            dir: parse_log_dir(dir)?,
        })
    }

    /// Settings named by `config`, or `None` when it has no `log_dir`.
    pub fn from_config(config: &WorkspaceConfig) -> Result<Option<Self>, LoggingError> {
        config
            .log_dir
            .as_deref()
            .map(|dir| Self::new(&config.log_level, dir))
            .transpose()
    }
}

/// What `init_logging` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingOutcome {
    Started,
    AlreadyActive,
    /// The config names no log directory.
    Disabled,
}

/// Starts file logging as described by `config`.
pub fn init_logging(config: &WorkspaceConfig) -> Result<LoggingOutcome, LoggingError> {
    match LogSettings::from_config(config)? {
        Some(settings) => start(settings),
        None => Ok(LoggingOutcome::Disabled),
    }
}

/// Settings of the running logger, if any.
pub fn active_logging() -> Option<LogSettings> {
    ACTIVE.get().map(|active| active.settings.clone())
}

/// `debug` in debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

pub(crate) fn parse_level(level: &str) -> Result<&'static str, LoggingError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(LoggingError::InvalidLevel(other.to_string())),
    }
}

pub(crate) fn parse_log_dir(dir: &str) -> Result<PathBuf, LoggingError> {
    let trimmed = dir.trim();
    if trimmed.is_empty() {
        return Err(LoggingError::InvalidDir("must not be empty".to_string()));
    }
    let path = Path::new(trimmed);
    if !path.is_absolute() {
        return Err(LoggingError::InvalidDir(format!(
            "must be an absolute path, got `{trimmed}`"
        )));
    }
    Ok(path.to_path_buf())
}

fn start(settings: LogSettings) -> Result<LoggingOutcome, LoggingError> {
    if let Some(active) = ACTIVE.get() {
        return compare(&active.settings, settings);
    }
    let mut started = false;
    let active = ACTIVE.get_or_try_init(|| {
        started = true;
        open_logger(&settings)
    })?;
    if started {
        Ok(LoggingOutcome::Started)
    } else {
        compare(&active.settings, settings)
    }
}

fn compare(active: &LogSettings, requested: LogSettings) -> Result<LoggingOutcome, LoggingError> {
    if *active == requested {
        Ok(LoggingOutcome::AlreadyActive)
    } else {
        Err(LoggingError::Conflict {
            active: active.clone(),
            requested,
        })
    }
}

fn open_logger(settings: &LogSettings) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(&settings.dir).map_err(|source| LoggingError::CreateDir {
        dir: settings.dir.clone(),
        source,
    })?;

    let handle = Logger::try_with_str(settings.level)
        .map_err(|err| LoggingError::Backend(err.to_string()))?
        .log_to_file(
            FileSpec::default()
                .directory(settings.dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| LoggingError::Backend(err.to_string()))?;

    // Runs once: the cell only stores a successfully opened logger.
    install_panic_hook();
    info!(
        "event=logging_start module=logging status=ok level={} log_dir={} version={}",
        settings.level,
        settings.dir.display(),
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogger {
        settings: settings.clone(),
        _handle: handle,
    })
}

fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(
            "event=panic module=logging status=error location={} payload={}",
            location,
            single_line(&payload, PANIC_SUMMARY_CHARS)
        );
        previous(info);
    }));
}

// Panic payloads may quote page titles or block text.
fn single_line(value: &str, max_chars: usize) -> String {
    let flat: String = value
        .chars()
        .map(|ch| if ch == '\n' || ch == '\r' { ' ' } else { ch })
        .collect();
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}
