//! Tracing configuration and log routing.
//!
//! Every run logs to stdout through a compact formatter. Ingestion runs can be long, so a copy of
//! the log is also written to disk: `SUMDEX_LOG_FILE` names the file, `SUMDEX_LOG_FILE=off`
//! disables it, and the default is `logs/sumdex.log`. The file layer writes through a
//! non-blocking worker whose guard lives for the rest of the process.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "SUMDEX_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "sumdex.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where the file layer should write, derived from `SUMDEX_LOG_FILE`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogTarget {
    Disabled,
    File(PathBuf),
}

impl LogTarget {
    fn from_setting(setting: Option<&str>) -> Self {
        match setting.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("off") || value == "0" => Self::Disabled,
            Some(value) if !value.is_empty() => Self::File(PathBuf::from(value)),
            _ => Self::File(Path::new(DEFAULT_LOG_DIR).join(DEFAULT_LOG_FILE)),
        }
    }
}

/// Configure tracing subscribers for stdout and file logging.
///
/// - Respects `RUST_LOG` for filtering (defaults to `info`).
/// - Installs a compact stdout layer and, when the log file can be opened, a file layer.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let setting = std::env::var(LOG_FILE_ENV).ok();
    match LogTarget::from_setting(setting.as_deref()) {
        LogTarget::Disabled => registry.init(),
        LogTarget::File(path) => match open_file_writer(&path) {
            Some(writer) => {
                let file_layer = fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_ansi(false)
                    .compact();
                registry.with(file_layer).init();
            }
            None => registry.init(),
        },
    }
}

/// Returns `None` when the parent directory or the file itself cannot be created.
fn open_file_writer(path: &Path) -> Option<NonBlocking> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        if let Err(err) = std::fs::create_dir_all(parent) {
            eprintln!("Failed to create log directory {}: {err}", parent.display());
            return None;
        }
    }

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);
            Some(non_blocking)
        }
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            None
        }
    }
}
