//! Logging setup: console output plus one log file per run

use std::fs;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::Result;

/// Default directory for run logs
pub const LOG_DIR: &str = "logs";

const DEFAULT_FILTER: &str = "scorecast=info";

/// File name for a run started now, e.g. `10_19_2026_14_03_55.log`
pub fn log_file_name() -> String {
    format!("{}.log", chrono::Local::now().format("%m_%d_%Y_%H_%M_%S"))
}

/// Handle returned by [`init_logging`]. Dropping it flushes the file writer.
pub struct LoggingGuard {
    pub log_file: PathBuf,
    _guard: WorkerGuard,
}

/// Install a console layer and a file layer under `log_dir`.
///
/// The filter comes from `RUST_LOG` and falls back to `scorecast=info`.
pub fn init_logging(log_dir: impl AsRef<Path>) -> Result<LoggingGuard> {
    let log_dir = log_dir.as_ref();
    fs::create_dir_all(log_dir)?;

    let file_name = log_file_name();
    let file_appender = tracing_appender::rolling::never(log_dir, &file_name);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_line_number(true)
        .with_target(true);
    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| crate::error::ScorecastError::ConfigError(e.to_string()))?;

    Ok(LoggingGuard {
        log_file: log_dir.join(file_name),
        _guard: guard,
    })
}
