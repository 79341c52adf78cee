use crate::{
    config::LoggingConfig,
    error::{Error, StartupError},
};
use std::path::Path;
use tracing::Level;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{prelude::*, EnvFilter};

pub const LOG_FILE_PREFIX: &str = "mailer.log";

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Daily rolling log file. Fails instead of panicking when `directory` cannot be created.
pub fn file_appender(directory: &Path) -> Result<RollingFileAppender, Error> {
    Ok(RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .build(directory)
        .map_err(|err| StartupError::Logging(format!("{}: {}", directory.display(), err)))?)
}

/// Installs the global subscriber: stdout always, plus a daily rolling file when
/// `directory` is set. The returned guard flushes the file writer on drop.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>, Error> {
    let level = if cfg!(feature = "debug-logging") {
        Level::DEBUG
    } else {
        parse_level(&config.level)
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let stdout_layer = tracing_subscriber::fmt::layer().with_target(true);

    let (file_layer, guard) = match config.directory.as_ref() {
        Some(directory) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(directory)?);
            (
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                ),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|err| StartupError::Logging(err.to_string()))?;
    Ok(guard)
}
