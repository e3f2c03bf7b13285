//! Logging configuration and initialization for gatekeep.
//!
//! The filter comes from `GATEKEEP_LOG` when set (full `EnvFilter` syntax),
//! otherwise from the configured level. sqlx statement logging is held at
//! `warn` unless the override asks for more.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::Result;

/// Environment variable holding a filter directive that replaces the configured level.
pub const LOG_FILTER_ENV: &str = "GATEKEEP_LOG";

/// Directives appended to the configured level.
const QUIET_DEPENDENCIES: &str = "sqlx=warn";

/// Parse log level string to tracing Level.
fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Filter for the configured level, ignoring the environment.
fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(parse_level(level).into())
        .parse_lossy(QUIET_DEPENDENCIES)
}

/// Filter from `GATEKEEP_LOG` if it parses, else from `level`.
fn build_filter(level: &str) -> EnvFilter {
    match std::env::var(LOG_FILTER_ENV) {
        Ok(directives) if !directives.trim().is_empty() => {
            EnvFilter::try_new(&directives).unwrap_or_else(|e| {
                eprintln!("Ignoring invalid {LOG_FILTER_ENV}={directives:?}: {e}");
                level_filter(level)
            })
        }
        _ => level_filter(level),
    }
}

/// Initialize the logging system with the given configuration.
///
/// Writes to stdout, and additionally to `config.file` when one is set.
pub fn init(config: &LoggingConfig) -> Result<()> {
    if config.file.is_empty() {
        init_console_only(&config.level);
        return Ok(());
    }

    if let Some(parent) = Path::new(&config.file).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    // Append so restarts keep earlier history.
    let log_file = File::options()
        .create(true)
        .append(true)
        .open(&config.file)?;
    let writer = std::io::stdout.and(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .with(build_filter(&config.level))
        .init();

    Ok(())
}

/// Initialize console-only logging (for development/testing).
pub fn init_console_only(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(true)
                .with_target(true),
        )
        .with(build_filter(level))
        .init();
}
