//! Tracing setup for the poller binary.
//!
//! Events always go to stderr, keeping stdout free for the JSON-lines sink.
//! A log file, when configured, receives the same events without colors and
//! is appended to across restarts. `RUST_LOG` takes precedence over the
//! configured level.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::Result;

fn parse_level(level: &str) -> Level {
    let level = level.trim();
    if level.eq_ignore_ascii_case("warning") {
        return Level::WARN;
    }
    level.parse().unwrap_or(Level::INFO)
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(parse_level(level).into())
        .from_env_lossy()
}

/// Open `path` for appending, creating missing parent directories.
///
/// An empty path means no log file.
fn open_log_file(path: &str) -> Result<Option<File>> {
    if path.is_empty() {
        return Ok(None);
    }
    let path = Path::new(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Some(file))
}

/// Install the global subscriber described by `config`.
///
/// Fails without installing anything when the log file cannot be opened.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let file_layer = open_log_file(&config.file)?.map(|file| {
        fmt::layer()
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .with_target(true)
    });

    tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(file_layer)
        .init();

    Ok(())
}

/// Install a stderr-only subscriber.
pub fn init_console_only(level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .init();
}
