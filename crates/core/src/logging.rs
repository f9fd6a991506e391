// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operational logging
//!
//! Diagnostics are ordinary `tracing` events. [`OperationalLog`] is the
//! handle the queue manager is given for messages tied to a particular file;
//! the `init_*` functions install the subscriber that writes them out.

use std::error::Error;
use std::path::{Path, PathBuf};
use thiserror::Error;
pub use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::util::TryInitError;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("cannot create log directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("log path has no file name: {}", .0.display())]
    NoFileName(PathBuf),
    #[error("a global subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

/// Diagnostic logger for file-scoped events
#[derive(Debug, Clone)]
pub struct OperationalLog {
    component: &'static str,
}

impl Default for OperationalLog {
    fn default() -> Self {
        Self::new("ipcq")
    }
}

impl OperationalLog {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn info(&self, file: &Path, message: &str) {
        tracing::info!(component = self.component, file = %file.display(), "{}", message);
    }

    pub fn warn(&self, file: &Path, message: &str) {
        tracing::warn!(component = self.component, file = %file.display(), "{}", message);
    }

    /// Log an error, with the full source chain of `err` when given
    pub fn error(&self, file: &Path, message: &str, err: Option<&(dyn Error + 'static)>) {
        match err {
            Some(err) => tracing::error!(
                component = self.component,
                file = %file.display(),
                error = %error_chain(err),
                "{}",
                message
            ),
            None => tracing::error!(component = self.component, file = %file.display(), "{}", message),
        }
    }
}

/// `err` followed by each of its sources, separated by `": "`
pub fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

/// Install a global subscriber appending to `path`
///
/// `RUST_LOG` takes precedence over `default_level`. Keep the returned guard
/// alive until exit or buffered lines are lost.
pub fn init_file(path: &Path, default_level: &str) -> Result<WorkerGuard, LoggingError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let file_name = path
        .file_name()
        .ok_or_else(|| LoggingError::NoFileName(path.to_path_buf()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()?;

    Ok(guard)
}

/// Install a global subscriber writing to stderr
pub fn init_stderr(verbosity: u8) -> Result<(), LoggingError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for_verbosity(verbosity)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()?;
    Ok(())
}

/// Filter directive for a `-v` count
pub fn level_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
