//! Console logger used by the entry point.
use std::path::{Path, PathBuf};

use super::subscriber::{CONSOLE_TARGET, STAGE_TARGET};
use super::types::Log;
use super::utils::log_file_path;

/// Implement [`Log`] by delegating to inherent methods of the same name.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Logger for messages addressed to the user.
///
/// Messages go to the console (subject to verbosity) and to the persistent
/// log file at `$XDG_CACHE_HOME/provision/<command>.log` (default
/// `~/.cache/provision/<command>.log`).
#[derive(Debug)]
pub struct Logger {
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a new logger.
    ///
    /// Only records the log file path; the file itself is created by
    /// [`init_subscriber`](super::init_subscriber).
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            log_file: log_file_path(command),
        }
    }

    /// Path of the persistent log file, if the cache directory is usable.
    #[must_use]
    pub fn log_path(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!(target: CONSOLE_TARGET, "{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!(target: CONSOLE_TARGET, "{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!(target: CONSOLE_TARGET, "{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!(target: CONSOLE_TARGET, "{msg}");
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error);
}
