//! Error types surfaced by the tracker core.

use std::path::PathBuf;

/// Failures the core reports to its host.
///
/// `LogAppend` coming back from `SessionController::start`/`stop` means the
/// state transition has already been applied; only the durable CSV record is
/// missing and the user should be told.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Failed to initialise event log at {path}: {source}")]
    LogInit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to append {event} record to {path}: {source}")]
    LogAppend {
        event: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create screenshot directory {path}: {source}")]
    ScreenshotDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Capture of display {display} failed: {message}")]
    Capture { display: String, message: String },

    #[error("Failed to save screenshot {path}: {message}")]
    Persist { path: PathBuf, message: String },

    #[error("Invalid configuration value for {key}: {value:?} ({reason})")]
    Config {
        key: &'static str,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, TrackerError>;
