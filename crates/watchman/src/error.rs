//! Error types for the watchman.

use thiserror::Error;

/// Result type alias for watchman operations.
pub type Result<T> = std::result::Result<T, WatchmanError>;

#[derive(Error, Debug)]
pub enum WatchmanError {
    /// Root directory of a monitor does not exist.
    #[error("directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// The watch handle was closed by monitor shutdown.
    #[error("watch set is closed")]
    Closed,

    #[error("invalid filename pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
