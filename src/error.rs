//! Error types for dashboard-harvest
//!
//! This module provides error handling for the library, including:
//! - Attempt-level failures that feed the retry loop (`TransientUi`,
//!   `SelectionVerification`, `DownloadTimeout`)
//! - The upstream-outage signal that triggers the recovery cycle
//!   (`UpstreamUnavailable`)
//! - Setup and ambient failures (`FatalSetup`, `Browser`, `Config`, I/O,
//!   storage transport)

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for dashboard-harvest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dashboard-harvest
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// A remote UI interaction failed in a way that is worth retrying
    #[error("transient UI failure: {reason}")]
    TransientUi {
        /// What the interaction was trying to do when it failed
        reason: String,
    },

    /// The upstream dashboard is serving an outage page
    #[error("upstream unavailable")]
    UpstreamUnavailable,

    /// A selection was clicked but the widget ended up showing something else
    #[error("selection verification failed: wanted {wanted:?}, got {got:?}")]
    SelectionVerification {
        /// The label the selection was supposed to land on
        wanted: String,
        /// The label the widget actually displayed afterwards
        got: String,
    },

    /// No completed export showed up in the download directory in time
    #[error("no completed download appeared in {dir} within {waited:?}")]
    DownloadTimeout {
        /// The download directory that was being watched
        dir: PathBuf,
        /// How long the watcher waited before giving up
        waited: Duration,
    },

    /// Failed to stage a downloaded file at its destination
    #[error("failed to stage download at {path}: {reason}")]
    Destination {
        /// The destination path the file was headed for
        path: PathBuf,
        /// Why staging failed (suffix space exhausted, vanished after move, ...)
        reason: String,
    },

    /// An unrecoverable setup failure; the run cannot proceed
    #[error("fatal setup failure: {reason}")]
    FatalSetup {
        /// What could not be set up (browser launch, download dir, ...)
        reason: String,
    },

    /// Browser automation error from the CDP layer
    #[error("browser error: {message}")]
    Browser {
        /// The underlying automation failure
        message: String,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "storage.endpoint")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Object storage transport error
    #[error("storage error: {0}")]
    Storage(#[from] reqwest::Error),

    /// Object storage rejected a request
    #[error("storage rejected {key}: HTTP {status}")]
    Upload {
        /// The object key the request was for
        key: String,
        /// The HTTP status the storage service answered with
        status: u16,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
