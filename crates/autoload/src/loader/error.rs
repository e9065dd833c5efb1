//! Error types and summaries for the loaders.

use std::path::PathBuf;

use crate::materializer::MaterializeError;

/// Errors that can occur while configuring, scanning, resolving or reloading.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// No root of this loader defines the symbolic name.
    #[error("uninitialized name {0}")]
    NotFound(String),

    /// `push_dir` was given something that is not an existing directory.
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// Configuration call made after `setup()`.
    #[error("loader '{loader}' is already set up; {action} must happen before setup")]
    AlreadySetUp {
        loader: &'static str,
        action: &'static str,
    },

    /// Lookup before `setup()`.
    #[error("loader '{0}' has not been set up")]
    NotSetUp(&'static str),

    /// A reload was requested but reloading was never enabled.
    #[error("reloading is disabled for loader '{0}'")]
    ReloadingDisabled(&'static str),

    /// The materializer failed for a file.
    #[error("failed to materialize {name} from {}: {source}", .path.display())]
    Materialize {
        name: String,
        path: PathBuf,
        #[source]
        source: MaterializeError,
    },

    /// Directory walk error.
    #[error("scan error: {0}")]
    Scan(#[from] walkdir::Error),

    /// Filesystem watcher error.
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error(transparent)]
    Core(#[from] autoload_core::CoreError),
}

/// Result alias for loader operations.
pub type Result<T> = std::result::Result<T, LoadError>;

/// Outcome of one reload cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    /// Definitions discarded.
    pub unloaded: usize,
    /// Of those, how many had a teardown hook that ran.
    pub torn_down: usize,
    /// Definitions materialized again by the eager pass.
    pub eager_loaded: usize,
    /// Eager names that failed to materialize again; logged and skipped.
    pub failed: usize,
}
