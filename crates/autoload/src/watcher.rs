//! Filesystem watcher that schedules a reload after source changes.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{ModifyKind, RemoveKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::dependencies::{DependencyError, Resolution};
use crate::loader::{Loader, ReloadSummary, Result};

/// Watches a loader's roots and remembers whether anything relevant changed.
///
/// Events only set a flag; the reload itself happens on the caller's thread in
/// [`execute_if_updated`](ReloadWatcher::execute_if_updated), so a burst of
/// writes results in a single reload.
pub struct ReloadWatcher {
    updated: Arc<AtomicBool>,
    /// Active filesystem watcher (held to keep it alive).
    _watcher: RecommendedWatcher,
}

impl ReloadWatcher {
    /// Start watching every root of `loader` recursively.
    pub fn watch(loader: &Loader, poll_interval: Duration) -> Result<Self> {
        let updated = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&updated);
        let extensions = loader.extensions().to_vec();

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if is_relevant(&event, &extensions) {
                        debug!(paths = ?event.paths, kind = ?event.kind, "source change detected");
                        flag.store(true, Ordering::Release);
                    }
                }
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            },
        )?;

        if let Err(e) = watcher.configure(notify::Config::default().with_poll_interval(poll_interval)) {
            warn!(error = %e, "failed to configure watcher poll interval, using backend default");
        }

        for root in loader.roots() {
            watcher.watch(root, RecursiveMode::Recursive)?;
        }

        info!(loader = loader.tag(), roots = loader.roots().len(), "watching roots for changes");
        Ok(Self {
            updated,
            _watcher: watcher,
        })
    }

    /// Flag a change by hand, e.g. after generating files.
    pub fn mark_updated(&self) {
        self.updated.store(true, Ordering::Release);
    }

    pub fn is_updated(&self) -> bool {
        self.updated.load(Ordering::Acquire)
    }

    /// Reload through `resolution` if a change was seen since the last call.
    pub fn execute_if_updated(
        &self,
        resolution: &dyn Resolution,
    ) -> std::result::Result<Option<ReloadSummary>, DependencyError> {
        if !self.updated.swap(false, Ordering::AcqRel) {
            return Ok(None);
        }
        resolution.clear_all().map(Some)
    }
}

/// Whether an event can change the set of names or their contents.
pub(crate) fn is_relevant(event: &Event, extensions: &[String]) -> bool {
    let kind_matters = matches!(
        event.kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Remove(_)
    );
    if !kind_matters {
        return false;
    }
    let folder_event = matches!(event.kind, EventKind::Remove(RemoveKind::Folder));
    event
        .paths
        .iter()
        .any(|path| is_source_path(path, extensions, folder_event))
}

fn is_source_path(path: &Path, extensions: &[String], folder_event: bool) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true);
    if hidden {
        return false;
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => extensions.iter().any(|x| x == ext),
        // Directories (namespaces) usually have no extension.
        None => folder_event || path.is_dir() || !path.exists(),
    }
}
