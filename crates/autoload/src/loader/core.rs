//! Core [`Loader`] struct: lazy, on-demand materialization of symbolic names.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use tracing::{debug, info};

use autoload_core::Inflector;

use crate::definition::{same_definition, Handle, LoadedDefinition, Namespace};
use crate::materializer::Materializer;

use super::error::{LoadError, Result};
use super::scan::{parent_name, Index, ScanPlan};

pub(super) type Callback = Box<dyn Fn(&LoadedDefinition) + Send + Sync>;

/// Maps symbolic names to files below a set of root directories and
/// materializes them on first reference.
///
/// Configuration (`push_dir`, `ignore`, callbacks, ...) takes `&mut self` and
/// is only allowed before [`setup`](Loader::setup). Lookups and reloads take
/// `&self` and serialize on an internal mutex, so a name is materialized at
/// most once between two reloads even under concurrent lookups.
pub struct Loader {
    tag: &'static str,
    inflector: Arc<Inflector>,
    materializer: Arc<dyn Materializer>,
    extensions: Vec<String>,
    roots: Vec<PathBuf>,
    not_eager: Vec<PathBuf>,
    ignored: HashSet<PathBuf>,
    reloading_enabled: bool,
    on_load: Vec<Callback>,
    pub(super) on_unload: Vec<Callback>,
    verbose: AtomicBool,
    set_up: AtomicBool,
    state: Mutex<LoaderState>,
}

#[derive(Default)]
pub(super) struct LoaderState {
    /// Built from disk on first use; dropped on reload.
    pub index: Option<Index>,
    /// Materialized definitions in materialization order.
    pub loaded: IndexMap<String, LoadedDefinition>,
}

impl Loader {
    /// Create a loader that recognises `*.yml` / `*.yaml` files.
    pub fn new(
        tag: &'static str,
        inflector: Arc<Inflector>,
        materializer: Arc<dyn Materializer>,
    ) -> Self {
        Self {
            tag,
            inflector,
            materializer,
            extensions: vec!["yml".into(), "yaml".into()],
            roots: Vec::new(),
            not_eager: Vec::new(),
            ignored: HashSet::new(),
            reloading_enabled: false,
            on_load: Vec::new(),
            on_unload: Vec::new(),
            verbose: AtomicBool::new(false),
            set_up: AtomicBool::new(false),
            state: Mutex::new(LoaderState::default()),
        }
    }

    /// Replace the set of file extensions that define names.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    // ── Configuration ───────────────────────────────────────────

    /// Register a root directory. Its contents are eager-loaded at setup
    /// unless [`do_not_eager_load`](Loader::do_not_eager_load) is called.
    pub fn push_dir(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        self.ensure_configurable("push_dir")?;
        let path = path.into();
        if !path.is_dir() {
            return Err(LoadError::NotADirectory(path));
        }
        if !self.roots.contains(&path) {
            self.roots.push(path);
        }
        Ok(())
    }

    /// Exclude a root (or any directory below one) from the eager pass.
    pub fn do_not_eager_load(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        self.ensure_configurable("do_not_eager_load")?;
        self.not_eager.push(path.into());
        Ok(())
    }

    /// Exclude a file or directory from scanning.
    pub fn ignore(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        self.ensure_configurable("ignore")?;
        self.ignored.insert(path.into());
        Ok(())
    }

    /// Allow [`reload`](Loader::reload). Fixed once the loader is set up.
    pub fn enable_reloading(&mut self) -> Result<()> {
        self.ensure_configurable("enable_reloading")?;
        self.reloading_enabled = true;
        Ok(())
    }

    /// Run `callback` after every materialization.
    pub fn on_load<F>(&mut self, callback: F) -> Result<()>
    where
        F: Fn(&LoadedDefinition) + Send + Sync + 'static,
    {
        self.ensure_configurable("on_load")?;
        self.on_load.push(Box::new(callback));
        Ok(())
    }

    /// Run `callback` for every definition discarded by a reload, after its
    /// teardown hook.
    pub fn on_unload<F>(&mut self, callback: F) -> Result<()>
    where
        F: Fn(&LoadedDefinition) + Send + Sync + 'static,
    {
        self.ensure_configurable("on_unload")?;
        self.on_unload.push(Box::new(callback));
        Ok(())
    }

    fn ensure_configurable(&self, action: &'static str) -> Result<()> {
        if self.is_set_up() {
            return Err(LoadError::AlreadySetUp {
                loader: self.tag,
                action,
            });
        }
        Ok(())
    }

    // ── Setup & lookup ──────────────────────────────────────────

    /// Finish configuration and run the eager pass.
    ///
    /// Returns the number of definitions materialized. Calling it again is a
    /// no-op that returns zero.
    pub fn setup(&self) -> Result<usize> {
        let mut state = self.state();
        if self.set_up.load(Ordering::Acquire) {
            return Ok(0);
        }
        let eager_loaded = self.eager_load_locked(&mut state)?;
        self.set_up.store(true, Ordering::Release);
        info!(
            loader = self.tag,
            roots = self.roots.len(),
            eager_loaded,
            reloading = self.reloading_enabled,
            "loader set up"
        );
        Ok(eager_loaded)
    }

    /// Return the definition for `name`, materializing it (and its parent
    /// namespaces) on first reference.
    pub fn resolve(&self, name: &str) -> Result<Handle> {
        if !self.is_set_up() {
            return Err(LoadError::NotSetUp(self.tag));
        }
        let mut state = self.state();
        self.resolve_locked(&mut state, name)
    }

    pub(super) fn resolve_locked(&self, state: &mut LoaderState, name: &str) -> Result<Handle> {
        if let Some(record) = state.loaded.get(name) {
            return Ok(Arc::clone(record.handle()));
        }

        let entry = self
            .index_locked(state)?
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(name.to_string()))?;

        if let Some(parent) = parent_name(name) {
            self.resolve_locked(state, parent)?;
        }

        let record = match entry.file {
            Some(path) => {
                let handle = self.materializer.materialize(name, &path).map_err(|source| {
                    LoadError::Materialize {
                        name: name.to_string(),
                        path: path.clone(),
                        source,
                    }
                })?;
                LoadedDefinition::new(name.to_string(), Some(path), handle)
            }
            None => {
                let handle: Handle = Arc::new(Namespace {
                    name: name.to_string(),
                    dirs: entry.dirs,
                });
                LoadedDefinition::new(name.to_string(), None, handle)
            }
        };

        self.trace("autoloaded", &record);
        for callback in &self.on_load {
            callback(&record);
        }
        let handle = Arc::clone(record.handle());
        state.loaded.insert(name.to_string(), record);
        Ok(handle)
    }

    fn eager_load_locked(&self, state: &mut LoaderState) -> Result<usize> {
        let before = state.loaded.len();
        for name in self.eager_names_locked(state)? {
            self.resolve_locked(state, &name)?;
        }
        Ok(state.loaded.len() - before)
    }

    /// Names under eager roots, parents before children.
    pub(super) fn eager_names_locked(&self, state: &mut LoaderState) -> Result<Vec<String>> {
        Ok(self
            .index_locked(state)?
            .iter()
            .filter(|(_, entry)| entry.eager)
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn index_locked<'s>(&self, state: &'s mut LoaderState) -> Result<&'s Index> {
        let index = match state.index.take() {
            Some(index) => index,
            None => {
                let index = ScanPlan {
                    roots: &self.roots,
                    ignored: &self.ignored,
                    not_eager: &self.not_eager,
                    extensions: &self.extensions,
                    inflector: &self.inflector,
                }
                .scan()?;
                debug!(loader = self.tag, names = index.len(), "scanned roots");
                index
            }
        };
        Ok(state.index.insert(index))
    }

    // ── Queries ─────────────────────────────────────────────────

    /// Names materialized so far, in materialization order.
    pub fn loaded_names(&self) -> Vec<String> {
        self.state().loaded.keys().cloned().collect()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.state().loaded.contains_key(name)
    }

    /// Names the next reload would discard. Empty when reloading is disabled.
    pub fn unloadable_names(&self) -> Vec<String> {
        if !self.reloading_enabled {
            return Vec::new();
        }
        self.loaded_names()
    }

    pub fn is_unloadable(&self, name: &str) -> bool {
        self.reloading_enabled && self.is_loaded(name)
    }

    /// Whether `handle` is one of this loader's live definitions.
    pub fn owns(&self, handle: &Handle) -> bool {
        self.name_of(handle).is_some()
    }

    /// Symbolic name under which `handle` is currently registered.
    pub fn name_of(&self, handle: &Handle) -> Option<String> {
        self.state()
            .loaded
            .values()
            .find(|record| same_definition(record.handle(), handle))
            .map(|record| record.name().to_string())
    }

    /// Every name the roots define right now, loaded or not.
    pub fn defined_names(&self) -> Result<Vec<String>> {
        let mut state = self.state();
        Ok(self.index_locked(&mut state)?.keys().cloned().collect())
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn manages(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| path.starts_with(root))
    }

    pub fn reloading_enabled(&self) -> bool {
        self.reloading_enabled
    }

    pub fn is_set_up(&self) -> bool {
        self.set_up.load(Ordering::Acquire)
    }

    // ── Diagnostics ─────────────────────────────────────────────

    pub fn set_verbose(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::Relaxed);
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    pub(super) fn trace(&self, action: &'static str, record: &LoadedDefinition) {
        let path = record
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(namespace)".to_string());
        if self.is_verbose() {
            info!(loader = self.tag, name = %record.name(), path = %path, "{action}");
        } else {
            debug!(loader = self.tag, name = %record.name(), path = %path, "{action}");
        }
    }

    /// Lock the loader state.
    ///
    /// Records are inserted only after a materializer returns, so a panic
    /// inside one leaves the registry consistent and the lock is recovered.
    pub(super) fn state(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("tag", &self.tag)
            .field("roots", &self.roots)
            .field("reloading_enabled", &self.reloading_enabled)
            .field("set_up", &self.is_set_up())
            .finish_non_exhaustive()
    }
}
