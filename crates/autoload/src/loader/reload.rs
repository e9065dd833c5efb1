//! Teardown-and-rebuild cycle of a reloadable loader.

use tracing::{info, warn};

use super::core::{Loader, LoaderState};
use super::error::{LoadError, ReloadSummary, Result};

impl Loader {
    /// Discard every materialized definition and start over from disk.
    ///
    /// Teardown hooks run child-first (reverse materialization order), then the
    /// `on_unload` callbacks, then the registry and the scanned index are
    /// dropped and the eager pass runs again. Lookups from other threads block
    /// on the loader's state lock for the whole cycle.
    ///
    /// Once teardown has started the cycle always completes: an eager name
    /// that fails to materialize again is logged, counted in
    /// [`ReloadSummary::failed`] and left for the next lookup to retry.
    ///
    /// Fails with [`LoadError::ReloadingDisabled`] without touching anything
    /// when reloading was not enabled before setup.
    pub fn reload(&self) -> Result<ReloadSummary> {
        if !self.reloading_enabled() {
            return Err(LoadError::ReloadingDisabled(self.tag()));
        }

        let mut state = self.state();
        let (unloaded, torn_down) = self.unload_locked(&mut state);
        let (eager_loaded, failed) = if self.is_set_up() {
            self.reload_eager_locked(&mut state)
        } else {
            (0, 0)
        };

        let summary = ReloadSummary {
            unloaded,
            torn_down,
            eager_loaded,
            failed,
        };
        if summary.failed > 0 {
            warn!(
                loader = self.tag(),
                unloaded = summary.unloaded,
                eager_loaded = summary.eager_loaded,
                failed = summary.failed,
                "reloaded with errors"
            );
        } else {
            info!(
                loader = self.tag(),
                unloaded = summary.unloaded,
                torn_down = summary.torn_down,
                eager_loaded = summary.eager_loaded,
                "reloaded"
            );
        }
        Ok(summary)
    }

    fn unload_locked(&self, state: &mut LoaderState) -> (usize, usize) {
        let mut torn_down = 0;
        for record in state.loaded.values().rev() {
            if record.run_teardown() {
                torn_down += 1;
            }
            for callback in &self.on_unload {
                callback(record);
            }
            self.trace("unloaded", record);
        }
        let unloaded = state.loaded.len();
        state.loaded.clear();
        state.index = None;
        (unloaded, torn_down)
    }

    /// Eager pass that keeps going past broken definitions.
    ///
    /// Returns `(materialized, failed)`.
    fn reload_eager_locked(&self, state: &mut LoaderState) -> (usize, usize) {
        let names = match self.eager_names_locked(state) {
            Ok(names) => names,
            Err(e) => {
                // The index stays unset; the next lookup rescans.
                warn!(loader = self.tag(), error = %e, "failed to rescan roots during reload");
                return (0, 1);
            }
        };

        let before = state.loaded.len();
        let mut failed = 0;
        for name in names {
            if let Err(e) = self.resolve_locked(state, &name) {
                warn!(
                    loader = self.tag(),
                    name = %name,
                    error = %e,
                    "failed to materialize eager definition during reload, skipping"
                );
                failed += 1;
            }
        }
        (state.loaded.len() - before, failed)
    }
}
