//! Process-wide exclusion between materialization and unloading.

use std::sync::{Mutex, PoisonError};

use tracing::trace;

/// Serializes everything that reads or mutates loaded state.
///
/// `loading` and `unloading` share one mutex: a reload never overlaps a
/// lookup, and two lookups never overlap each other. Host code that mutates
/// loaded state outside the loaders can run inside [`Interlock::unloading`]
/// to get the same guarantee.
#[derive(Debug, Default)]
pub struct Interlock {
    lock: Mutex<()>,
}

impl Interlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the interlock for a lookup.
    pub fn loading<R>(&self, f: impl FnOnce() -> R) -> R {
        // The guard protects no data, so a poisoned lock is still usable.
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Run `f` while holding the interlock for a teardown.
    pub fn unloading<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        trace!("entered unload interlock");
        f()
    }
}
