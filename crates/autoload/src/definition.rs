//! Materialized definitions and the records the loaders keep for them.

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared handle to a materialized definition.
///
/// Two handles refer to the same live definition iff [`Arc::ptr_eq`] holds.
pub type Handle = Arc<dyn Definition>;

/// Something a loader can materialize from a file (or a directory).
pub trait Definition: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;

    /// Whether this definition wants [`before_remove`](Self::before_remove)
    /// called when it is discarded. Read once, at materialization time.
    fn has_teardown(&self) -> bool {
        false
    }

    /// Teardown hook run immediately before the definition is discarded
    /// during a reload.
    fn before_remove(&self) {}
}

impl dyn Definition {
    pub fn downcast_ref<T: Definition>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Identity comparison of two handles.
pub fn same_definition(a: &Handle, b: &Handle) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// A namespace backed only by directories.
///
/// `Admin` is implicit when `admin/` exists in a root but `admin.yml` does not.
#[derive(Debug, Clone)]
pub struct Namespace {
    pub name: String,
    pub dirs: Vec<PathBuf>,
}

impl Definition for Namespace {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Bookkeeping for one materialized definition.
#[derive(Debug, Clone)]
pub struct LoadedDefinition {
    name: String,
    path: Option<PathBuf>,
    handle: Handle,
    has_teardown: bool,
}

impl LoadedDefinition {
    pub(crate) fn new(name: String, path: Option<PathBuf>, handle: Handle) -> Self {
        let has_teardown = handle.has_teardown();
        Self {
            name,
            path,
            handle,
            has_teardown,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Originating file; `None` for implicit namespaces.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn has_teardown(&self) -> bool {
        self.has_teardown
    }

    /// Run the teardown hook if the definition declared one.
    ///
    /// Returns whether a hook ran.
    pub fn run_teardown(&self) -> bool {
        if self.has_teardown {
            self.handle.before_remove();
        }
        self.has_teardown
    }
}
