//! The legacy resolution API, backed by the two loaders.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::warn;

use autoload_core::inflector::is_valid_segment;

use crate::autoloaders::Autoloaders;
use crate::definition::Handle;
use crate::interlock::Interlock;
use crate::loader::{LoadError, ReloadSummary, SEPARATOR};

/// Errors surfaced by the resolution API.
#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    #[error("uninitialized name {0}")]
    Unresolved(String),

    #[error("reloading is disabled because enable_reloading is false")]
    ReloadingDisabled,

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Either a symbolic name or a live definition.
#[derive(Debug, Clone, Copy)]
pub enum Reference<'a> {
    Name(&'a str),
    Handle(&'a Handle),
}

impl<'a> From<&'a str> for Reference<'a> {
    fn from(name: &'a str) -> Self {
        Reference::Name(name)
    }
}

impl<'a> From<&'a String> for Reference<'a> {
    fn from(name: &'a String) -> Self {
        Reference::Name(name)
    }
}

impl<'a> From<&'a Handle> for Reference<'a> {
    fn from(handle: &'a Handle) -> Self {
        Reference::Handle(handle)
    }
}

/// Contract callers that predate the loaders rely on.
pub trait Resolution: Send + Sync {
    /// Definition for a fully qualified name; materializes it if needed.
    fn resolve(&self, name: &str) -> Result<Handle, DependencyError>;

    /// Like [`resolve`](Resolution::resolve) but `None` instead of an error.
    fn safe_resolve(&self, name: &str) -> Option<Handle>;

    /// Names the next [`clear_all`](Resolution::clear_all) would discard.
    fn currently_loaded_names(&self) -> BTreeSet<String>;

    fn is_reloadable_name(&self, reference: Reference<'_>) -> bool;

    /// Tear down and rebuild every reloadable definition.
    fn clear_all(&self) -> Result<ReloadSummary, DependencyError>;

    /// Toggle diagnostic tracing on every loader.
    fn set_verbosity(&self, verbose: bool);

    /// Kept for older callers; the loaders install no hooks to remove.
    fn unhook(&self) {}
}

/// [`Resolution`] implemented by delegating to the main and once loaders.
#[derive(Debug, Clone)]
pub struct Dependencies {
    autoloaders: Arc<Autoloaders>,
    interlock: Arc<Interlock>,
}

impl Dependencies {
    pub fn new(autoloaders: Arc<Autoloaders>, interlock: Arc<Interlock>) -> Self {
        Self {
            autoloaders,
            interlock,
        }
    }

    pub fn autoloaders(&self) -> &Autoloaders {
        &self.autoloaders
    }

    pub fn interlock(&self) -> &Interlock {
        &self.interlock
    }

    fn lookup(&self, name: &str) -> Result<Handle, DependencyError> {
        for loader in self.autoloaders.iter() {
            match loader.resolve(name) {
                Ok(handle) => return Ok(handle),
                Err(LoadError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(DependencyError::Unresolved(name.to_string()))
    }
}

/// Strip a leading separator and check every segment.
fn normalize(name: &str) -> Option<&str> {
    let name = name.strip_prefix(SEPARATOR).unwrap_or(name);
    name.split(SEPARATOR)
        .all(is_valid_segment)
        .then_some(name)
}

impl Resolution for Dependencies {
    fn resolve(&self, name: &str) -> Result<Handle, DependencyError> {
        let normalized =
            normalize(name).ok_or_else(|| DependencyError::Unresolved(name.to_string()))?;
        self.interlock.loading(|| self.lookup(normalized))
    }

    fn safe_resolve(&self, name: &str) -> Option<Handle> {
        match self.resolve(name) {
            Ok(handle) => Some(handle),
            Err(DependencyError::Unresolved(_)) => None,
            Err(e) => {
                warn!(name = %name, error = %e, "failed to resolve name");
                None
            }
        }
    }

    fn currently_loaded_names(&self) -> BTreeSet<String> {
        self.autoloaders.main().unloadable_names().into_iter().collect()
    }

    fn is_reloadable_name(&self, reference: Reference<'_>) -> bool {
        let main = self.autoloaders.main();
        match reference {
            Reference::Name(name) => normalize(name).is_some_and(|n| main.is_unloadable(n)),
            Reference::Handle(handle) => main.reloading_enabled() && main.owns(handle),
        }
    }

    fn clear_all(&self) -> Result<ReloadSummary, DependencyError> {
        self.interlock
            .unloading(|| match self.autoloaders.main().reload() {
                Ok(summary) => Ok(summary),
                Err(LoadError::ReloadingDisabled(_)) => Err(DependencyError::ReloadingDisabled),
                Err(e) => Err(e.into()),
            })
    }

    fn set_verbosity(&self, verbose: bool) {
        for loader in self.autoloaders.iter() {
            loader.set_verbose(verbose);
        }
    }
}
