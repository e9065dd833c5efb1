//! Root directory lists and their classification into loader groups.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};

/// Which loader owns a root directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderGroup {
    /// Reloadable loader.
    Main,
    /// Permanent loader; its definitions survive every reload.
    Once,
}

impl fmt::Display for LoaderGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderGroup::Main => write!(f, "main"),
            LoaderGroup::Once => write!(f, "once"),
        }
    }
}

/// Policy tag of a classified root directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    Eager,
    LazyReloadable,
    LazyOnce,
}

/// A root directory that survived classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootDir {
    pub path: PathBuf,
    pub group: LoaderGroup,
    /// Eager loading is orthogonal to the group: a once root may be eager too.
    pub eager: bool,
}

impl RootDir {
    pub fn policy(&self) -> Policy {
        match (self.group, self.eager) {
            (LoaderGroup::Once, _) => Policy::LazyOnce,
            (LoaderGroup::Main, true) => Policy::Eager,
            (LoaderGroup::Main, false) => Policy::LazyReloadable,
        }
    }
}

/// An ordered list of directories that can be frozen.
#[derive(Debug, Clone, Default)]
pub struct PathList {
    what: &'static str,
    paths: Vec<PathBuf>,
    frozen: bool,
}

impl PathList {
    pub fn new(what: &'static str) -> Self {
        Self {
            what,
            paths: Vec::new(),
            frozen: false,
        }
    }

    pub fn push(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        self.ensure_mutable()?;
        self.paths.push(path.into());
        Ok(())
    }

    pub fn extend<I, P>(&mut self, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.ensure_mutable()?;
        self.paths.extend(paths.into_iter().map(Into::into));
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.ensure_mutable()?;
        self.paths.clear();
        Ok(())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.frozen {
            return Err(CoreError::Frozen { what: self.what });
        }
        Ok(())
    }
}

/// The three configured path collections.
///
/// `autoload` lists every root; `once` and `eager` name subsets of it. The
/// lists are only reachable mutably through the `*_mut` accessors, which
/// fail once the collection is frozen.
#[derive(Debug, Clone)]
pub struct AutoloadPaths {
    autoload: PathList,
    once: PathList,
    eager: PathList,
    frozen: bool,
}

impl Default for AutoloadPaths {
    fn default() -> Self {
        Self {
            autoload: PathList::new("autoload_paths"),
            once: PathList::new("autoload_once_paths"),
            eager: PathList::new("eager_load_paths"),
            frozen: false,
        }
    }
}

impl AutoloadPaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn autoload(&self) -> &PathList {
        &self.autoload
    }

    pub fn once(&self) -> &PathList {
        &self.once
    }

    pub fn eager(&self) -> &PathList {
        &self.eager
    }

    pub fn autoload_mut(&mut self) -> Result<&mut PathList> {
        self.ensure_mutable()?;
        Ok(&mut self.autoload)
    }

    pub fn once_mut(&mut self) -> Result<&mut PathList> {
        self.ensure_mutable()?;
        Ok(&mut self.once)
    }

    pub fn eager_mut(&mut self) -> Result<&mut PathList> {
        self.ensure_mutable()?;
        Ok(&mut self.eager)
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.frozen {
            return Err(CoreError::Frozen {
                what: "autoload paths",
            });
        }
        Ok(())
    }

    /// Assign every existing root directory to exactly one loader group.
    ///
    /// Entries that do not exist as directories are dropped; the order of
    /// `autoload` is preserved.
    pub fn classify(&self) -> Vec<RootDir> {
        let mut roots: Vec<RootDir> = Vec::with_capacity(self.autoload.len());
        for path in self.autoload.iter() {
            if !path.is_dir() {
                debug!(path = %path.display(), "skipping autoload path: not a directory");
                continue;
            }
            if roots.iter().any(|r| r.path == path) {
                continue;
            }
            let group = if self.once.contains(path) {
                LoaderGroup::Once
            } else {
                LoaderGroup::Main
            };
            roots.push(RootDir {
                path: path.to_path_buf(),
                group,
                eager: self.eager.contains(path),
            });
        }
        roots
    }

    pub fn freeze(&mut self) {
        self.autoload.freeze();
        self.once.freeze();
        self.eager.freeze();
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}
