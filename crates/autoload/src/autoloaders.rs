//! Startup: classify roots, configure the two loaders, hand out the context.

use std::sync::Arc;

use tracing::info;

use autoload_core::{AutoloadConfig, AutoloadPaths, CoreError, Inflector, LoaderGroup, RootDir};

use crate::dependencies::{Dependencies, Resolution};
use crate::interlock::Interlock;
use crate::loader::{Loader, Result};
use crate::materializer::Materializer;

/// The reloadable (`main`) and permanent (`once`) loaders.
#[derive(Debug)]
pub struct Autoloaders {
    main: Loader,
    once: Loader,
}

impl Autoloaders {
    pub fn main(&self) -> &Loader {
        &self.main
    }

    pub fn once(&self) -> &Loader {
        &self.once
    }

    /// Both loaders, main first.
    pub fn iter(&self) -> impl Iterator<Item = &Loader> {
        [&self.main, &self.once].into_iter()
    }

    pub fn for_group(&self, group: LoaderGroup) -> &Loader {
        match group {
            LoaderGroup::Main => &self.main,
            LoaderGroup::Once => &self.once,
        }
    }
}

/// Everything the host configures before [`take_over`].
///
/// The paths and the inflector are frozen by a successful `take_over`; after
/// that [`paths_mut`](Bootstrap::paths_mut) and
/// [`inflector_mut`](Bootstrap::inflector_mut) fail with [`CoreError::Frozen`].
#[derive(Debug, Clone)]
pub struct Bootstrap {
    paths: AutoloadPaths,
    inflector: Inflector,
    pub enable_reloading: bool,
    pub extensions: Vec<String>,
    pub verbose: bool,
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self {
            paths: AutoloadPaths::new(),
            inflector: Inflector::new(),
            enable_reloading: true,
            extensions: vec!["yml".into(), "yaml".into()],
            verbose: false,
        }
    }
}

impl Bootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AutoloadConfig) -> Result<Self> {
        Ok(Self {
            paths: config.autoload_paths()?,
            inflector: config.inflector()?,
            enable_reloading: config.enable_reloading,
            extensions: config.extensions.clone(),
            verbose: config.verbose,
        })
    }

    pub fn paths(&self) -> &AutoloadPaths {
        &self.paths
    }

    pub fn paths_mut(&mut self) -> autoload_core::Result<&mut AutoloadPaths> {
        if self.paths.is_frozen() {
            return Err(CoreError::Frozen {
                what: "autoload paths",
            });
        }
        Ok(&mut self.paths)
    }

    pub fn inflector(&self) -> &Inflector {
        &self.inflector
    }

    pub fn inflector_mut(&mut self) -> autoload_core::Result<&mut Inflector> {
        if self.inflector.is_frozen() {
            return Err(CoreError::Frozen {
                what: "inflection overrides",
            });
        }
        Ok(&mut self.inflector)
    }

    /// Whether `take_over` has consumed this bootstrap.
    pub fn is_frozen(&self) -> bool {
        self.paths.is_frozen()
    }
}

/// State shared by every component, built once at startup.
#[derive(Debug, Clone)]
pub struct Context {
    roots: Arc<Vec<RootDir>>,
    inflector: Arc<Inflector>,
    autoloaders: Arc<Autoloaders>,
    interlock: Arc<Interlock>,
    dependencies: Dependencies,
}

impl Context {
    /// Root directories that survived classification, in configuration order.
    pub fn roots(&self) -> &[RootDir] {
        &self.roots
    }

    pub fn inflector(&self) -> &Inflector {
        &self.inflector
    }

    pub fn autoloaders(&self) -> &Arc<Autoloaders> {
        &self.autoloaders
    }

    pub fn interlock(&self) -> &Arc<Interlock> {
        &self.interlock
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    /// The resolution API as a trait object.
    pub fn resolution(&self) -> &dyn Resolution {
        &self.dependencies
    }
}

/// Configure both loaders from `bootstrap`, set them up, and freeze the
/// configuration.
///
/// Roots are classified first: missing directories are dropped, roots listed
/// as once-only go to the `once` loader, the rest to `main`. Each loader
/// ignores the other loader's roots so nested roots are never claimed twice.
/// Only `main` has reloading enabled, and only if `bootstrap` asks for it.
pub fn take_over(bootstrap: &mut Bootstrap, materializer: Arc<dyn Materializer>) -> Result<Context> {
    if bootstrap.paths.is_frozen() {
        return Err(CoreError::Frozen {
            what: "autoload paths",
        }
        .into());
    }

    let inflector = Arc::new(bootstrap.inflector.clone());
    let roots = bootstrap.paths.classify();

    let new_loader = |tag| {
        Loader::new(tag, Arc::clone(&inflector), Arc::clone(&materializer))
            .with_extensions(bootstrap.extensions.iter().cloned())
    };
    let mut main = new_loader("main");
    let mut once = new_loader("once");

    for root in &roots {
        let (owner, other) = match root.group {
            LoaderGroup::Main => (&mut main, &mut once),
            LoaderGroup::Once => (&mut once, &mut main),
        };
        owner.push_dir(&root.path)?;
        if !root.eager {
            owner.do_not_eager_load(&root.path)?;
        }
        other.ignore(&root.path)?;
    }

    if bootstrap.enable_reloading {
        main.enable_reloading()?;
    }

    main.set_verbose(bootstrap.verbose);
    once.set_verbose(bootstrap.verbose);
    main.setup()?;
    once.setup()?;

    bootstrap.paths.freeze();
    bootstrap.inflector.freeze();

    info!(
        main_roots = main.roots().len(),
        once_roots = once.roots().len(),
        reloading = bootstrap.enable_reloading,
        "autoloaders took over"
    );

    let autoloaders = Arc::new(Autoloaders { main, once });
    let interlock = Arc::new(Interlock::new());
    let dependencies = Dependencies::new(Arc::clone(&autoloaders), Arc::clone(&interlock));

    Ok(Context {
        roots: Arc::new(roots),
        inflector,
        autoloaders,
        interlock,
        dependencies,
    })
}
