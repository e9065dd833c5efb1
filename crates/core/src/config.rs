use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::inflector::Inflector;
use crate::paths::AutoloadPaths;


/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_bool(key: &str) -> Option<bool> {
    env_opt(key).and_then(|v| match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}

fn env_paths(key: &str) -> Option<Vec<PathBuf>> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(|v| env::split_paths(&v).collect())
}

// ── Top-level config ──────────────────────────────────────────

/// Startup configuration of the autoloading engine.
///
/// Parsed from `autoload.toml`, then adjusted by `AUTOLOAD_*` environment
/// variables. Relative paths are resolved against `root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoloadConfig {
    /// Base directory for relative paths.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Whether the main loader may tear down and rebuild its definitions.
    /// Fixed at startup.
    #[serde(default = "default_enable_reloading")]
    pub enable_reloading: bool,

    /// Emit autoload/unload diagnostics at `info` level.
    #[serde(default)]
    pub verbose: bool,

    /// File extensions (without the dot) that define symbolic names.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Every root directory, in lookup order.
    #[serde(default)]
    pub autoload_paths: Vec<PathBuf>,

    /// Roots owned by the permanent loader. Subset of `autoload_paths`.
    #[serde(default)]
    pub autoload_once_paths: Vec<PathBuf>,

    /// Roots materialized at setup. Subset of `autoload_paths`.
    #[serde(default)]
    pub eager_load_paths: Vec<PathBuf>,

    /// Path segment → symbolic segment overrides.
    #[serde(default)]
    pub inflections: BTreeMap<String, String>,

    #[serde(default)]
    pub watch: WatchConfig,
}

/// File watcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// How often pending changes are checked, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_enable_reloading() -> bool {
    true
}

fn default_extensions() -> Vec<String> {
    vec!["yml".into(), "yaml".into()]
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for AutoloadConfig {
    fn default() -> Self {
        Self::local()
    }
}

// ── Loading & Validation ────────────────────────────────────────────

impl AutoloadConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    ///
    /// A relative `root` is resolved against the file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        if config.root.is_relative() {
            if let Some(parent) = path.parent() {
                config.root = parent.join(&config.root);
            }
        }
        Ok(config)
    }

    /// Defaults with no roots, adjusted by the environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::local();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Empty configuration rooted at the current directory.
    pub fn local() -> Self {
        Self {
            root: default_root(),
            enable_reloading: default_enable_reloading(),
            verbose: false,
            extensions: default_extensions(),
            autoload_paths: Vec::new(),
            autoload_once_paths: Vec::new(),
            eager_load_paths: Vec::new(),
            inflections: BTreeMap::new(),
            watch: WatchConfig::default(),
        }
    }

    /// Resolve a configured path against `root`.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Build the (still mutable) path lists from this config.
    pub fn autoload_paths(&self) -> Result<AutoloadPaths> {
        let mut paths = AutoloadPaths::new();
        paths
            .autoload_mut()?
            .extend(self.autoload_paths.iter().map(|p| self.resolve_path(p)))?;
        paths
            .once_mut()?
            .extend(self.autoload_once_paths.iter().map(|p| self.resolve_path(p)))?;
        paths
            .eager_mut()?
            .extend(self.eager_load_paths.iter().map(|p| self.resolve_path(p)))?;
        Ok(paths)
    }

    /// Build the (still mutable) name translator from `inflections`.
    pub fn inflector(&self) -> Result<Inflector> {
        let mut inflector = Inflector::new();
        inflector.inflect(self.inflections.clone())?;
        Ok(inflector)
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Autoload config:");
        tracing::info!("  root:        {}", self.root.display());
        tracing::info!("  reloading:   {}", if self.enable_reloading { "enabled" } else { "disabled" });
        tracing::info!("  extensions:  {}", self.extensions.join(", "));
        tracing::info!(
            "  paths:       {} autoload, {} once, {} eager",
            self.autoload_paths.len(),
            self.autoload_once_paths.len(),
            self.eager_load_paths.len()
        );
        tracing::info!("  inflections: {}", self.inflections.len());
    }

    /// Summary suitable for machine-readable reports.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "root": self.root,
            "enable_reloading": self.enable_reloading,
            "extensions": self.extensions,
            "autoload_paths": self.autoload_paths,
            "autoload_once_paths": self.autoload_once_paths,
            "eager_load_paths": self.eager_load_paths,
            "inflections": self.inflections,
        })
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply environment variable overrides.
    ///
    /// - `AUTOLOAD_ROOT` -> `root`
    /// - `AUTOLOAD_ENABLE_RELOADING` -> `enable_reloading`
    /// - `AUTOLOAD_VERBOSE` -> `verbose`
    /// - `AUTOLOAD_PATHS` -> `autoload_paths` (platform path-list syntax)
    /// - `AUTOLOAD_ONCE_PATHS` -> `autoload_once_paths`
    /// - `AUTOLOAD_EAGER_PATHS` -> `eager_load_paths`
    /// - `AUTOLOAD_WATCH_INTERVAL_MS` -> `watch.poll_interval_ms`
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Some(v) = env_opt("AUTOLOAD_ROOT") {
            self.root = PathBuf::from(v);
        }
        if let Some(v) = env_bool("AUTOLOAD_ENABLE_RELOADING") {
            self.enable_reloading = v;
        }
        if let Some(v) = env_bool("AUTOLOAD_VERBOSE") {
            self.verbose = v;
        }
        if let Some(v) = env_paths("AUTOLOAD_PATHS") {
            self.autoload_paths = v;
        }
        if let Some(v) = env_paths("AUTOLOAD_ONCE_PATHS") {
            self.autoload_once_paths = v;
        }
        if let Some(v) = env_paths("AUTOLOAD_EAGER_PATHS") {
            self.eager_load_paths = v;
        }
        if let Some(v) = env_opt("AUTOLOAD_WATCH_INTERVAL_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                self.watch.poll_interval_ms = ms;
            }
        }
    }

    /// Validate the config: extensions, subset relations, inflection keys.
    pub fn validate(&self) -> Result<()> {
        self.validate_extensions()?;
        self.validate_subsets()?;
        self.validate_inflections()?;
        if self.watch.poll_interval_ms == 0 {
            return Err(CoreError::Config(
                "watch.poll_interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    fn validate_extensions(&self) -> Result<()> {
        if self.extensions.is_empty() {
            return Err(CoreError::Config("extensions must not be empty".into()));
        }
        for ext in &self.extensions {
            if ext.is_empty() || ext.starts_with('.') || ext.contains(['/', '\\']) {
                return Err(CoreError::Config(format!(
                    "invalid extension '{ext}', expected a bare extension like 'yml'"
                )));
            }
        }
        Ok(())
    }

    fn validate_subsets(&self) -> Result<()> {
        let listed = |path: &PathBuf| self.autoload_paths.iter().any(|p| p == path);
        for path in &self.autoload_once_paths {
            if !listed(path) {
                return Err(CoreError::Config(format!(
                    "autoload_once_paths entry '{}' is not listed in autoload_paths",
                    path.display()
                )));
            }
        }
        for path in &self.eager_load_paths {
            if !listed(path) {
                return Err(CoreError::Config(format!(
                    "eager_load_paths entry '{}' is not listed in autoload_paths",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    fn validate_inflections(&self) -> Result<()> {
        for (segment, name) in &self.inflections {
            if segment.is_empty() || name.is_empty() {
                return Err(CoreError::Config(format!(
                    "inflection '{segment}' -> '{name}' must have non-empty sides"
                )));
            }
        }
        Ok(())
    }
}
