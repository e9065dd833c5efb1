//! On-demand definition loading with safe reload.
//!
//! This crate provides:
//! - Root directory classification into a reloadable (`main`) and a permanent
//!   (`once`) loader, with optional eager loading per root
//! - Lazy path → symbolic name mapping with an override table
//! - Reload cycles that run teardown hooks under a process-wide interlock
//! - The legacy resolution API as an explicit facade ([`Dependencies`])
//! - A `notify` watcher that schedules reloads after source changes

pub mod autoloaders;
pub mod definition;
pub mod dependencies;
pub mod interlock;
pub mod loader;
pub mod materializer;
pub mod watcher;

pub use autoloaders::{take_over, Autoloaders, Bootstrap, Context};
pub use definition::{same_definition, Definition, Handle, LoadedDefinition, Namespace};
pub use dependencies::{Dependencies, DependencyError, Reference, Resolution};
pub use interlock::Interlock;
pub use loader::{LoadError, Loader, ReloadSummary};
pub use materializer::{Document, MaterializeError, Materializer, YamlMaterializer};
pub use watcher::ReloadWatcher;
