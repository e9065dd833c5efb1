//! Filesystem-backed loaders with on-demand materialization and reload.
//!
//! A [`Loader`] scans its root directories into an index of symbolic names
//! (`admin/user.yml` → `Admin::User`), materializes entries on first lookup,
//! and, when reloading is enabled, tears everything down and rescans on
//! [`Loader::reload`].

mod core;
mod error;
mod reload;
mod scan;

#[cfg(test)]
mod tests;

pub use self::core::Loader;
pub use self::error::{LoadError, ReloadSummary, Result};
pub use self::scan::SEPARATOR;
