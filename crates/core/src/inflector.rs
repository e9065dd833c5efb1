//! Path segment → symbolic name segment translation.
//!
//! The override table is consulted first; anything it does not cover goes
//! through the default upper-camel-case policy (`admin_user` → `AdminUser`).
//! Overrides are registered during bootstrap and the table is frozen before
//! the loaders start scanning.

use std::collections::HashMap;
use std::path::Path;

use heck::ToUpperCamelCase;

use crate::error::{CoreError, Result};

/// Name translator with an exception table for acronyms and the like.
#[derive(Debug, Clone, Default)]
pub struct Inflector {
    overrides: HashMap<String, String>,
    frozen: bool,
}

impl Inflector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge override entries into the table.
    ///
    /// Later entries for the same segment replace earlier ones. Fails once the
    /// table has been frozen.
    pub fn inflect<I, K, V>(&mut self, overrides: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        if self.frozen {
            return Err(CoreError::Frozen {
                what: "inflection overrides",
            });
        }
        self.overrides
            .extend(overrides.into_iter().map(|(k, v)| (k.into(), v.into())));
        Ok(())
    }

    /// Translate one path segment.
    ///
    /// `basename` is the file stem or directory name; `_abspath` is the full
    /// path of the entry, available to policies that need it.
    pub fn camelize(&self, basename: &str, _abspath: &Path) -> String {
        match self.overrides.get(basename) {
            Some(name) => name.clone(),
            None => default_camelize(basename),
        }
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn overrides(&self) -> &HashMap<String, String> {
        &self.overrides
    }
}

/// The default derivation rule: upper camel case.
pub fn default_camelize(basename: &str) -> String {
    basename.to_upper_camel_case()
}

/// Whether `segment` can be used as one segment of a symbolic name.
pub fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
