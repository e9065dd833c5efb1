//! Turning a file into a live definition.

use std::any::Any;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::definition::{Definition, Handle};

/// Error type materializers report; wrapped into
/// [`LoadError::Materialize`](crate::LoadError::Materialize) by the loader.
pub type MaterializeError = Box<dyn std::error::Error + Send + Sync>;

/// Builds the definition behind a symbolic name.
///
/// Called with the loader's state locked: implementations must not resolve
/// other names through the engine.
pub trait Materializer: Send + Sync {
    fn materialize(&self, name: &str, path: &Path) -> Result<Handle, MaterializeError>;
}

impl<F> Materializer for F
where
    F: Fn(&str, &Path) -> Result<Handle, MaterializeError> + Send + Sync,
{
    fn materialize(&self, name: &str, path: &Path) -> Result<Handle, MaterializeError> {
        self(name, path)
    }
}

/// A YAML file parsed into a value tree.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub path: PathBuf,
    pub value: serde_yaml::Value,
}

impl Definition for Document {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Materializes every file as a [`Document`].
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlMaterializer;

impl Materializer for YamlMaterializer {
    fn materialize(&self, name: &str, path: &Path) -> Result<Handle, MaterializeError> {
        let contents = fs::read_to_string(path)?;
        let value: serde_yaml::Value = serde_yaml::from_str(&contents)?;
        Ok(Arc::new(Document {
            name: name.to_string(),
            path: path.to_path_buf(),
            value,
        }))
    }
}
