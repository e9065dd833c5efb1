pub mod config;
pub mod error;
pub mod inflector;
pub mod paths;

pub use config::{load_dotenv, AutoloadConfig, WatchConfig};
pub use error::*;
pub use inflector::Inflector;
pub use paths::{AutoloadPaths, LoaderGroup, PathList, Policy, RootDir};
