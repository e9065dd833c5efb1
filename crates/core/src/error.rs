use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config error: {0}")]
    Config(String),

    /// A list or table was mutated after the loaders captured it.
    #[error("can't modify frozen {what}: the autoloaders have already been set up")]
    Frozen { what: &'static str },
}

pub type Result<T> = std::result::Result<T, CoreError>;
