use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path:?}: {err}")]
    ReadConfig { path: PathBuf, err: io::Error },
    #[error("failed to deserialize config: {err}")]
    Deserialize { err: toml::de::Error },
    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: &'static str, reason: String },
    #[error("could not find `{file_name}` in {dir:?}")]
    NotFound { dir: PathBuf, file_name: &'static str },
}
