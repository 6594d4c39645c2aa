//! Configuration of the models and the engine run, read from an optional `assertflow.toml`.
//!
//! ```toml
//! [model]
//! strict = true
//!
//! [engine]
//! max_block_visits = 128
//! ```

use std::path::{Path, PathBuf};

use assertflow_ir::{DataflowOptions, DEFAULT_MAX_BLOCK_VISITS};
use assertflow_tracing::println_yellow_err;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = "assertflow.toml";

/// Options for [`CheckModel`](crate::check_model::CheckModel).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CheckModelConfig {
    /// Report calls which match the catalog but don't fit it as warnings rather than quietly.
    /// The abstract state is the same either way.
    pub strict: bool,
}

/// A finalized configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    pub model: CheckModelConfig,
    pub engine: DataflowOptions,
}

/// A direct mapping to an optional `assertflow.toml`.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ConfigOptions {
    pub model: Option<ModelOptions>,
    pub engine: Option<EngineOptions>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ModelOptions {
    pub strict: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct EngineOptions {
    pub max_block_visits: Option<usize>,
}

impl Config {
    /// Construct the set of configuration to be used from the given set of options.
    pub fn from_opts(opts: ConfigOptions) -> Result<Self, ConfigError> {
        let model = CheckModelConfig {
            strict: opts.model.and_then(|model| model.strict).unwrap_or(false),
        };
        let max_block_visits = opts
            .engine
            .and_then(|engine| engine.max_block_visits)
            .unwrap_or(DEFAULT_MAX_BLOCK_VISITS);
        if max_block_visits == 0 {
            return Err(ConfigError::InvalidValue {
                key: "engine.max_block_visits",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(Self {
            model,
            engine: DataflowOptions { max_block_visits },
        })
    }

    /// Read and finalize the config at `config_path`.
    pub fn from_file(config_path: PathBuf) -> Result<Self, ConfigError> {
        Self::from_opts(ConfigOptions::from_file(config_path)?)
    }

    /// Read and finalize the `assertflow.toml` in `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self, ConfigError> {
        Self::from_opts(ConfigOptions::from_dir(dir)?)
    }
}

impl ConfigOptions {
    /// Parse the contents of an `assertflow.toml`.  Unknown keys are reported and ignored.
    pub fn from_toml_str(config_str: &str) -> Result<Self, ConfigError> {
        let toml_de = toml::de::Deserializer::new(config_str);
        serde_ignored::deserialize(toml_de, |field| {
            let warning = format!(
                "  WARNING! found unusable configuration: {}",
                config_key(&field)
            );
            println_yellow_err(&warning);
        })
        .map_err(|err| ConfigError::Deserialize { err })
    }

    /// Given a path to an `assertflow.toml`, read and construct the `ConfigOptions`.
    pub fn from_file(config_path: PathBuf) -> Result<Self, ConfigError> {
        let config_str =
            std::fs::read_to_string(&config_path).map_err(|err| ConfigError::ReadConfig {
                path: config_path,
                err,
            })?;
        Self::from_toml_str(&config_str)
    }

    /// Read the `assertflow.toml` in `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let file_path = dir.join(CONFIG_FILE_NAME);
        if !file_path.is_file() {
            return Err(ConfigError::NotFound {
                dir: dir.to_path_buf(),
                file_name: CONFIG_FILE_NAME,
            });
        }
        Self::from_file(file_path)
    }
}

/// The dotted key of an ignored field, without the `?` hops through optional sections.
fn config_key(path: &serde_ignored::Path) -> String {
    use serde_ignored::Path;
    let (parent, segment) = match path {
        Path::Root => return String::new(),
        Path::Some { parent } | Path::NewtypeStruct { parent } | Path::NewtypeVariant { parent } => {
            return config_key(parent)
        }
        Path::Seq { parent, index } => (parent, index.to_string()),
        Path::Map { parent, key } => (parent, key.clone()),
    };
    let parent = config_key(parent);
    if parent.is_empty() {
        segment
    } else {
        format!("{parent}.{segment}")
    }
}
