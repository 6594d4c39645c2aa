//! Flow-fact models for the assertflow dataflow engine.
//!
//! [`CheckModel`] teaches the engine about fatal-assertion calls: once such a call returns, its
//! condition holds on every path through it.

pub mod catalog;
pub mod check_model;
pub mod config;
pub mod error;
pub mod extractor;
pub mod locator;
pub mod report;

pub use catalog::{CallPatternCatalog, CallVariant, CheckKind};
pub use check_model::CheckModel;
pub use config::{CheckModelConfig, Config, ConfigOptions, CONFIG_FILE_NAME};
pub use error::ConfigError;
pub use report::{analyze_function, analyze_module, FunctionReport, Truth};
