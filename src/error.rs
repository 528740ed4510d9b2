//! Error types.

use crate::destination::Category;
use thiserror::Error;

/// Errors that abort an optimization run.
#[derive(Debug, Error, PartialEq)]
pub enum OptimizerError {
    /// The catalog cannot fill every slot of the category pattern.
    #[error(
        "insufficient catalog: category {category} needs {required} destinations, {available} available (short by {})",
        .required - .available
    )]
    InsufficientCatalog {
        category: Category,
        required: usize,
        available: usize,
    },
    /// The run configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<ConfigError> for OptimizerError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid(reason) => OptimizerError::InvalidConfig(reason),
            other => OptimizerError::InvalidConfig(other.to_string()),
        }
    }
}

/// A single failed routing-service call.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("routing request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("routing service returned status {0}")]
    Status(u16),
    #[error("no route found: {0}")]
    NoRoute(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid pair key '{0}'")]
    InvalidKey(String),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed catalog CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("catalog line {line}: {reason}")]
    InvalidRow { line: usize, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
