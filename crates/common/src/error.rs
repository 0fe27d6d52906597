//! Common error types for the Golem monitoring components.

use std::fmt;

/// A specialized Result type for monitoring operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for monitoring operations.
///
/// Probe failures are not represented here: a failed probe is data, not an
/// error, and never travels through this type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid check definition: {0}")]
    InvalidDefinition(String),

    #[error("check not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new invalid-definition error.
    pub fn invalid(msg: impl fmt::Display) -> Self {
        Error::InvalidDefinition(msg.to_string())
    }

    /// Create a new not-found error.
    pub fn not_found(what: impl fmt::Display) -> Self {
        Error::NotFound(what.to_string())
    }

    /// Create a new storage error.
    pub fn storage(msg: impl fmt::Display) -> Self {
        Error::Storage(msg.to_string())
    }

    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new other error.
    pub fn other(msg: impl fmt::Display) -> Self {
        Error::Other(msg.to_string())
    }

    /// Stable machine-readable kind, used by the API layer.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidDefinition(_) => "invalid_definition",
            Error::NotFound(_) => "not_found",
            Error::Storage(_) | Error::Io(_) | Error::Yaml(_) => "storage",
            Error::Config(_) => "config",
            Error::Serialization(_) => "serialization",
            Error::Other(_) => "internal",
        }
    }
}
