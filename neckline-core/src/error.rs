//! Error types for Neckline

use thiserror::Error;

/// Main error type for Neckline
#[derive(Error, Debug)]
pub enum Error {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Terminal failures of a mesh or image load.
///
/// Every variant moves the overlay back to the empty state; recoverable
/// problems inside an otherwise readable asset are reported through
/// [`crate::obj::LoadReport`] instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Asset produced no renderable geometry")]
    Empty,

    #[error("Mesh needs {count} distinct vertices, more than the 16-bit index limit of {limit}")]
    TooManyVertices { count: usize, limit: usize },

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to read asset: {0}")]
    Io(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

/// Result type alias for Neckline operations
pub type Result<T> = std::result::Result<T, Error>;
