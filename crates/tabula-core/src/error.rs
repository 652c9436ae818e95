//! Error types for Tabula

use thiserror::Error;

/// Core error type for Tabula operations
#[derive(Error, Debug)]
pub enum TabulaError {
    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Tabula operations
pub type Result<T> = std::result::Result<T, TabulaError>;
