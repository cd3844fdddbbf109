//! Error types shared by the Yelp ETL crates

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, YelpError>;

/// Main error type for shared functionality
#[derive(Error, Debug)]
pub enum YelpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl YelpError {
    /// Create a configuration error for an environment variable that failed to parse
    pub fn invalid_env(name: &str, value: &str) -> Self {
        Self::Config(format!("{} has an invalid value: '{}'", name, value))
    }
}
