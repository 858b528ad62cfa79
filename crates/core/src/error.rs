//! Error types for pitchsim.
//!
//! One enum covers every failure category of the knowledge pipeline:
//! configuration, I/O, the embedding provider, the vector storage engine
//! and serialization.

use thiserror::Error;

/// Unified error type for pitchsim.
///
/// Library functions return `Result<T, AppError>`. Nothing in the knowledge
/// pipeline is fatal to the process: callers decide whether to surface or
/// absorb an error.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing credentials, invalid config files or invalid options
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding provider errors (network, auth, rate limit, bad response)
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector storage errors (connect, create, drop, open, search)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
