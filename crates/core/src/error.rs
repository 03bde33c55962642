//! Error types for the pollkit answering service.
//!
//! This module defines a unified error enum covering all error categories
//! in the pipeline: configuration, I/O, input validation, retrieval,
//! generation, audit, and serialization.

use thiserror::Error;

/// Unified error type for the pollkit answering service.
///
/// All functions in the application return `Result<T, AppError>`.
/// We never panic — errors must be represented and propagated.
///
/// Retrieval errors are always recovered internally (the pipeline falls
/// back to the local index, then to an empty context); only
/// [`AppError::GenerationUnavailable`] and [`AppError::InvalidInput`]
/// are ever visible to a caller.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or empty question — rejected before any side effect
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A single retrieval tier failed; triggers fallback, never user-visible
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// A single generation backend failed; triggers fallback
    #[error("Generation error: {0}")]
    Generation(String),

    /// Both generation backends failed — surfaced to the caller
    #[error("No generation backend is available")]
    GenerationUnavailable,

    /// A backend call exceeded its deadline; treated as unavailability
    /// of that backend for fallback purposes
    #[error("Upstream timeout: {0}")]
    Timeout(String),

    /// Audit sink errors (fire-and-forget; logged, never propagated to callers)
    #[error("Audit error: {0}")]
    Audit(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unexpected errors caught at the outermost boundary
    #[error("Internal error: {0}")]
    Internal(String),
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
