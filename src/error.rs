//! Error types for buildscope

use thiserror::Error;

/// Errors that can occur while ingesting compiler diagnostics
#[derive(Error, Debug)]
pub enum ParseError {
    /// Reading the underlying stream failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The optimization record stream could not be framed as YAML documents
    #[error("Failed to read optimization record stream: {0}")]
    RecordStream(String),

    /// Configuration document is invalid
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for buildscope operations
pub type Result<T> = std::result::Result<T, ParseError>;
