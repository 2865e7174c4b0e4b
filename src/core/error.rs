/// Error Module
///
/// This module defines the error types used across the crate. It provides
/// structured error handling with proper error propagation and readable
/// error messages.
use thiserror::Error;

/// Error type covering every failure the crate can produce:
/// - Database operations (connection, statements, binding)
/// - Statement construction and result fetching
/// - Configuration loading and lookup
/// - Schema introspection
#[derive(Error, Debug)]
pub enum LitequeryError {
    /// Errors raised by the underlying SQLite driver
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Statement construction and result handling errors
    #[error("Query error: {0}")]
    Query(String),

    /// Configuration loading and lookup errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Schema introspection errors (unknown tables, missing keys)
    #[error("Schema error: {0}")]
    Schema(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Row deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic application errors for unexpected conditions
    #[error("Application error: {0}")]
    App(String),
}

/// Type alias for Result to use LitequeryError as the error type.
///
/// This provides a consistent error type across the entire crate
/// instead of using `Result<T, String>` or mixed error types.
pub type Result<T> = std::result::Result<T, LitequeryError>;
