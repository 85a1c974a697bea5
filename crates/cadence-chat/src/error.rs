//! Error types for cadence-chat

use thiserror::Error;

/// Result type alias using cadence-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the chat engine's public API.
///
/// Failures of an in-flight stream never show up here: they end the session
/// and are rendered as an error message instead.
#[derive(Error, Debug)]
pub enum Error {
    /// The prompt was rejected before sending
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid engine configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The engine task is no longer running
    #[error("Chat engine has shut down")]
    EngineClosed,
}
