//! Error types
//!
//! Defines domain-specific error types for each module of the store server.

use std::io;
use thiserror::Error;

/// Framing and socket errors. Always fatal to the connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("stream ended in the middle of a frame")]
    UnexpectedEof,

    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("malformed control frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    #[error("data frame size mismatch: announced {expected}, prefix {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("read timed out")]
    Timeout,
}

/// Storage engine errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("path escapes user root: {0}")]
    PathTraversal(String),

    #[error("malformed path: {0}")]
    MalformedPath(String),

    #[error("path of {length} characters exceeds maximum of {max}")]
    PathTooLong { length: usize, max: usize },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("file of {size} bytes exceeds maximum of {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("operation not permitted on the user root")]
    RootOperation,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Credential store errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("login already taken: {0}")]
    LoginTaken(String),

    #[error("invalid login or password")]
    InvalidCredentials,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("credential store failure: {0}")]
    Store(String),
}

impl From<io::Error> for AuthError {
    fn from(error: io::Error) -> Self {
        AuthError::Store(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        AuthError::Store(error.to_string())
    }
}

/// Outcome of a failed command, as seen by the dispatcher
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Startup failures of the server itself
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("credential store error: {0}")]
    Auth(#[from] AuthError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
