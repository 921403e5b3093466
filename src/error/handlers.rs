//! Error handlers
//!
//! Translates command errors into the text shown to clients. Nothing that
//! reveals the server's filesystem layout may leave this module.

use crate::error::types::{AuthError, CommandError, StorageError};
use log::error;

pub const INTERNAL_ERROR: &str = "Internal server error";
pub const INVALID_PATH: &str = "Invalid path";

/// Convert error to the message placed in an ERROR response
pub fn client_message(err: &CommandError) -> String {
    match err {
        CommandError::Protocol(msg) => msg.clone(),
        CommandError::Unauthorized => "Authentication required".into(),
        CommandError::Validation(msg) => msg.clone(),
        CommandError::Storage(e) => storage_message(e),
        CommandError::Auth(e) => auth_message(e),
        CommandError::Transport(_) => INTERNAL_ERROR.into(),
    }
}

fn storage_message(err: &StorageError) -> String {
    match err {
        StorageError::PathTraversal(_) | StorageError::MalformedPath(_) => INVALID_PATH.into(),
        StorageError::PathTooLong { max, .. } => {
            format!("Path is too long (maximum {max} characters)")
        }
        StorageError::NotFound(_) => "Not found".into(),
        StorageError::AlreadyExists(_) => "Destination already exists".into(),
        StorageError::FileTooLarge { max, .. } => {
            format!("File is too large (maximum {max} bytes)")
        }
        StorageError::RootOperation => "Operation not permitted on the root directory".into(),
        StorageError::Io(e) => {
            error!("Storage failure: {}", e);
            INTERNAL_ERROR.into()
        }
    }
}

fn auth_message(err: &AuthError) -> String {
    match err {
        AuthError::LoginTaken(_) => "Login is already taken".into(),
        AuthError::InvalidCredentials => "Invalid login or password".into(),
        AuthError::Hashing(e) | AuthError::Store(e) => {
            error!("Credential store failure: {}", e);
            INTERNAL_ERROR.into()
        }
    }
}
