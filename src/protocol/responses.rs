//! Response frames
//!
//! Every reply is a control frame of shape `{status: "OK", data: {...}}` or
//! `{status: "ERROR", message: "..."}`.

use serde::Serialize;
use serde_json::{Value, json};

use crate::storage::StoredEntry;

/// A response control frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "UPPERCASE")]
pub enum Response {
    Ok { data: Value },
    Error { message: String },
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Response::Ok { data }
    }

    /// Success carrying only a human-readable message.
    pub fn message(message: &str) -> Self {
        Response::ok(json!({ "message": message }))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }

    pub fn registered(user_id: &str) -> Self {
        Response::ok(json!({ "message": "User registered", "uuid": user_id }))
    }

    pub fn listing(entries: &[StoredEntry]) -> Self {
        Response::ok(json!({ "files": entries }))
    }

    /// Metadata frame that precedes a GET data frame.
    pub fn download(filename: &str, size: u64) -> Self {
        Response::ok(json!({ "filename": filename, "size": size }))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::EntryKind;

    #[test]
    fn test_ok_shape() {
        let value = serde_json::to_value(Response::message("Logged out")).unwrap();
        assert_eq!(value, json!({"status": "OK", "data": {"message": "Logged out"}}));
    }

    #[test]
    fn test_error_shape() {
        let value = serde_json::to_value(Response::error("Not found")).unwrap();
        assert_eq!(value, json!({"status": "ERROR", "message": "Not found"}));
    }

    #[test]
    fn test_listing_shape() {
        let entries = vec![StoredEntry {
            name: "b.txt".into(),
            kind: EntryKind::File,
            size: 5,
        }];
        let value = serde_json::to_value(Response::listing(&entries)).unwrap();
        assert_eq!(
            value,
            json!({"status": "OK", "data": {"files": [{"name": "b.txt", "type": "file", "size": 5}]}})
        );
    }
}
