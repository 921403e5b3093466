//! Module `commands`
//!
//! Turns a decoded control frame into a typed `Request`. Field values are
//! carried through as received; bounds and emptiness checks belong to the
//! dispatcher so that they surface as validation errors rather than protocol
//! errors.

use serde_json::Value;

use crate::error::CommandError;

/// A client request decoded from one control frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Register { login: String, password: String },
    Auth { login: String, password: String },
    Logout,
    List { path: String },
    Get { path: String },
    /// `size` is `None` when the field is absent or not a non-negative integer
    Put { path: String, size: Option<u64> },
    Delete { path: String },
    Move { source: String, destination: String },
}

impl Request {
    /// Command name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Register { .. } => "REGISTER",
            Request::Auth { .. } => "AUTH",
            Request::Logout => "LOGOUT",
            Request::List { .. } => "LIST",
            Request::Get { .. } => "GET",
            Request::Put { .. } => "PUT",
            Request::Delete { .. } => "DELETE",
            Request::Move { .. } => "MOVE",
        }
    }

    /// Whether the command needs an authenticated session.
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            Request::List { .. }
                | Request::Get { .. }
                | Request::Put { .. }
                | Request::Delete { .. }
                | Request::Move { .. }
        )
    }
}

/// Parses a control frame into a `Request`.
///
/// The command name is matched case-insensitively. Unknown names and frames
/// that are not JSON objects yield `CommandError::Protocol`.
pub fn parse_request(frame: &Value) -> Result<Request, CommandError> {
    let Some(fields) = frame.as_object() else {
        return Err(CommandError::Protocol(
            "Control frame must be a JSON object".into(),
        ));
    };

    let command = fields
        .get("command")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_ascii_uppercase();

    let text = |name: &str| -> String {
        fields
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    };

    let request = match command.as_str() {
        "REGISTER" => Request::Register {
            login: text("login"),
            password: text("password"),
        },
        "AUTH" => Request::Auth {
            login: text("login"),
            password: text("password"),
        },
        "LOGOUT" => Request::Logout,
        "LIST" => Request::List { path: text("path") },
        "GET" => Request::Get { path: text("path") },
        "PUT" => Request::Put {
            path: text("path"),
            size: fields.get("size").and_then(Value::as_u64),
        },
        "DELETE" => Request::Delete { path: text("path") },
        "MOVE" => Request::Move {
            source: text("source"),
            destination: text("destination"),
        },
        _ => return Err(CommandError::Protocol(format!("Unknown command: {command}"))),
    };

    Ok(request)
}
