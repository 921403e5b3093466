//! Request field validation
//!
//! Performs input sanitation before any credential or storage work is done.

use crate::error::CommandError;

/// Trims `value` and checks it is present and within `max_length` characters.
pub fn validate_required(
    value: &str,
    field: &str,
    max_length: Option<usize>,
) -> Result<String, CommandError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CommandError::Validation(format!("{field} is required")));
    }

    if let Some(max) = max_length {
        if trimmed.chars().count() > max {
            return Err(CommandError::Validation(format!(
                "{field} is too long (maximum {max} characters)"
            )));
        }
    }

    Ok(trimmed.to_string())
}

pub fn validate_login(login: &str, max_length: usize) -> Result<String, CommandError> {
    let login = validate_required(login, "Login", Some(max_length))?;
    if login.contains(['\r', '\n', '\0']) {
        return Err(CommandError::Validation(
            "Login contains invalid characters".into(),
        ));
    }
    Ok(login)
}

/// Passwords are taken verbatim, never trimmed.
pub fn validate_password(password: &str, min_length: usize) -> Result<(), CommandError> {
    if password.chars().count() < min_length {
        return Err(CommandError::Validation(format!(
            "Password must be at least {min_length} characters"
        )));
    }
    Ok(())
}

pub fn validate_path(path: &str, field: &str, max_length: usize) -> Result<String, CommandError> {
    validate_required(path, field, Some(max_length))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(err: CommandError) -> String {
        match err {
            CommandError::Validation(msg) => msg,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_required_trims() {
        assert_eq!(validate_required("  a/b ", "Path", Some(10)).unwrap(), "a/b");
    }

    #[test]
    fn test_required_empty() {
        let err = validate_required("   ", "Path", None).unwrap_err();
        assert_eq!(message(err), "Path is required");
    }

    #[test]
    fn test_login_too_long() {
        let err = validate_login(&"x".repeat(51), 50).unwrap_err();
        assert_eq!(message(err), "Login is too long (maximum 50 characters)");
    }

    #[test]
    fn test_login_control_characters() {
        assert!(validate_login("ali\nce", 50).is_err());
    }

    #[test]
    fn test_password_minimum() {
        assert!(validate_password("12345", 6).is_err());
        assert!(validate_password("123456", 6).is_ok());
        assert!(validate_password("", 1).is_err());
    }
}
