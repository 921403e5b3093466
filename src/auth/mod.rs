//! Authentication system
//!
//! Credential storage, password hashing and request field validation.

pub mod credentials;
pub mod password;
pub mod user_id;
pub mod validator;

pub use credentials::{CredentialStore, JsonCredentialStore};
pub use password::{hash_password, verify_password};
pub use user_id::UserId;
pub use validator::{validate_login, validate_password, validate_path, validate_required};
