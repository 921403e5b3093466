//! Per-user file storage
//!
//! Maps user-relative logical paths onto a confined directory per user and
//! performs list, read, write, delete and move inside it.

pub mod operations;
pub mod results;
pub mod validation;

pub use operations::FileStorage;
pub use results::{EntryKind, StoredEntry};
pub use validation::{confine, normalize_logical_path};
