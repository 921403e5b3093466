//! Path validation
//!
//! Two independent checks guard every storage operation. The textual check
//! rejects obviously hostile input before the filesystem is touched; the
//! canonical check resolves the joined path against the real filesystem and
//! verifies it is still under the user's root. Only the second one is a
//! security boundary.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Splits a logical path into validated segments.
///
/// Leading separators, empty segments and `.` are dropped. An empty result
/// denotes the user root.
pub fn normalize_logical_path(raw: &str, max_length: usize) -> Result<Vec<String>, StorageError> {
    let length = raw.chars().count();
    if length > max_length {
        return Err(StorageError::PathTooLong {
            length,
            max: max_length,
        });
    }

    if raw.contains(['\\', '\0']) {
        return Err(StorageError::MalformedPath(raw.to_string()));
    }

    let segments: Vec<String> = raw
        .trim_start_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .map(str::to_string)
        .collect();

    if segments.iter().any(|segment| segment == "..") {
        return Err(StorageError::PathTraversal(raw.to_string()));
    }

    if segments.first().is_some_and(|first| has_drive_prefix(first)) {
        return Err(StorageError::MalformedPath(raw.to_string()));
    }

    Ok(segments)
}

fn has_drive_prefix(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Joins `segments` under `root` and returns the canonical location,
/// failing with `PathTraversal` if it is not inside the canonical root.
///
/// The target itself may not exist yet; in that case the deepest existing
/// ancestor is canonicalized and the missing components are appended.
pub fn confine(root: &Path, segments: &[String]) -> Result<PathBuf, StorageError> {
    let canonical_root = root.canonicalize()?;

    let mut joined = canonical_root.clone();
    for segment in segments {
        joined.push(segment);
    }

    let canonical = canonicalize_existing_prefix(&joined)?;
    if !canonical.starts_with(&canonical_root) {
        return Err(StorageError::PathTraversal(canonical.display().to_string()));
    }

    Ok(canonical)
}

fn canonicalize_existing_prefix(path: &Path) -> Result<PathBuf, StorageError> {
    let mut existing = path;
    let mut missing: Vec<OsString> = Vec::new();

    loop {
        match existing.canonicalize() {
            Ok(mut canonical) => {
                for component in missing.iter().rev() {
                    canonical.push(component);
                }
                return Ok(canonical);
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
                // Present but unresolvable means a dangling symlink
                if existing.symlink_metadata().is_ok() && e.kind() == io::ErrorKind::NotFound {
                    return Err(StorageError::PathTraversal(existing.display().to_string()));
                }
                match (existing.parent(), existing.file_name()) {
                    (Some(parent), Some(name)) => {
                        missing.push(name.to_os_string());
                        existing = parent;
                    }
                    _ => return Err(StorageError::Io(e)),
                }
            }
            Err(e) => return Err(StorageError::Io(e)),
        }
    }
}
