//! Storage operations
//!
//! Every method re-resolves its paths on each call. Concurrent connections of
//! the same user may mutate the same tree; no locking is done across calls and
//! the last writer wins.

use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::auth::UserId;
use crate::config::ServerConfig;
use crate::error::StorageError;
use crate::storage::results::StoredEntry;
use crate::storage::validation::{confine, normalize_logical_path};

/// Storage engine rooted at a directory holding one sub-directory per user.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
    max_path_length: usize,
    max_file_size: u64,
}

impl FileStorage {
    /// Opens the storage root, creating it if needed.
    pub fn new(
        root: impl Into<PathBuf>,
        max_path_length: usize,
        max_file_size: u64,
    ) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        info!("Storage root directory: {}", root.display());

        Ok(Self {
            root,
            max_path_length,
            max_file_size,
        })
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, StorageError> {
        Self::new(
            config.storage_root_path(),
            config.max_path_length,
            config.max_file_size,
        )
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn max_path_length(&self) -> usize {
        self.max_path_length
    }

    /// Directory holding everything `user` owns, created on first use.
    pub fn user_root(&self, user: &UserId) -> Result<PathBuf, StorageError> {
        let dir = self.root.join(user.as_str());
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Resolves a logical path to a confined absolute location.
    ///
    /// Textual validation runs before any filesystem access.
    pub fn resolve(&self, user: &UserId, logical_path: &str) -> Result<PathBuf, StorageError> {
        let segments = normalize_logical_path(logical_path, self.max_path_length)?;
        confine(&self.user_root(user)?, &segments)
    }

    /// Like `resolve`, but refuses paths that denote the user root itself.
    fn resolve_entry(&self, user: &UserId, logical_path: &str) -> Result<PathBuf, StorageError> {
        let segments = normalize_logical_path(logical_path, self.max_path_length)?;
        if segments.is_empty() {
            return Err(StorageError::RootOperation);
        }
        confine(&self.user_root(user)?, &segments)
    }

    /// Lists a directory, or describes a single file.
    ///
    /// A missing path yields an empty listing. Directories come first, then
    /// files, each group sorted by name.
    pub fn list(&self, user: &UserId, logical_path: &str) -> Result<Vec<StoredEntry>, StorageError> {
        let target = self.resolve(user, logical_path)?;

        let metadata = match fs::metadata(&target) {
            Ok(metadata) => metadata,
            Err(e) if is_missing(&e) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if metadata.is_file() {
            return Ok(vec![StoredEntry::file(file_name(&target), metadata.len())]);
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&target)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();

            let file_type = entry.file_type()?;
            if file_type.is_symlink() {
                debug!("Skipping symlink {} in listing", entry.path().display());
                continue;
            }

            if file_type.is_dir() {
                entries.push(StoredEntry::directory(name));
            } else {
                match entry.metadata() {
                    Ok(metadata) => entries.push(StoredEntry::file(name, metadata.len())),
                    Err(e) => warn!("Failed to stat {}: {}", entry.path().display(), e),
                }
            }
        }

        entries.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
        Ok(entries)
    }

    /// Returns the content of a file.
    pub fn read(&self, user: &UserId, logical_path: &str) -> Result<Vec<u8>, StorageError> {
        let target = self.resolve(user, logical_path)?;

        match fs::metadata(&target) {
            Ok(metadata) if metadata.is_file() => Ok(fs::read(&target)?),
            Ok(_) => Err(StorageError::NotFound(logical_path.to_string())),
            Err(e) if is_missing(&e) => Err(StorageError::NotFound(logical_path.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Replaces the content of a file, creating parent directories as needed.
    pub fn write(&self, user: &UserId, logical_path: &str, data: &[u8]) -> Result<(), StorageError> {
        let size = data.len() as u64;
        if size > self.max_file_size {
            return Err(StorageError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        let target = self.resolve_entry(user, logical_path)?;

        // A directory already occupies the name
        if target.is_dir() {
            return Err(StorageError::AlreadyExists(logical_path.to_string()));
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, data)?;

        info!("Stored {} ({} bytes) for user {}", logical_path, size, user);
        Ok(())
    }

    /// Removes a file, or a directory with everything beneath it.
    pub fn delete(&self, user: &UserId, logical_path: &str) -> Result<(), StorageError> {
        let target = self.resolve_entry(user, logical_path)?;

        let metadata = match fs::symlink_metadata(&target) {
            Ok(metadata) => metadata,
            Err(e) if is_missing(&e) => {
                return Err(StorageError::NotFound(logical_path.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir() {
            fs::remove_dir_all(&target)?;
        } else {
            fs::remove_file(&target)?;
        }

        info!("Deleted {} for user {}", logical_path, user);
        Ok(())
    }

    /// Renames `source` to `destination` inside the user's root.
    ///
    /// Never overwrites: an existing destination fails with `AlreadyExists`.
    pub fn move_entry(
        &self,
        user: &UserId,
        source: &str,
        destination: &str,
    ) -> Result<(), StorageError> {
        let from = self.resolve_entry(user, source)?;
        let to = self.resolve_entry(user, destination)?;

        match fs::symlink_metadata(&from) {
            Ok(_) => {}
            Err(e) if is_missing(&e) => return Err(StorageError::NotFound(source.to_string())),
            Err(e) => return Err(e.into()),
        }

        if fs::symlink_metadata(&to).is_ok() {
            return Err(StorageError::AlreadyExists(destination.to_string()));
        }

        if to.starts_with(&from) {
            return Err(StorageError::MalformedPath(format!(
                "cannot move {source} into itself"
            )));
        }

        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&from, &to)?;

        info!("Moved {} -> {} for user {}", source, destination, user);
        Ok(())
    }
}

fn is_missing(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::EntryKind;
    use tempfile::TempDir;

    fn storage() -> (TempDir, FileStorage) {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("storage"), 256, 1024).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, storage) = storage();
        let user = UserId::generate();

        storage.write(&user, "a/b.txt", b"hello").unwrap();
        assert_eq!(storage.read(&user, "a/b.txt").unwrap(), b"hello");

        storage.write(&user, "a/b.txt", b"").unwrap();
        assert!(storage.read(&user, "a/b.txt").unwrap().is_empty());
    }

    #[test]
    fn test_write_at_size_limit() {
        let (_dir, storage) = storage();
        let user = UserId::generate();

        let exact = vec![7u8; 1024];
        storage.write(&user, "big.bin", &exact).unwrap();
        assert_eq!(storage.read(&user, "big.bin").unwrap(), exact);

        let too_big = vec![7u8; 1025];
        assert!(matches!(
            storage.write(&user, "bigger.bin", &too_big),
            Err(StorageError::FileTooLarge { size: 1025, max: 1024 })
        ));
        assert!(matches!(
            storage.read(&user, "bigger.bin"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_traversal_does_not_touch_filesystem() {
        let (dir, storage) = storage();
        let user = UserId::generate();

        assert!(matches!(
            storage.write(&user, "../evil", b"x"),
            Err(StorageError::PathTraversal(_))
        ));
        assert!(!dir.path().join("storage").join(user.as_str()).exists());
        assert!(!dir.path().join("storage").join("evil").exists());
    }

    #[test]
    fn test_users_are_isolated() {
        let (_dir, storage) = storage();
        let alice = UserId::generate();
        let bob = UserId::generate();

        let a = storage.resolve(&alice, "notes.txt").unwrap();
        let b = storage.resolve(&bob, "notes.txt").unwrap();
        assert_ne!(a, b);

        storage.write(&alice, "notes.txt", b"alice").unwrap();
        assert!(matches!(
            storage.read(&bob, "notes.txt"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_orders_directories_first() {
        let (_dir, storage) = storage();
        let user = UserId::generate();

        storage.write(&user, "zeta.txt", b"12").unwrap();
        storage.write(&user, "alpha.txt", b"1").unwrap();
        storage.write(&user, "sub/inner.txt", b"123").unwrap();
        storage.write(&user, "beta/inner.txt", b"123").unwrap();

        let entries = storage.list(&user, "").unwrap();
        assert_eq!(
            entries,
            vec![
                StoredEntry::directory("beta"),
                StoredEntry::directory("sub"),
                StoredEntry::file("alpha.txt", 1),
                StoredEntry::file("zeta.txt", 2),
            ]
        );
    }

    #[test]
    fn test_list_single_file_and_missing() {
        let (_dir, storage) = storage();
        let user = UserId::generate();

        storage.write(&user, "docs/report.pdf", b"%PDF").unwrap();

        let entries = storage.list(&user, "docs/report.pdf").unwrap();
        assert_eq!(entries, vec![StoredEntry::file("report.pdf", 4)]);
        assert_eq!(entries[0].kind, EntryKind::File);

        assert!(storage.list(&user, "nowhere").unwrap().is_empty());
    }

    #[test]
    fn test_read_directory_is_not_found() {
        let (_dir, storage) = storage();
        let user = UserId::generate();

        storage.write(&user, "dir/file", b"x").unwrap();
        assert!(matches!(
            storage.read(&user, "dir"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_file_and_tree() {
        let (_dir, storage) = storage();
        let user = UserId::generate();

        storage.write(&user, "tree/a/b/c.txt", b"c").unwrap();
        storage.write(&user, "single.txt", b"s").unwrap();

        storage.delete(&user, "single.txt").unwrap();
        storage.delete(&user, "tree").unwrap();
        assert!(storage.list(&user, "").unwrap().is_empty());

        assert!(matches!(
            storage.delete(&user, "tree"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_root_cannot_be_deleted() {
        let (_dir, storage) = storage();
        let user = UserId::generate();

        assert!(matches!(
            storage.delete(&user, "/"),
            Err(StorageError::RootOperation)
        ));
    }

    #[test]
    fn test_move_semantics() {
        let (_dir, storage) = storage();
        let user = UserId::generate();

        storage.write(&user, "src.txt", b"source").unwrap();
        storage.write(&user, "dst.txt", b"destination").unwrap();

        assert!(matches!(
            storage.move_entry(&user, "src.txt", "dst.txt"),
            Err(StorageError::AlreadyExists(_))
        ));
        assert_eq!(storage.read(&user, "src.txt").unwrap(), b"source");
        assert_eq!(storage.read(&user, "dst.txt").unwrap(), b"destination");

        storage.move_entry(&user, "src.txt", "archive/2024/src.txt").unwrap();
        assert_eq!(
            storage.read(&user, "archive/2024/src.txt").unwrap(),
            b"source"
        );
        assert!(matches!(
            storage.move_entry(&user, "src.txt", "other.txt"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_move_into_itself_rejected() {
        let (_dir, storage) = storage();
        let user = UserId::generate();

        storage.write(&user, "dir/file", b"x").unwrap();
        assert!(matches!(
            storage.move_entry(&user, "dir", "dir/nested"),
            Err(StorageError::MalformedPath(_))
        ));
    }
}
