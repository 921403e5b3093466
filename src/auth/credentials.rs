//! Credential storage and management
//!
//! Maps logins to password digests and user ids. The JSON-file store keeps
//! the whole table in memory and rewrites the file after each registration.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::auth::UserId;
use crate::auth::password::{hash_password, verify_password};
use crate::error::AuthError;

/// Source of truth for accounts.
pub trait CredentialStore: Send + Sync {
    /// Creates an account and returns its freshly minted id.
    fn register(&self, login: &str, password: &str) -> Result<UserId, AuthError>;

    /// Returns the id of the account whose login and password both match.
    fn authenticate(&self, login: &str, password: &str) -> Result<UserId, AuthError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialRecord {
    login: String,
    password_hash: String,
}

/// Credential store persisted as a JSON object keyed by user id
pub struct JsonCredentialStore {
    path: PathBuf,
    records: Mutex<BTreeMap<String, CredentialRecord>>,
}

impl JsonCredentialStore {
    /// Loads the store from `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let path = path.into();

        let records = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let mut records: BTreeMap<String, CredentialRecord> = serde_json::from_str(&raw)?;
            records.retain(|id, record| {
                let valid = UserId::parse(id).is_some();
                if !valid {
                    warn!("Ignoring credential record with malformed id for {}", record.login);
                }
                valid
            });
            records
        } else {
            BTreeMap::new()
        };

        info!("Loaded {} accounts from {}", records.len(), path.display());

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn len(&self) -> usize {
        self.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, CredentialRecord>>, AuthError> {
        self.records
            .lock()
            .map_err(|_| AuthError::Store("credential store lock poisoned".into()))
    }

    fn persist(&self, records: &BTreeMap<String, CredentialRecord>) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp_path = temp_path_for(&self.path);
        fs::write(&temp_path, serde_json::to_vec_pretty(records)?)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

impl CredentialStore for JsonCredentialStore {
    fn register(&self, login: &str, password: &str) -> Result<UserId, AuthError> {
        let mut records = self.lock()?;

        if records.values().any(|record| record.login == login) {
            return Err(AuthError::LoginTaken(login.to_string()));
        }

        let user_id = UserId::generate();
        records.insert(
            user_id.as_str().to_string(),
            CredentialRecord {
                login: login.to_string(),
                password_hash: hash_password(password)?,
            },
        );

        if let Err(e) = self.persist(&records) {
            records.remove(user_id.as_str());
            return Err(e);
        }

        Ok(user_id)
    }

    fn authenticate(&self, login: &str, password: &str) -> Result<UserId, AuthError> {
        let candidate = {
            let records = self.lock()?;
            records
                .iter()
                .find(|(_, record)| record.login == login)
                .map(|(id, record)| (id.clone(), record.password_hash.clone()))
        };

        match candidate {
            Some((id, digest)) if verify_password(password, &digest) => {
                UserId::parse(&id).ok_or(AuthError::InvalidCredentials)
            }
            _ => Err(AuthError::InvalidCredentials),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_register_and_authenticate() {
        let dir = TempDir::new().unwrap();
        let store = JsonCredentialStore::open(dir.path().join("users.json")).unwrap();

        let id = store.register("alice", "secret1").unwrap();
        assert_eq!(store.authenticate("alice", "secret1").unwrap(), id);
        assert!(matches!(
            store.authenticate("alice", "wrong-password"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            store.authenticate("mallory", "secret1"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_duplicate_login() {
        let dir = TempDir::new().unwrap();
        let store = JsonCredentialStore::open(dir.path().join("users.json")).unwrap();

        store.register("alice", "secret1").unwrap();
        assert!(matches!(
            store.register("alice", "another1"),
            Err(AuthError::LoginTaken(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("users.json");

        let id = {
            let store = JsonCredentialStore::open(&path).unwrap();
            store.register("bob", "hunter22").unwrap()
        };

        let reopened = JsonCredentialStore::open(&path).unwrap();
        assert_eq!(reopened.authenticate("bob", "hunter22").unwrap(), id);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("hunter22"));
    }
}
