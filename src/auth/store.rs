//! Token persistence.
//!
//! The granted credential lives in a small JSON file so consent survives
//! process restarts. Absence of the file simply means nobody has authorized
//! yet.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// A persisted OAuth credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expiry: DateTime<Utc>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl StoredCredential {
    /// Whether the access token is past (or within `margin` of) its expiry.
    pub fn is_expired(&self, margin: chrono::Duration) -> bool {
        self.expiry - margin <= Utc::now()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token file io: {0}")]
    Io(#[from] std::io::Error),
    #[error("token file format: {0}")]
    Format(#[from] serde_json::Error),
}

/// Reads and writes the token file.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the stored credential. `Ok(None)` when no file exists.
    pub fn load(&self) -> Result<Option<StoredCredential>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)?;
        let credential: StoredCredential = serde_json::from_str(&content)?;
        Ok(Some(credential))
    }

    pub fn save(&self, credential: &StoredCredential) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(credential)?;
        std::fs::write(&self.path, content)?;
        debug!("token saved to {}", self.path.display());
        Ok(())
    }

    /// Remove the token file if present.
    pub fn clear(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_credential() -> StoredCredential {
        StoredCredential {
            access_token: "ya29.sample".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expiry: Utc::now() + chrono::Duration::hours(1),
            scopes: vec!["https://www.googleapis.com/auth/drive.file".to_string()],
        }
    }

    #[test]
    fn test_load_absent_is_none() {
        let tmp = tempdir().unwrap();
        let store = TokenStore::new(tmp.path().join("token.json"));
        assert!(!store.exists());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let tmp = tempdir().unwrap();
        let store = TokenStore::new(tmp.path().join("res").join("token.json"));

        let credential = sample_credential();
        store.save(&credential).unwrap();
        assert!(store.exists());

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.access_token, credential.access_token);
        assert_eq!(loaded.refresh_token, credential.refresh_token);
        assert_eq!(loaded.scopes, credential.scopes);
    }

    #[test]
    fn test_clear_removes_file() {
        let tmp = tempdir().unwrap();
        let store = TokenStore::new(tmp.path().join("token.json"));

        store.save(&sample_credential()).unwrap();
        store.clear().unwrap();
        assert!(!store.exists());

        // Clearing again is a no-op.
        store.clear().unwrap();
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("token.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = TokenStore::new(path);
        assert!(matches!(store.load(), Err(StoreError::Format(_))));
    }

    #[test]
    fn test_expiry_margin() {
        let mut credential = sample_credential();
        assert!(!credential.is_expired(chrono::Duration::seconds(60)));

        credential.expiry = Utc::now() + chrono::Duration::seconds(30);
        assert!(credential.is_expired(chrono::Duration::seconds(60)));

        credential.expiry = Utc::now() - chrono::Duration::hours(1);
        assert!(credential.is_expired(chrono::Duration::zero()));
    }

    #[test]
    fn test_token_file_keys_are_snake_case() {
        let json = serde_json::to_value(sample_credential()).unwrap();
        assert!(json.get("access_token").is_some());
        assert!(json.get("refresh_token").is_some());
        assert!(json.get("expiry").is_some());
        assert!(json.get("scopes").is_some());
    }
}
