/// Credential Store - durable identity -> enrolled credential mapping
///
/// Backed by a single JSON file. Saves rotate the previous file to a
/// `.backup` path before writing and restore it if the write fails, so the
/// store is never left missing or truncated.
use crate::error::{BridgeError, BridgeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// An enrolled public-key credential descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub id: String,
    #[serde(rename = "rawId")]
    pub raw_id: String,
    /// Opaque attestation response as presented by the authenticator
    pub response: serde_json::Value,
    #[serde(rename = "type")]
    pub cred_type: String,
    pub registered_at: DateTime<Utc>,
    pub registered_ip: String,
    pub last_used: Option<DateTime<Utc>>,
    pub last_used_ip: Option<String>,
}

/// File-backed credential store
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".backup");
        PathBuf::from(name)
    }

    /// Load all enrolled credentials.
    ///
    /// A missing or unreadable file yields an empty mapping so first use
    /// always succeeds.
    pub async fn load(&self) -> HashMap<String, CredentialRecord> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "credential store unreadable, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read credential store, starting empty");
                HashMap::new()
            }
        }
    }

    /// Persist the full mapping with backup rotation.
    ///
    /// The existing file is renamed aside first; on a write failure it is
    /// renamed back, leaving the previous content intact.
    pub async fn save(&self, credentials: &HashMap<String, CredentialRecord>) -> BridgeResult<()> {
        let bytes = serde_json::to_vec_pretty(credentials)
            .map_err(|e| BridgeError::Internal(format!("credential serialization failed: {}", e)))?;

        let backup = self.backup_path();
        let had_previous = match rotate_to_backup(&self.path, &backup).await {
            Ok(had) => had,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to rotate credential store backup");
                return Err(BridgeError::Internal(
                    "failed to save credentials".to_string(),
                ));
            }
        };

        match tokio::fs::write(&self.path, &bytes).await {
            Ok(()) => {
                info!(count = credentials.len(), "credential store saved");
                Ok(())
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "credential store write failed");
                if had_previous {
                    if let Err(restore_err) = tokio::fs::rename(&backup, &self.path).await {
                        error!(error = %restore_err, "failed to restore credential store backup");
                    }
                }
                Err(BridgeError::Internal(
                    "failed to save credentials".to_string(),
                ))
            }
        }
    }
}

async fn rotate_to_backup(path: &Path, backup: &Path) -> std::io::Result<bool> {
    match tokio::fs::rename(path, backup).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str) -> CredentialRecord {
        CredentialRecord {
            id: id.to_string(),
            raw_id: format!("raw-{}", id),
            response: json!({"clientDataJSON": "e30", "attestationObject": "AAAA"}),
            cred_type: "public-key".to_string(),
            registered_at: Utc::now(),
            registered_ip: "203.0.113.7".to_string(),
            last_used: None,
            last_used_ip: None,
        }
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("creds.json"));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("creds.json"));

        let mut map = HashMap::new();
        map.insert("alice".to_string(), record("cred-1"));
        store.save(&map).await.unwrap();

        let loaded = store.load().await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["alice"].id, "cred-1");
    }

    #[tokio::test]
    async fn save_rotates_previous_content_to_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        let store = CredentialStore::new(&path);

        let mut map = HashMap::new();
        map.insert("alice".to_string(), record("cred-1"));
        store.save(&map).await.unwrap();

        map.insert("bob".to_string(), record("cred-2"));
        store.save(&map).await.unwrap();

        let backup = std::fs::read_to_string(dir.path().join("creds.json.backup")).unwrap();
        let previous: HashMap<String, CredentialRecord> =
            serde_json::from_str(&backup).unwrap();
        assert_eq!(previous.len(), 1);
        assert!(previous.contains_key("alice"));

        assert_eq!(store.load().await.len(), 2);
    }

    #[tokio::test]
    async fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        std::fs::write(&path, b"not json").unwrap();

        let store = CredentialStore::new(&path);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn save_failure_leaves_original_intact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");
        let store = CredentialStore::new(&path);

        let mut map = HashMap::new();
        map.insert("alice".to_string(), record("cred-1"));
        store.save(&map).await.unwrap();
        let original = std::fs::read_to_string(&path).unwrap();

        // Occupy the backup path with a non-empty directory so the
        // rotation rename fails
        let backup = dir.path().join("creds.json.backup");
        std::fs::remove_file(&backup).ok();
        std::fs::create_dir(&backup).unwrap();
        std::fs::write(backup.join("occupied"), b"x").unwrap();

        map.insert("bob".to_string(), record("cred-2"));
        let result = store.save(&map).await;

        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }
}
