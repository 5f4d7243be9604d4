//! Per-user Jenkins credential storage.
//!
//! Each chat user connects their own Jenkins account. The record is kept
//! in the OS keyring (Keychain on macOS, Credential Manager on Windows,
//! Secret Service on Linux), one entry per chat user id. Hosts without a
//! keyring service can keep records in memory instead.

use std::collections::HashMap;

use async_trait::async_trait;
use jenkins_client::Credentials;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{PluginError, PluginResult};

/// Default keyring service name for stored credentials.
pub const DEFAULT_KEYRING_SERVICE: &str = "jenkins-slash";

/// Jenkins credentials of one chat user.
#[derive(Clone)]
pub struct JenkinsUserInfo {
    /// Chat user id the credentials belong to.
    pub user_id: String,
    /// Jenkins username.
    pub username: String,
    token: SecretString,
}

impl JenkinsUserInfo {
    /// Create a record.
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            token: SecretString::new(token.into().into()),
        }
    }

    /// Jenkins API token.
    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }

    /// Credentials for the Jenkins client.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, self.token.expose_secret())
    }

    fn to_json(&self) -> PluginResult<String> {
        let stored = StoredRecord {
            username: self.username.clone(),
            token: self.token.expose_secret().to_string(),
        };
        Ok(serde_json::to_string(&stored)?)
    }

    fn from_json(user_id: &str, json: &str) -> PluginResult<Self> {
        let stored: StoredRecord = serde_json::from_str(json)?;
        Ok(Self::new(user_id, stored.username, stored.token))
    }
}

impl std::fmt::Debug for JenkinsUserInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JenkinsUserInfo")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// On-disk form of a record; the user id is the keyring entry name.
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    username: String,
    token: String,
}

/// Storage for [`JenkinsUserInfo`] records, keyed by chat user id.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Store or replace the record of `info.user_id`.
    async fn store(&self, info: &JenkinsUserInfo) -> PluginResult<()>;

    /// Load the record of `user_id`, if any.
    async fn load(&self, user_id: &str) -> PluginResult<Option<JenkinsUserInfo>>;
}

/// Where connected accounts are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    /// OS keyring, survives restarts.
    #[default]
    Keyring,
    /// Process memory, for hosts without a keyring service.
    Memory,
}

impl std::str::FromStr for CredentialBackend {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyring" => Ok(Self::Keyring),
            "memory" => Ok(Self::Memory),
            other => Err(PluginError::Config(format!(
                "Unknown credential store '{}', expected 'keyring' or 'memory'",
                other
            ))),
        }
    }
}

/// Credential store backed by the OS keyring.
///
/// Keyring calls block, so they run on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    /// Create a store keeping its entries under `service`.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(service: &str, user_id: &str) -> PluginResult<keyring::Entry> {
        Ok(keyring::Entry::new(service, user_id)?)
    }
}

#[async_trait]
impl CredentialStore for KeyringCredentialStore {
    async fn store(&self, info: &JenkinsUserInfo) -> PluginResult<()> {
        let service = self.service.clone();
        let user_id = info.user_id.clone();
        let json = info.to_json()?;

        tokio::task::spawn_blocking(move || -> PluginResult<()> {
            Self::entry(&service, &user_id)?
                .set_password(&json)
                .map_err(|e| {
                    warn!(user_id = %user_id, "Failed to store Jenkins credentials: {}", e);
                    PluginError::CredentialStorage(e.to_string())
                })?;
            debug!(user_id = %user_id, "Stored Jenkins credentials");
            Ok(())
        })
        .await?
    }

    async fn load(&self, user_id: &str) -> PluginResult<Option<JenkinsUserInfo>> {
        let service = self.service.clone();
        let user_id = user_id.to_string();

        tokio::task::spawn_blocking(move || -> PluginResult<Option<JenkinsUserInfo>> {
            match Self::entry(&service, &user_id)?.get_password() {
                Ok(json) => JenkinsUserInfo::from_json(&user_id, &json).map(Some),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(e) => Err(PluginError::from(e)),
            }
        })
        .await?
    }
}

/// Process-local credential store. Records are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    records: RwLock<HashMap<String, JenkinsUserInfo>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn store(&self, info: &JenkinsUserInfo) -> PluginResult<()> {
        self.records
            .write()
            .await
            .insert(info.user_id.clone(), info.clone());
        Ok(())
    }

    async fn load(&self, user_id: &str) -> PluginResult<Option<JenkinsUserInfo>> {
        Ok(self.records.read().await.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let info = JenkinsUserInfo::new("U1", "alice", "11aa22bb");
        let debug = format!("{:?}", info);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("11aa22bb"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_json_round_trip_keeps_user_id_out() {
        let info = JenkinsUserInfo::new("U1", "alice", "11aa22bb");
        let json = info.to_json().unwrap();
        assert!(!json.contains("U1"));

        let loaded = JenkinsUserInfo::from_json("U1", &json).unwrap();
        assert_eq!(loaded.user_id, "U1");
        assert_eq!(loaded.username, "alice");
        assert_eq!(loaded.token(), "11aa22bb");
    }

    #[test]
    fn test_corrupt_record() {
        let err = JenkinsUserInfo::from_json("U1", "not json").unwrap_err();
        assert!(matches!(err, PluginError::Json(_)));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryCredentialStore::new();
        assert!(store.load("U1").await.unwrap().is_none());

        store
            .store(&JenkinsUserInfo::new("U1", "alice", "t1"))
            .await
            .unwrap();
        store
            .store(&JenkinsUserInfo::new("U1", "alice", "t2"))
            .await
            .unwrap();
        assert_eq!(store.load("U1").await.unwrap().unwrap().token(), "t2");
        assert!(store.load("U2").await.unwrap().is_none());
    }

    #[test]
    fn test_credential_backend_from_str() {
        assert_eq!(
            "keyring".parse::<CredentialBackend>().unwrap(),
            CredentialBackend::Keyring
        );
        assert_eq!(
            " Memory ".parse::<CredentialBackend>().unwrap(),
            CredentialBackend::Memory
        );
        let err = "vault".parse::<CredentialBackend>().unwrap_err();
        assert!(matches!(err, PluginError::Config(msg) if msg.contains("vault")));
    }

    // Requires a working keyring on the system.
    #[tokio::test]
    #[ignore]
    async fn test_keyring_store() {
        let store = KeyringCredentialStore::with_service("jenkins-slash-test");
        let info = JenkinsUserInfo::new("test-user", "alice", "token-12345");

        store.store(&info).await.expect("Failed to store");
        let loaded = store.load("test-user").await.expect("Failed to load");
        assert_eq!(loaded.map(|i| i.username), Some("alice".to_string()));

        keyring::Entry::new("jenkins-slash-test", "test-user")
            .and_then(|entry| entry.delete_credential())
            .expect("Failed to clean up");
    }
}
