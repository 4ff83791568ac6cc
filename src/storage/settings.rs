//! Per-user key-value settings
//!
//! `data/user_settings.json` maps each user id to its own string map. The
//! vault's three keys live there, read and written through [`VaultSettings`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::file_io::{read_json, write_json_atomic};
use super::SettingsStore;
use crate::error::{LedgerError, LedgerResult};
use crate::models::UserId;

/// "true" or "false"
pub const VAULT_ENABLED_KEY: &str = "vault_enabled";

/// Base64 of the 32-byte PBKDF2 salt
pub const VAULT_SALT_KEY: &str = "vault_salt";

/// Base64 envelope of the data key under the password-derived key
pub const VAULT_DEK_KEY: &str = "vault_dek_encrypted";

#[derive(Debug, Default, Serialize, Deserialize)]
struct UserSettingsFile {
    #[serde(default)]
    users: BTreeMap<String, BTreeMap<String, String>>,
}

/// Settings store backed by `data/user_settings.json`
pub struct JsonSettingsStore {
    path: Option<PathBuf>,
    user_key: String,
    data: RwLock<UserSettingsFile>,
}

impl JsonSettingsStore {
    /// Load the settings file and scope the store to `user_id`
    pub fn open(path: PathBuf, user_id: UserId) -> LedgerResult<Self> {
        let data: UserSettingsFile = read_json(&path)?;
        Ok(Self {
            path: Some(path),
            user_key: user_id.as_uuid().to_string(),
            data: RwLock::new(data),
        })
    }

    pub(crate) fn unbacked(user_id: UserId) -> Self {
        Self {
            path: None,
            user_key: user_id.as_uuid().to_string(),
            data: RwLock::new(UserSettingsFile::default()),
        }
    }

    fn modify(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> LedgerResult<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        let mut staged = data.users.clone();
        f(staged.entry(self.user_key.clone()).or_default());
        staged.retain(|_, values| !values.is_empty());

        if let Some(path) = &self.path {
            write_json_atomic(path, &UserSettingsFile { users: staged.clone() })?;
        }

        data.users = staged;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn get(&self, key: &str) -> LedgerResult<Option<String>> {
        let data = self
            .data
            .read()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(data
            .users
            .get(&self.user_key)
            .and_then(|values| values.get(key))
            .cloned())
    }

    async fn set(&self, key: &str, value: &str) -> LedgerResult<()> {
        self.modify(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    async fn delete(&self, key: &str) -> LedgerResult<()> {
        self.modify(|values| {
            values.remove(key);
        })
    }
}

/// The vault's persisted state, typed
///
/// Stored as three string keys so data written by other clients stays readable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultSettings {
    pub enabled: bool,
    pub salt: Option<String>,
    pub dek_encrypted: Option<String>,
}

impl VaultSettings {
    /// Read all three keys
    pub async fn load(store: &dyn SettingsStore) -> LedgerResult<Self> {
        Ok(Self {
            enabled: Self::read_enabled(store).await?,
            salt: store.get(VAULT_SALT_KEY).await?,
            dek_encrypted: store.get(VAULT_DEK_KEY).await?,
        })
    }

    /// Read only the enabled flag; anything but "true" counts as disabled
    pub async fn read_enabled(store: &dyn SettingsStore) -> LedgerResult<bool> {
        Ok(store.get(VAULT_ENABLED_KEY).await?.as_deref() == Some("true"))
    }

    /// Write the enabled flag in its wire encoding
    pub async fn write_enabled(store: &dyn SettingsStore, enabled: bool) -> LedgerResult<()> {
        let value = if enabled { "true" } else { "false" };
        store.set(VAULT_ENABLED_KEY, value).await
    }

    /// Salt and wrapped key, if both are present
    pub fn key_material(&self) -> Option<(&str, &str)> {
        match (&self.salt, &self.dek_encrypted) {
            (Some(salt), Some(dek)) => Some((salt.as_str(), dek.as_str())),
            _ => None,
        }
    }
}
