//! Envelope key manager
//!
//! Creates the salt and data key, wraps the data key under a password-derived
//! key, and persists the salt and wrapped key through the settings store.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::{debug, error};
use zeroize::Zeroizing;

use crate::crypto::{decrypt, encrypt, DataKey, KeyEncryptionKey, Salt};
use crate::error::{LedgerError, LedgerResult};
use crate::storage::settings::{VAULT_DEK_KEY, VAULT_SALT_KEY};
use crate::storage::{SettingsStore, VaultSettings};

/// Bridges the vault and the settings store
pub struct KeyManager {
    settings: Arc<dyn SettingsStore>,
}

impl KeyManager {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    pub fn generate_salt() -> Salt {
        Salt::generate()
    }

    pub fn generate_dek() -> DataKey {
        DataKey::generate()
    }

    /// Encrypt the data key under `kek`, encoded as base64
    pub fn wrap_dek(dek: &DataKey, kek: &KeyEncryptionKey) -> LedgerResult<String> {
        let envelope = encrypt(dek.as_bytes(), kek)?;
        Ok(STANDARD.encode(envelope))
    }

    /// Recover the data key; any authentication failure means a wrong password
    pub fn unwrap_dek(wrapped: &str, kek: &KeyEncryptionKey) -> LedgerResult<DataKey> {
        let envelope = STANDARD
            .decode(wrapped.trim())
            .map_err(|_| LedgerError::IncorrectPassword)?;

        let raw = decrypt(&envelope, kek).map_err(|e| match e {
            LedgerError::AuthenticationFailed => LedgerError::IncorrectPassword,
            other => other,
        })?;
        let raw = Zeroizing::new(raw);

        DataKey::from_bytes(&raw)
    }

    /// Whether the persisted flag says the vault is on
    pub async fn is_enabled(&self) -> LedgerResult<bool> {
        VaultSettings::read_enabled(self.settings.as_ref()).await
    }

    /// Salt and wrapped key; fails with `SettingsUnavailable` when either is missing
    pub async fn load_key_material(&self) -> LedgerResult<(Salt, String)> {
        let stored = VaultSettings::load(self.settings.as_ref()).await?;
        let (salt, wrapped) = stored
            .key_material()
            .ok_or(LedgerError::SettingsUnavailable)?;

        Ok((Salt::decode(salt)?, wrapped.to_string()))
    }

    /// Persist salt and wrapped key, replacing any previous pair
    ///
    /// The two keys are written one after the other. If the wrapped key cannot
    /// be written, the previous salt is put back so the stored pair still
    /// matches.
    pub async fn store_key_material(&self, salt: &Salt, wrapped: &str) -> LedgerResult<()> {
        let previous_salt = self.settings.get(VAULT_SALT_KEY).await?;
        self.settings.set(VAULT_SALT_KEY, &salt.encode()).await?;

        if let Err(e) = self.settings.set(VAULT_DEK_KEY, wrapped).await {
            let restored = match previous_salt.as_deref() {
                Some(old) => self.settings.set(VAULT_SALT_KEY, old).await,
                None => self.settings.delete(VAULT_SALT_KEY).await,
            };
            if let Err(rollback) = restored {
                error!(error = %rollback, "failed to restore vault salt");
            }
            return Err(e);
        }

        debug!("vault key material stored");
        Ok(())
    }

    pub async fn set_enabled(&self, enabled: bool) -> LedgerResult<()> {
        VaultSettings::write_enabled(self.settings.as_ref(), enabled).await
    }

    /// Delete salt and wrapped key
    pub async fn clear_key_material(&self) -> LedgerResult<()> {
        self.settings.delete(VAULT_SALT_KEY).await?;
        self.settings.delete(VAULT_DEK_KEY).await?;
        debug!("vault key material deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::derive_kek;
    use crate::storage::MemorySettingsStore;

    #[test]
    fn test_wrap_unwrap_round_trip() {
        let dek = KeyManager::generate_dek();
        let kek = derive_kek("Secret123", &KeyManager::generate_salt());

        let wrapped = KeyManager::wrap_dek(&dek, &kek).unwrap();
        let unwrapped = KeyManager::unwrap_dek(&wrapped, &kek).unwrap();
        assert_eq!(unwrapped.as_bytes(), dek.as_bytes());
    }

    #[test]
    fn test_unwrap_with_wrong_password_is_incorrect_password() {
        let salt = KeyManager::generate_salt();
        let dek = KeyManager::generate_dek();
        let wrapped = KeyManager::wrap_dek(&dek, &derive_kek("right", &salt)).unwrap();

        let err = KeyManager::unwrap_dek(&wrapped, &derive_kek("wrong", &salt)).unwrap_err();
        assert!(matches!(err, LedgerError::IncorrectPassword));
    }

    #[test]
    fn test_unwrap_garbage_is_incorrect_password() {
        let kek = derive_kek("pw", &KeyManager::generate_salt());
        let err = KeyManager::unwrap_dek("not base64 at all!", &kek).unwrap_err();
        assert!(matches!(err, LedgerError::IncorrectPassword));
    }

    #[test]
    fn test_generated_material_is_random() {
        assert_ne!(KeyManager::generate_salt(), KeyManager::generate_salt());
        assert_ne!(
            KeyManager::generate_dek().as_bytes(),
            KeyManager::generate_dek().as_bytes()
        );
    }

    #[tokio::test]
    async fn test_missing_material_is_settings_unavailable() {
        let keys = KeyManager::new(Arc::new(MemorySettingsStore::new()));
        let err = keys.load_key_material().await.unwrap_err();
        assert!(matches!(err, LedgerError::SettingsUnavailable));
        assert_eq!(err.to_string(), "Vault data not found");
    }

    #[tokio::test]
    async fn test_store_load_clear() {
        let store = Arc::new(MemorySettingsStore::new());
        let keys = KeyManager::new(store.clone());
        let salt = KeyManager::generate_salt();

        keys.store_key_material(&salt, "d3JhcHBlZA==").await.unwrap();
        let (loaded_salt, wrapped) = keys.load_key_material().await.unwrap();
        assert_eq!(loaded_salt, salt);
        assert_eq!(wrapped, "d3JhcHBlZA==");

        keys.clear_key_material().await.unwrap();
        assert_eq!(store.get(VAULT_SALT_KEY).await.unwrap(), None);
        assert_eq!(store.get(VAULT_DEK_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_wrapped_key_write_restores_salt() {
        let store = Arc::new(MemorySettingsStore::new());
        let keys = KeyManager::new(store.clone());
        let old_salt = KeyManager::generate_salt();
        keys.store_key_material(&old_salt, "b2xk").await.unwrap();

        store.fail_writes_for(VAULT_DEK_KEY);
        assert!(keys
            .store_key_material(&KeyManager::generate_salt(), "bmV3")
            .await
            .is_err());

        let (salt, wrapped) = keys.load_key_material().await.unwrap();
        assert_eq!(salt, old_salt);
        assert_eq!(wrapped, "b2xk");
    }

    #[tokio::test]
    async fn test_failed_first_write_leaves_no_salt() {
        let store = Arc::new(MemorySettingsStore::new());
        store.fail_writes_for(VAULT_DEK_KEY);
        let keys = KeyManager::new(store.clone());

        assert!(keys
            .store_key_material(&KeyManager::generate_salt(), "bmV3")
            .await
            .is_err());
        assert_eq!(store.get(VAULT_SALT_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_salt_is_invalid_key_material() {
        let store = Arc::new(MemorySettingsStore::new());
        store.set(VAULT_SALT_KEY, "c2hvcnQ=").await.unwrap();
        store.set(VAULT_DEK_KEY, "AAAA").await.unwrap();

        let err = KeyManager::new(store).load_key_material().await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidKeyMaterial(_)));
    }
}
