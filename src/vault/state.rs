//! Vault state machine
//!
//! `Disabled -> activate -> Unlocked <-> Locked -> deactivate -> Disabled`.
//!
//! The data key is held only while unlocked and is zeroed when dropped.
//! Transitions take `&mut self`, so two vault operations can never be in
//! flight on the same vault at once.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use super::codec::FieldCodec;
use super::keys::KeyManager;
use super::transition::{TransitionEngine, TransitionReport};
use crate::crypto::{derive_kek_off_thread, DataKey, SecureString};
use crate::error::{LedgerError, LedgerResult};
use crate::models::UserId;
use crate::storage::{RecordStore, Storage};

/// Where the vault is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    Disabled,
    Locked,
    Unlocked,
}

impl fmt::Display for VaultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Locked => write!(f, "locked"),
            Self::Unlocked => write!(f, "unlocked"),
        }
    }
}

/// The `(enabled, locked)` pair shown to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultStatus {
    pub enabled: bool,
    pub locked: bool,
}

/// One user's vault
pub struct Vault {
    user_id: UserId,
    keys: KeyManager,
    records: Arc<dyn RecordStore>,
    enabled: bool,
    dek: Option<DataKey>,
}

impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vault")
            .field("user_id", &self.user_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Vault {
    /// Start a session: locked if the stored flag says enabled, disabled otherwise
    pub async fn open(storage: &Storage, user_id: UserId) -> LedgerResult<Self> {
        let keys = KeyManager::new(storage.settings.clone());
        let enabled = keys.is_enabled().await?;

        Ok(Self {
            user_id,
            keys,
            records: storage.records.clone(),
            enabled,
            dek: None,
        })
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn records(&self) -> &dyn RecordStore {
        self.records.as_ref()
    }

    pub fn state(&self) -> VaultState {
        match (self.enabled, self.dek.is_some()) {
            (false, _) => VaultState::Disabled,
            (true, false) => VaultState::Locked,
            (true, true) => VaultState::Unlocked,
        }
    }

    pub fn status(&self) -> VaultStatus {
        VaultStatus {
            enabled: self.enabled,
            locked: self.enabled && self.dek.is_none(),
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.state() == VaultState::Unlocked
    }

    /// A codec borrowing the data key while unlocked, passthrough otherwise
    pub fn codec(&self) -> FieldCodec<'_> {
        FieldCodec::new(self.dek.as_ref())
    }

    fn invalid(&self, operation: &'static str) -> LedgerError {
        LedgerError::InvalidState {
            operation,
            state: self.state().to_string(),
        }
    }

    /// Turn the vault on and encrypt every existing plaintext record
    ///
    /// The enabled flag is written only after the salt and wrapped key, so an
    /// interrupted activation leaves the vault disabled. Records that fail to
    /// encrypt are reported, not returned as an error.
    pub async fn activate(&mut self, password: &SecureString) -> LedgerResult<TransitionReport> {
        if self.state() != VaultState::Disabled {
            return Err(self.invalid("enable the vault"));
        }
        if password.is_empty() {
            return Err(LedgerError::Validation("Password cannot be empty".into()));
        }

        let salt = KeyManager::generate_salt();
        let dek = KeyManager::generate_dek();
        let kek = derive_kek_off_thread(password, salt).await?;
        let wrapped = KeyManager::wrap_dek(&dek, &kek)?;
        drop(kek);

        self.keys.store_key_material(&salt, &wrapped).await?;
        self.keys.set_enabled(true).await?;

        self.enabled = true;
        self.dek = Some(dek);
        info!(user_id = %self.user_id, "vault enabled");

        self.encrypt_all().await
    }

    /// Re-derive the data key from the password
    ///
    /// Any failure to unwrap the key is reported as `IncorrectPassword`; the
    /// vault stays locked and nothing persisted changes.
    pub async fn unlock(&mut self, password: &SecureString) -> LedgerResult<()> {
        if self.state() != VaultState::Locked {
            return Err(self.invalid("unlock"));
        }

        let dek = self.recover_dek(password).await.map_err(|e| {
            if e.is_password_rejected() {
                warn!(user_id = %self.user_id, "vault unlock failed");
            }
            e
        })?;

        self.dek = Some(dek);
        info!(user_id = %self.user_id, "vault unlocked");
        Ok(())
    }

    /// Discard the data key; a no-op unless unlocked
    pub fn lock(&mut self) {
        if self.dek.take().is_some() {
            info!(user_id = %self.user_id, "vault locked");
        }
    }

    /// Re-wrap the same data key under a new password with a fresh salt
    ///
    /// Leaves the vault unlocked on success. On a failed write the old
    /// password keeps working and the vault stays in its previous state.
    pub async fn change_master_password(
        &mut self,
        old_password: &SecureString,
        new_password: &SecureString,
    ) -> LedgerResult<()> {
        if self.state() == VaultState::Disabled {
            return Err(self.invalid("change the master password"));
        }
        if new_password.is_empty() {
            return Err(LedgerError::Validation("Password cannot be empty".into()));
        }

        let dek = self
            .recover_dek(old_password)
            .await
            .map_err(|e| match e {
                LedgerError::IncorrectPassword => LedgerError::IncorrectCurrentPassword,
                other => other,
            })?;

        let salt = KeyManager::generate_salt();
        let kek = derive_kek_off_thread(new_password, salt).await?;
        let wrapped = KeyManager::wrap_dek(&dek, &kek)?;
        drop(kek);

        self.keys.store_key_material(&salt, &wrapped).await?;
        self.dek = Some(dek);
        info!(user_id = %self.user_id, "vault master password changed");
        Ok(())
    }

    /// Decrypt every record and turn the vault off
    ///
    /// The password is always checked, even when already unlocked. The
    /// enabled flag is cleared before the key material is deleted; a failure
    /// to delete it afterwards is logged, since a disabled vault never reads it.
    pub async fn deactivate(&mut self, password: &SecureString) -> LedgerResult<TransitionReport> {
        if self.state() == VaultState::Disabled {
            return Err(self.invalid("disable the vault"));
        }

        let dek = self.recover_dek(password).await?;
        self.dek = Some(dek);

        let report = self.decrypt_all().await?;
        if !report.is_complete() {
            error!(
                user_id = %self.user_id,
                failed = report.failed(),
                "records left encrypted while disabling the vault"
            );
        }

        // Flag first: a vault left enabled must still have its key material
        self.keys.set_enabled(false).await?;
        self.enabled = false;
        self.dek = None;
        if let Err(e) = self.keys.clear_key_material().await {
            warn!(user_id = %self.user_id, error = %e, "stale vault key material left behind");
        }
        info!(user_id = %self.user_id, "vault disabled");

        Ok(report)
    }

    /// Encrypt every plaintext record of this user
    pub async fn encrypt_all(&self) -> LedgerResult<TransitionReport> {
        if !self.is_unlocked() {
            return Err(self.invalid("encrypt records"));
        }
        Ok(self.engine().encrypt_all().await)
    }

    /// Decrypt every encrypted record of this user
    pub async fn decrypt_all(&self) -> LedgerResult<TransitionReport> {
        if !self.is_unlocked() {
            return Err(self.invalid("decrypt records"));
        }
        Ok(self.engine().decrypt_all().await)
    }

    fn engine(&self) -> TransitionEngine<'_> {
        TransitionEngine::new(self.records.as_ref(), self.user_id, self.codec())
    }

    async fn recover_dek(&self, password: &SecureString) -> LedgerResult<DataKey> {
        let (salt, wrapped) = self.keys.load_key_material().await?;
        let kek = derive_kek_off_thread(password, salt).await?;
        KeyManager::unwrap_dek(&wrapped, &kek).map_err(|_| LedgerError::IncorrectPassword)
    }
}
