//! Key material types
//!
//! The salt is public and copyable. The data-encryption key (DEK) and the
//! key-encryption key (KEK) are secret: both zero their bytes on drop, never
//! print their contents, and cannot be cloned.

use std::fmt;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use base64::{engine::general_purpose::STANDARD, Engine};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{LedgerError, LedgerResult};

/// Length of every symmetric key in bytes (AES-256)
pub const KEY_LEN: usize = 32;

/// Length of the KDF salt in bytes
pub const SALT_LEN: usize = 32;

/// Anything usable as an AES-256-GCM key
pub trait CipherKey {
    /// The raw key bytes, borrowed for the duration of one cipher call
    fn key_bytes(&self) -> &[u8; KEY_LEN];
}

/// Random salt bound to a master password
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Salt([u8; SALT_LEN]);

impl Salt {
    /// Generate a fresh random salt
    pub fn generate() -> Self {
        let mut bytes = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Build a salt from raw bytes, rejecting any length other than 32
    pub fn from_bytes(bytes: &[u8]) -> LedgerResult<Self> {
        let array: [u8; SALT_LEN] = bytes.try_into().map_err(|_| {
            LedgerError::InvalidKeyMaterial(format!(
                "salt must be {} bytes, got {}",
                SALT_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Get the salt bytes
    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }

    /// Encode for storage in a text column
    pub fn encode(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// Decode a stored salt
    pub fn decode(encoded: &str) -> LedgerResult<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| LedgerError::InvalidKeyMaterial(format!("invalid salt encoding: {}", e)))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Salt").field(&self.encode()).finish()
    }
}

/// The per-user data-encryption key
///
/// Lives in memory only while the vault is unlocked. It is persisted only
/// inside its own envelope, wrapped by a [`KeyEncryptionKey`].
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DataKey([u8; KEY_LEN]);

impl DataKey {
    /// Generate a fresh random DEK
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        let key = Self(bytes);
        bytes.zeroize();
        key
    }

    /// Rebuild a DEK from unwrapped bytes
    pub fn from_bytes(bytes: &[u8]) -> LedgerResult<Self> {
        let mut array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            LedgerError::InvalidKeyMaterial(format!(
                "data key must be {} bytes, got {}",
                KEY_LEN,
                bytes.len()
            ))
        })?;
        let key = Self(array);
        array.zeroize();
        Ok(key)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl CipherKey for DataKey {
    fn key_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataKey([REDACTED])")
    }
}

/// Key derived from the master password; only ever wraps or unwraps the DEK
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyEncryptionKey([u8; KEY_LEN]);

impl KeyEncryptionKey {
    pub(crate) fn from_array(mut bytes: [u8; KEY_LEN]) -> Self {
        let key = Self(bytes);
        bytes.zeroize();
        key
    }
}

impl CipherKey for KeyEncryptionKey {
    fn key_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for KeyEncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyEncryptionKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_salt_encode_decode() {
        let salt = Salt::generate();
        let decoded = Salt::decode(&salt.encode()).unwrap();
        assert_eq!(salt, decoded);
    }

    #[test]
    fn test_salts_are_random() {
        assert_ne!(Salt::generate(), Salt::generate());
    }

    #[test]
    fn test_salt_wrong_length_rejected() {
        let err = Salt::from_bytes(&[0u8; 16]).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidKeyMaterial(_)));

        let short = STANDARD.encode([1u8; 31]);
        assert!(matches!(
            Salt::decode(&short),
            Err(LedgerError::InvalidKeyMaterial(_))
        ));
    }

    #[test]
    fn test_salt_bad_encoding_rejected() {
        assert!(matches!(
            Salt::decode("not base64!!"),
            Err(LedgerError::InvalidKeyMaterial(_))
        ));
    }

    #[test]
    fn test_data_keys_are_random() {
        let a = DataKey::generate();
        let b = DataKey::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_data_key_from_bytes() {
        let key = DataKey::from_bytes(&[7u8; KEY_LEN]).unwrap();
        assert_eq!(key.as_bytes(), &[7u8; KEY_LEN]);
        assert!(DataKey::from_bytes(&[7u8; 12]).is_err());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let key = DataKey::from_bytes(&[0xAB; KEY_LEN]).unwrap();
        let debug = format!("{:?}", key);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("171"));
    }
}
