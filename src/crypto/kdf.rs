//! Key derivation using PBKDF2-HMAC-SHA256
//!
//! Derives the key-encryption key from the master password and the stored
//! salt. The parameters are fixed: every client reading the same store must
//! derive the same key, so they are not user-configurable.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroize;

use super::keys::{KeyEncryptionKey, Salt, KEY_LEN};
use super::secure_memory::SecureString;
use crate::error::{LedgerError, LedgerResult};

/// PBKDF2 iteration count shared with every other client of the store
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Derive the key-encryption key from a password and salt
///
/// Deterministic: the same password and salt always give the same key.
pub fn derive_kek(password: &str, salt: &Salt) -> KeyEncryptionKey {
    let mut out = derive_bytes(password.as_bytes(), salt.as_bytes(), PBKDF2_ITERATIONS);
    let kek = KeyEncryptionKey::from_array(out);
    out.zeroize();
    kek
}

/// Derive from a raw salt, rejecting salts that are not exactly 32 bytes
pub fn derive_kek_from_raw(password: &str, salt: &[u8]) -> LedgerResult<KeyEncryptionKey> {
    let salt = Salt::from_bytes(salt)?;
    Ok(derive_kek(password, &salt))
}

/// Run [`derive_kek`] on the blocking pool so the executor is never stalled
pub async fn derive_kek_off_thread(
    password: &SecureString,
    salt: Salt,
) -> LedgerResult<KeyEncryptionKey> {
    let password = password.clone();
    tokio::task::spawn_blocking(move || derive_kek(password.as_str(), &salt))
        .await
        .map_err(|e| LedgerError::Crypto(format!("key derivation task failed: {}", e)))
}

fn derive_bytes(password: &[u8], salt: &[u8], iterations: u32) -> [u8; KEY_LEN] {
    let mut out = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    out
}
