//! AES-256-GCM envelope encryption
//!
//! Every envelope is laid out as `nonce (12 bytes) || ciphertext || tag (16 bytes)`,
//! the same layout other clients of the store read and write. The nonce is
//! generated inside [`encrypt`] on every call; no API accepts a caller nonce.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine};

use super::keys::CipherKey;
use crate::error::{LedgerError, LedgerResult};

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_LEN: usize = 12;

/// Size of the GCM authentication tag in bytes
pub const TAG_LEN: usize = 16;

fn cipher_for(key: &impl CipherKey) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.key_bytes()))
}

/// Encrypt plaintext bytes into a self-contained envelope
pub fn encrypt(plaintext: &[u8], key: &impl CipherKey) -> LedgerResult<Vec<u8>> {
    let cipher = cipher_for(key);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    // aes-gcm appends the tag to the ciphertext
    let sealed = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| LedgerError::Crypto(format!("encryption failed: {}", e)))?;

    let mut envelope = Vec::with_capacity(NONCE_LEN + sealed.len());
    envelope.extend_from_slice(&nonce_bytes);
    envelope.extend_from_slice(&sealed);
    Ok(envelope)
}

/// Decrypt an envelope produced by [`encrypt`]
///
/// Fails with [`LedgerError::AuthenticationFailed`] for a wrong key, any
/// modified byte, or an envelope too short to hold a nonce and tag.
pub fn decrypt(envelope: &[u8], key: &impl CipherKey) -> LedgerResult<Vec<u8>> {
    if envelope.len() < NONCE_LEN + TAG_LEN {
        return Err(LedgerError::AuthenticationFailed);
    }

    let (nonce_bytes, sealed) = envelope.split_at(NONCE_LEN);
    let cipher = cipher_for(key);

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), sealed)
        .map_err(|_| LedgerError::AuthenticationFailed)
}

/// Encrypt a string and encode the envelope as base64 for a text column
pub fn encrypt_string(plaintext: &str, key: &impl CipherKey) -> LedgerResult<String> {
    let envelope = encrypt(plaintext.as_bytes(), key)?;
    Ok(STANDARD.encode(envelope))
}

/// Decode a base64 envelope and decrypt it to a string
pub fn decrypt_string(encoded: &str, key: &impl CipherKey) -> LedgerResult<String> {
    // Undecodable text cannot be authenticated either
    let envelope = STANDARD
        .decode(encoded.trim())
        .map_err(|_| LedgerError::AuthenticationFailed)?;
    let plaintext = decrypt(&envelope, key)?;
    String::from_utf8(plaintext)
        .map_err(|e| LedgerError::Crypto(format!("invalid UTF-8 in decrypted data: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::DataKey;

    #[test]
    fn test_encrypt_decrypt() {
        let key = DataKey::generate();
        let plaintext = b"Hello, World!";

        let envelope = encrypt(plaintext, &key).unwrap();
        let decrypted = decrypt(&envelope, &key).unwrap();

        assert_eq!(plaintext, decrypted.as_slice());
    }

    #[test]
    fn test_envelope_layout() {
        let key = DataKey::generate();
        let envelope = encrypt(b"hello", &key).unwrap();
        assert_eq!(envelope.len(), NONCE_LEN + 5 + TAG_LEN);
    }

    #[test]
    fn test_roundtrip_various_lengths() {
        let key = DataKey::generate();
        for len in [0usize, 1, 15, 16, 17, 255, 4096] {
            let plaintext: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let envelope = encrypt(&plaintext, &key).unwrap();
            assert_eq!(decrypt(&envelope, &key).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_different_nonces() {
        let key = DataKey::generate();
        let plaintext = b"Hello, World!";

        let first = encrypt(plaintext, &key).unwrap();
        let second = encrypt(plaintext, &key).unwrap();

        assert_ne!(first[..NONCE_LEN], second[..NONCE_LEN]);
        assert_ne!(first, second);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = DataKey::generate();
        let key2 = DataKey::generate();

        let envelope = encrypt(b"Hello, World!", &key1).unwrap();

        let result = decrypt(&envelope, &key2);
        assert!(matches!(result, Err(LedgerError::AuthenticationFailed)));
    }

    #[test]
    fn test_every_bit_flip_detected() {
        let key = DataKey::generate();
        let envelope = encrypt(b"42.5", &key).unwrap();

        for byte in 0..envelope.len() {
            for bit in 0..8 {
                let mut tampered = envelope.clone();
                tampered[byte] ^= 1 << bit;
                assert!(
                    matches!(decrypt(&tampered, &key), Err(LedgerError::AuthenticationFailed)),
                    "flip of byte {} bit {} went undetected",
                    byte,
                    bit
                );
            }
        }
    }

    #[test]
    fn test_truncated_envelope_fails() {
        let key = DataKey::generate();
        let envelope = encrypt(b"lunch", &key).unwrap();

        for len in [0, 5, NONCE_LEN, NONCE_LEN + TAG_LEN - 1, envelope.len() - 1] {
            assert!(matches!(
                decrypt(&envelope[..len], &key),
                Err(LedgerError::AuthenticationFailed)
            ));
        }
    }

    #[test]
    fn test_encrypt_decrypt_string() {
        let key = DataKey::generate();

        let encoded = encrypt_string("lunch with Sam", &key).unwrap();
        assert_ne!(encoded, "lunch with Sam");
        assert_eq!(decrypt_string(&encoded, &key).unwrap(), "lunch with Sam");
    }

    #[test]
    fn test_decrypt_string_rejects_garbage() {
        let key = DataKey::generate();
        assert!(matches!(
            decrypt_string("42.50", &key),
            Err(LedgerError::AuthenticationFailed)
        ));
        assert!(matches!(
            decrypt_string("%%%", &key),
            Err(LedgerError::AuthenticationFailed)
        ));
    }
}
