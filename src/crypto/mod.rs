//! Cryptographic primitives for ledger-vault
//!
//! Provides AES-256-GCM envelope encryption with PBKDF2-HMAC-SHA256 key
//! derivation, plus zeroizing key and password types.

pub mod cipher;
pub mod kdf;
pub mod keys;
pub mod secure_memory;

pub use cipher::{decrypt, decrypt_string, encrypt, encrypt_string};
pub use kdf::{derive_kek, derive_kek_off_thread, PBKDF2_ITERATIONS};
pub use keys::{CipherKey, DataKey, KeyEncryptionKey, Salt};
pub use secure_memory::SecureString;
