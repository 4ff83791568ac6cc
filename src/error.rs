//! Custom error types for ledger-vault
//!
//! This module defines the error hierarchy for the application using thiserror
//! for ergonomic error definitions.

use thiserror::Error;

/// The main error type for ledger-vault operations
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Validation errors for data models
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Salt or key of the wrong length, or undecodable key material
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// The GCM tag did not verify (wrong key, corrupted or truncated data)
    #[error("Authentication failed: wrong key or corrupted data")]
    AuthenticationFailed,

    /// Cipher construction or random source failure
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Unlock failed; never says whether the password or the data was wrong
    #[error("Incorrect password")]
    IncorrectPassword,

    /// The current password given to a password change did not unwrap the key
    #[error("Incorrect current password")]
    IncorrectCurrentPassword,

    /// Vault marked enabled but its salt or wrapped key is missing
    #[error("Vault data not found")]
    SettingsUnavailable,

    /// A single record could not be written during a bulk transition
    #[error("Failed to write {record}: {reason}")]
    StoreWriteFailed { record: String, reason: String },

    /// A vault operation was called from a state that does not allow it
    #[error("Cannot {operation} while the vault is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },
}

impl LedgerError {
    /// Create a "not found" error for transactions
    pub fn transaction_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Transaction",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for recurring transactions
    pub fn recurring_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Recurring transaction",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this error means the supplied password was rejected
    pub fn is_password_rejected(&self) -> bool {
        matches!(
            self,
            Self::IncorrectPassword | Self::IncorrectCurrentPassword
        )
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for ledger-vault operations
pub type LedgerResult<T> = Result<T, LedgerError>;
