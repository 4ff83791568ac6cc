//! Sensitive columns shared by both financial-record collections
//!
//! Transactions and recurring transactions each carry an `amount`, an
//! optional `note` and an `is_encrypted` flag. When the flag is set, both
//! columns hold base64 envelopes; otherwise they hold raw values.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::ids::UserId;

/// Which collection a record lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Transaction,
    Recurring,
}

impl RecordKind {
    /// Every collection the vault protects
    pub const ALL: [RecordKind; 2] = [RecordKind::Transaction, RecordKind::Recurring];
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transaction => write!(f, "transaction"),
            Self::Recurring => write!(f, "recurring transaction"),
        }
    }
}

/// The amount and note columns exactly as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFields {
    /// Decimal string, or a base64 envelope when encrypted
    pub amount: String,

    /// Free text, or a base64 envelope when encrypted
    #[serde(default)]
    pub note: Option<String>,

    /// Whether `amount` and `note` hold ciphertext
    #[serde(default)]
    pub is_encrypted: bool,
}

impl StoredFields {
    /// Plaintext columns
    pub fn plain(amount: impl Into<String>, note: Option<String>) -> Self {
        Self {
            amount: amount.into(),
            note,
            is_encrypted: false,
        }
    }
}

/// Any persisted record carrying sensitive columns
pub trait EncryptableRecord {
    /// The collection this record type belongs to
    const KIND: RecordKind;

    /// Raw record id
    fn record_id(&self) -> Uuid;

    /// Owning user
    fn owner(&self) -> UserId;

    /// The sensitive columns
    fn fields(&self) -> &StoredFields;

    /// Mutable access to the sensitive columns
    fn fields_mut(&mut self) -> &mut StoredFields;

    /// Stamp the record as modified
    fn touch(&mut self);
}

/// A record's identity plus its sensitive columns, as selected for a bulk transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensitiveRecord {
    pub kind: RecordKind,
    pub id: Uuid,
    pub fields: StoredFields,
}

impl SensitiveRecord {
    /// Snapshot the sensitive part of a record
    pub fn of<T: EncryptableRecord>(record: &T) -> Self {
        Self {
            kind: T::KIND,
            id: record.record_id(),
            fields: record.fields().clone(),
        }
    }
}

impl fmt::Display for SensitiveRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}
