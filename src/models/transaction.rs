//! Transaction model
//!
//! A single dated movement of money on an account. The amount and note are
//! the sensitive columns and may be stored encrypted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::{AccountId, CategoryId, RecurringId, TransactionId, UserId};
use super::record::{EncryptableRecord, RecordKind, StoredFields};

/// A financial transaction as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier
    pub id: TransactionId,

    /// Owning user
    pub user_id: UserId,

    /// The account this transaction belongs to
    pub account_id: AccountId,

    /// Category of the transaction
    pub category_id: CategoryId,

    /// Amount and note, possibly encrypted
    #[serde(flatten)]
    pub fields: StoredFields,

    /// Transaction date
    pub date: NaiveDate,

    /// The recurring transaction that generated this one, if any
    #[serde(default)]
    pub recurring_id: Option<RecurringId>,

    /// When the transaction was created
    pub created_at: DateTime<Utc>,

    /// When the transaction was last modified
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a new transaction from already-encoded sensitive columns
    pub fn new(
        user_id: UserId,
        account_id: AccountId,
        category_id: CategoryId,
        date: NaiveDate,
        fields: StoredFields,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::new(),
            user_id,
            account_id,
            category_id,
            fields,
            date,
            recurring_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the amount and note hold ciphertext
    pub fn is_encrypted(&self) -> bool {
        self.fields.is_encrypted
    }

    /// Whether this transaction was generated from a recurring one
    pub fn is_generated(&self) -> bool {
        self.recurring_id.is_some()
    }
}

impl EncryptableRecord for Transaction {
    const KIND: RecordKind = RecordKind::Transaction;

    fn record_id(&self) -> Uuid {
        *self.id.as_uuid()
    }

    fn owner(&self) -> UserId {
        self.user_id
    }

    fn fields(&self) -> &StoredFields {
        &self.fields
    }

    fn fields_mut(&mut self) -> &mut StoredFields {
        &mut self.fields
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
