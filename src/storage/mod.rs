//! Storage layer for ledger-vault
//!
//! The vault talks to durable state only through two collaborator traits:
//! a per-user key-value [`SettingsStore`] and a [`RecordStore`] over the two
//! financial-record collections. JSON file implementations back the CLI;
//! in-memory ones back tests and embedders.

mod collection;
pub mod file_io;
pub mod memory;
pub mod records;
pub mod settings;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

pub use file_io::{read_json, write_json_atomic};
pub use memory::{MemoryRecordStore, MemorySettingsStore};
pub use records::JsonRecordStore;
pub use settings::{JsonSettingsStore, VaultSettings};

use crate::config::LedgerPaths;
use crate::error::LedgerResult;
use crate::models::{
    RecordKind, RecurringId, RecurringTransaction, SensitiveRecord, StoredFields, Transaction,
    TransactionId, UserId,
};

/// Key-value settings, already scoped to one user
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read a value; `None` when the key was never set or was deleted
    async fn get(&self, key: &str) -> LedgerResult<Option<String>>;

    /// Insert or replace a value
    async fn set(&self, key: &str, value: &str) -> LedgerResult<()>;

    /// Remove a key; removing an absent key succeeds
    async fn delete(&self, key: &str) -> LedgerResult<()>;
}

/// The transaction and recurring-transaction collections
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_transaction(&self, txn: &Transaction) -> LedgerResult<()>;

    async fn update_transaction(&self, txn: &Transaction) -> LedgerResult<()>;

    async fn get_transaction(
        &self,
        user_id: UserId,
        id: TransactionId,
    ) -> LedgerResult<Option<Transaction>>;

    async fn list_transactions(&self, user_id: UserId) -> LedgerResult<Vec<Transaction>>;

    async fn delete_transaction(&self, user_id: UserId, id: TransactionId) -> LedgerResult<bool>;

    /// Clear `recurring_id` on every transaction generated from `recurring_id`
    async fn detach_recurring(
        &self,
        user_id: UserId,
        recurring_id: RecurringId,
    ) -> LedgerResult<usize>;

    async fn insert_recurring(&self, rec: &RecurringTransaction) -> LedgerResult<()>;

    async fn update_recurring(&self, rec: &RecurringTransaction) -> LedgerResult<()>;

    async fn get_recurring(
        &self,
        user_id: UserId,
        id: RecurringId,
    ) -> LedgerResult<Option<RecurringTransaction>>;

    async fn list_recurring(&self, user_id: UserId) -> LedgerResult<Vec<RecurringTransaction>>;

    async fn delete_recurring(&self, user_id: UserId, id: RecurringId) -> LedgerResult<bool>;

    /// Records of one collection whose `is_encrypted` flag equals `is_encrypted`
    async fn select_by_encryption(
        &self,
        user_id: UserId,
        kind: RecordKind,
        is_encrypted: bool,
    ) -> LedgerResult<Vec<SensitiveRecord>>;

    /// Overwrite the amount, note and flag of a single record
    async fn write_sensitive_fields(
        &self,
        user_id: UserId,
        kind: RecordKind,
        id: Uuid,
        fields: &StoredFields,
    ) -> LedgerResult<()>;
}

/// Main storage coordinator handing out the shared collaborators
#[derive(Clone)]
pub struct Storage {
    pub settings: Arc<dyn SettingsStore>,
    pub records: Arc<dyn RecordStore>,
}

impl Storage {
    /// Open the JSON stores under `paths`, creating the data directory if needed
    pub fn open(paths: &LedgerPaths, user_id: UserId) -> LedgerResult<Self> {
        paths.ensure_directories()?;

        Ok(Self {
            settings: Arc::new(JsonSettingsStore::open(
                paths.user_settings_file(),
                user_id,
            )?),
            records: Arc::new(JsonRecordStore::open(paths)?),
        })
    }

    /// Storage that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            settings: Arc::new(MemorySettingsStore::new()),
            records: Arc::new(MemoryRecordStore::new()),
        }
    }
}
