//! In-memory stores
//!
//! Same behaviour as the JSON stores without touching disk. Writes can be
//! made to fail per key or per record id to exercise partial-failure paths.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use super::records::JsonRecordStore;
use super::settings::JsonSettingsStore;
use super::{RecordStore, SettingsStore};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    RecordKind, RecurringId, RecurringTransaction, SensitiveRecord, StoredFields, Transaction,
    TransactionId, UserId,
};

fn injected(what: String) -> LedgerError {
    LedgerError::Storage(format!("injected failure: {}", what))
}

fn insert_into<T: std::hash::Hash + Eq>(set: &RwLock<HashSet<T>>, value: T) {
    if let Ok(mut set) = set.write() {
        set.insert(value);
    }
}

fn contains<T: std::hash::Hash + Eq>(set: &RwLock<HashSet<T>>, value: &T) -> bool {
    set.read().map(|set| set.contains(value)).unwrap_or(false)
}

/// Settings store that lives only as long as the process
pub struct MemorySettingsStore {
    inner: JsonSettingsStore,
    failing_keys: RwLock<HashSet<String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self {
            inner: JsonSettingsStore::unbacked(UserId::from(Uuid::nil())),
            failing_keys: RwLock::new(HashSet::new()),
        }
    }

    /// Make every later `set` or `delete` of `key` fail
    pub fn fail_writes_for(&self, key: &str) {
        insert_into(&self.failing_keys, key.to_string());
    }

    fn check(&self, key: &str) -> LedgerResult<()> {
        if contains(&self.failing_keys, &key.to_string()) {
            return Err(injected(format!("settings key {}", key)));
        }
        Ok(())
    }
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, key: &str) -> LedgerResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> LedgerResult<()> {
        self.check(key)?;
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> LedgerResult<()> {
        self.check(key)?;
        self.inner.delete(key).await
    }
}

/// Record store that lives only as long as the process
pub struct MemoryRecordStore {
    inner: JsonRecordStore,
    failing_ids: RwLock<HashSet<Uuid>>,
    failing_listings: RwLock<HashSet<RecordKind>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            inner: JsonRecordStore::unbacked(),
            failing_ids: RwLock::new(HashSet::new()),
            failing_listings: RwLock::new(HashSet::new()),
        }
    }

    /// Make every later write touching record `id` fail
    pub fn fail_writes_for(&self, id: Uuid) {
        insert_into(&self.failing_ids, id);
    }

    /// Make selecting records of `kind` by encryption state fail
    pub fn fail_listing_for(&self, kind: RecordKind) {
        insert_into(&self.failing_listings, kind);
    }

    fn check(&self, id: Uuid) -> LedgerResult<()> {
        if contains(&self.failing_ids, &id) {
            return Err(injected(format!("record {}", id)));
        }
        Ok(())
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_transaction(&self, txn: &Transaction) -> LedgerResult<()> {
        self.check(*txn.id.as_uuid())?;
        self.inner.insert_transaction(txn).await
    }

    async fn update_transaction(&self, txn: &Transaction) -> LedgerResult<()> {
        self.check(*txn.id.as_uuid())?;
        self.inner.update_transaction(txn).await
    }

    async fn get_transaction(
        &self,
        user_id: UserId,
        id: TransactionId,
    ) -> LedgerResult<Option<Transaction>> {
        self.inner.get_transaction(user_id, id).await
    }

    async fn list_transactions(&self, user_id: UserId) -> LedgerResult<Vec<Transaction>> {
        self.inner.list_transactions(user_id).await
    }

    async fn delete_transaction(&self, user_id: UserId, id: TransactionId) -> LedgerResult<bool> {
        self.check(*id.as_uuid())?;
        self.inner.delete_transaction(user_id, id).await
    }

    async fn detach_recurring(
        &self,
        user_id: UserId,
        recurring_id: RecurringId,
    ) -> LedgerResult<usize> {
        self.inner.detach_recurring(user_id, recurring_id).await
    }

    async fn insert_recurring(&self, rec: &RecurringTransaction) -> LedgerResult<()> {
        self.check(*rec.id.as_uuid())?;
        self.inner.insert_recurring(rec).await
    }

    async fn update_recurring(&self, rec: &RecurringTransaction) -> LedgerResult<()> {
        self.check(*rec.id.as_uuid())?;
        self.inner.update_recurring(rec).await
    }

    async fn get_recurring(
        &self,
        user_id: UserId,
        id: RecurringId,
    ) -> LedgerResult<Option<RecurringTransaction>> {
        self.inner.get_recurring(user_id, id).await
    }

    async fn list_recurring(&self, user_id: UserId) -> LedgerResult<Vec<RecurringTransaction>> {
        self.inner.list_recurring(user_id).await
    }

    async fn delete_recurring(&self, user_id: UserId, id: RecurringId) -> LedgerResult<bool> {
        self.check(*id.as_uuid())?;
        self.inner.delete_recurring(user_id, id).await
    }

    async fn select_by_encryption(
        &self,
        user_id: UserId,
        kind: RecordKind,
        is_encrypted: bool,
    ) -> LedgerResult<Vec<SensitiveRecord>> {
        if contains(&self.failing_listings, &kind) {
            return Err(injected(format!("{} listing", kind)));
        }
        self.inner
            .select_by_encryption(user_id, kind, is_encrypted)
            .await
    }

    async fn write_sensitive_fields(
        &self,
        user_id: UserId,
        kind: RecordKind,
        id: Uuid,
        fields: &StoredFields,
    ) -> LedgerResult<()> {
        self.check(id)?;
        self.inner
            .write_sensitive_fields(user_id, kind, id, fields)
            .await
    }
}
