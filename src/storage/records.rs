//! JSON-file record store
//!
//! Transactions live in `data/transactions.json` and recurring transactions
//! in `data/recurring.json`. Every write replaces the whole file atomically.

use async_trait::async_trait;
use uuid::Uuid;

use super::collection::Collection;
use super::RecordStore;
use crate::config::LedgerPaths;
use crate::error::LedgerResult;
use crate::models::{
    RecordKind, RecurringId, RecurringTransaction, SensitiveRecord, StoredFields, Transaction,
    TransactionId, UserId,
};

/// Record store backed by two JSON files
pub struct JsonRecordStore {
    transactions: Collection<Transaction>,
    recurring: Collection<RecurringTransaction>,
}

impl JsonRecordStore {
    /// Load both collections from the data directory
    pub fn open(paths: &LedgerPaths) -> LedgerResult<Self> {
        Ok(Self {
            transactions: Collection::load(paths.transactions_file())?,
            recurring: Collection::load(paths.recurring_file())?,
        })
    }

    pub(crate) fn unbacked() -> Self {
        Self {
            transactions: Collection::in_memory(),
            recurring: Collection::in_memory(),
        }
    }
}

#[async_trait]
impl RecordStore for JsonRecordStore {
    async fn insert_transaction(&self, txn: &Transaction) -> LedgerResult<()> {
        self.transactions.insert(txn)
    }

    async fn update_transaction(&self, txn: &Transaction) -> LedgerResult<()> {
        self.transactions.update(txn)
    }

    async fn get_transaction(
        &self,
        user_id: UserId,
        id: TransactionId,
    ) -> LedgerResult<Option<Transaction>> {
        self.transactions.get(user_id, *id.as_uuid())
    }

    async fn list_transactions(&self, user_id: UserId) -> LedgerResult<Vec<Transaction>> {
        let mut txns = self.transactions.list(user_id)?;
        txns.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        Ok(txns)
    }

    async fn delete_transaction(&self, user_id: UserId, id: TransactionId) -> LedgerResult<bool> {
        self.transactions.delete(user_id, *id.as_uuid())
    }

    async fn detach_recurring(
        &self,
        user_id: UserId,
        recurring_id: RecurringId,
    ) -> LedgerResult<usize> {
        self.transactions.modify_where(
            user_id,
            |txn| txn.recurring_id == Some(recurring_id),
            |txn| txn.recurring_id = None,
        )
    }

    async fn insert_recurring(&self, rec: &RecurringTransaction) -> LedgerResult<()> {
        self.recurring.insert(rec)
    }

    async fn update_recurring(&self, rec: &RecurringTransaction) -> LedgerResult<()> {
        self.recurring.update(rec)
    }

    async fn get_recurring(
        &self,
        user_id: UserId,
        id: RecurringId,
    ) -> LedgerResult<Option<RecurringTransaction>> {
        self.recurring.get(user_id, *id.as_uuid())
    }

    async fn list_recurring(&self, user_id: UserId) -> LedgerResult<Vec<RecurringTransaction>> {
        let mut recs = self.recurring.list(user_id)?;
        recs.sort_by(|a, b| {
            a.original_day
                .cmp(&b.original_day)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(recs)
    }

    async fn delete_recurring(&self, user_id: UserId, id: RecurringId) -> LedgerResult<bool> {
        self.recurring.delete(user_id, *id.as_uuid())
    }

    async fn select_by_encryption(
        &self,
        user_id: UserId,
        kind: RecordKind,
        is_encrypted: bool,
    ) -> LedgerResult<Vec<SensitiveRecord>> {
        match kind {
            RecordKind::Transaction => self.transactions.select_by_encryption(user_id, is_encrypted),
            RecordKind::Recurring => self.recurring.select_by_encryption(user_id, is_encrypted),
        }
    }

    async fn write_sensitive_fields(
        &self,
        user_id: UserId,
        kind: RecordKind,
        id: Uuid,
        fields: &StoredFields,
    ) -> LedgerResult<()> {
        match kind {
            RecordKind::Transaction => self.transactions.write_fields(user_id, id, fields),
            RecordKind::Recurring => self.recurring.write_fields(user_id, id, fields),
        }
    }
}
