//! Bulk transition engine
//!
//! Moves every record of a user between plaintext and encrypted form. Each
//! record is read, transformed and written on its own: a failure is logged,
//! counted, and the pass moves on. Only records still in the source state
//! are selected, so an interrupted pass can simply be run again.

use std::fmt;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::codec::FieldCodec;
use crate::error::LedgerError;
use crate::models::{RecordKind, SensitiveRecord, StoredFields, UserId};
use crate::storage::RecordStore;

/// Direction of a bulk pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    /// The `is_encrypted` value of records this pass selects
    fn source_state(self) -> bool {
        matches!(self, Self::Decrypt)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encrypt => write!(f, "encrypt"),
            Self::Decrypt => write!(f, "decrypt"),
        }
    }
}

/// Per-collection outcome of a pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindTally {
    pub transitioned: usize,
    pub failed: usize,
    /// Ids of the records counted in `failed`, left in their source state
    pub failed_ids: Vec<Uuid>,
    /// The collection could not be listed; nothing in it was attempted
    pub listing_failed: bool,
}

/// Outcome of `encrypt_all` or `decrypt_all`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionReport {
    pub direction: Direction,
    pub transactions: KindTally,
    pub recurring: KindTally,
}

impl TransitionReport {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            transactions: KindTally::default(),
            recurring: KindTally::default(),
        }
    }

    pub fn tally(&self, kind: RecordKind) -> &KindTally {
        match kind {
            RecordKind::Transaction => &self.transactions,
            RecordKind::Recurring => &self.recurring,
        }
    }

    fn tally_mut(&mut self, kind: RecordKind) -> &mut KindTally {
        match kind {
            RecordKind::Transaction => &mut self.transactions,
            RecordKind::Recurring => &mut self.recurring,
        }
    }

    pub fn transitioned(&self) -> usize {
        self.transactions.transitioned + self.recurring.transitioned
    }

    pub fn failed(&self) -> usize {
        self.transactions.failed + self.recurring.failed
    }

    /// True when every selected record was transitioned and both listings worked
    pub fn is_complete(&self) -> bool {
        self.failed() == 0 && !self.transactions.listing_failed && !self.recurring.listing_failed
    }
}

/// Walks both collections for one user, transforming records through a codec
pub struct TransitionEngine<'a> {
    records: &'a dyn RecordStore,
    user_id: UserId,
    codec: FieldCodec<'a>,
}

impl<'a> TransitionEngine<'a> {
    pub fn new(records: &'a dyn RecordStore, user_id: UserId, codec: FieldCodec<'a>) -> Self {
        Self {
            records,
            user_id,
            codec,
        }
    }

    /// Encrypt every plaintext record
    pub async fn encrypt_all(&self) -> TransitionReport {
        self.run(Direction::Encrypt).await
    }

    /// Decrypt every encrypted record
    pub async fn decrypt_all(&self) -> TransitionReport {
        self.run(Direction::Decrypt).await
    }

    async fn run(&self, direction: Direction) -> TransitionReport {
        let mut report = TransitionReport::new(direction);

        for kind in RecordKind::ALL {
            let selected = match self
                .records
                .select_by_encryption(self.user_id, kind, direction.source_state())
                .await
            {
                Ok(selected) => selected,
                Err(e) => {
                    error!(%kind, %direction, error = %e, "failed to list records for transition");
                    report.tally_mut(kind).listing_failed = true;
                    continue;
                }
            };

            debug!(%kind, %direction, count = selected.len(), "records selected");

            for record in selected {
                match self.transition(direction, &record).await {
                    Ok(()) => report.tally_mut(kind).transitioned += 1,
                    Err(e) => {
                        warn!(%kind, id = %record.id, %direction, error = %e, "record transition failed");
                        let tally = report.tally_mut(kind);
                        tally.failed += 1;
                        tally.failed_ids.push(record.id);
                    }
                }
            }
        }

        info!(
            %direction,
            transitioned = report.transitioned(),
            failed = report.failed(),
            "bulk transition finished"
        );
        report
    }

    async fn transition(
        &self,
        direction: Direction,
        record: &SensitiveRecord,
    ) -> Result<(), LedgerError> {
        let fields: StoredFields = match direction {
            Direction::Encrypt => self.codec.seal(&record.fields)?,
            Direction::Decrypt => self.codec.open(&record.fields)?,
        };

        self.records
            .write_sensitive_fields(self.user_id, record.kind, record.id, &fields)
            .await
            .map_err(|e| LedgerError::StoreWriteFailed {
                record: record.to_string(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::crypto::DataKey;
    use crate::models::{AccountId, CategoryId, Money, RecurringTransaction, Transaction};
    use crate::storage::MemoryRecordStore;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn seed(store: &MemoryRecordStore, user: UserId, amounts: &[&str]) -> Vec<Transaction> {
        let mut out = Vec::new();
        for (i, amount) in amounts.iter().enumerate() {
            let txn = Transaction::new(
                user,
                AccountId::new(),
                CategoryId::new(),
                ymd(2025, 1, i as u32 + 1),
                StoredFields::plain(*amount, Some(format!("note {}", i))),
            );
            store.insert_transaction(&txn).await.unwrap();
            out.push(txn);
        }
        out
    }

    #[tokio::test]
    async fn test_encrypt_all_then_decrypt_all() {
        let store = MemoryRecordStore::new();
        let user = UserId::new();
        seed(&store, user, &["1.5", "-20", "300.01"]).await;
        let rec = RecurringTransaction::new(
            user,
            AccountId::new(),
            CategoryId::new(),
            StoredFields::plain("-900", Some("rent".into())),
            1,
            ymd(2025, 1, 1),
        );
        store.insert_recurring(&rec).await.unwrap();

        let dek = DataKey::generate();
        let engine = TransitionEngine::new(&store, user, FieldCodec::new(Some(&dek)));

        let report = engine.encrypt_all().await;
        assert_eq!(report.transactions.transitioned, 3);
        assert_eq!(report.recurring.transitioned, 1);
        assert!(report.is_complete());
        assert!(store
            .select_by_encryption(user, RecordKind::Transaction, false)
            .await
            .unwrap()
            .is_empty());

        let report = engine.decrypt_all().await;
        assert_eq!(report.transitioned(), 4);

        let back = store.get_recurring(user, rec.id).await.unwrap().unwrap();
        assert_eq!(back.fields, StoredFields::plain("-900", Some("rent".into())));
    }

    #[tokio::test]
    async fn test_round_trip_keeps_amount_text() {
        let store = MemoryRecordStore::new();
        let user = UserId::new();
        let txns = seed(&store, user, &["0.125", "1234.5678"]).await;

        let dek = DataKey::generate();
        let engine = TransitionEngine::new(&store, user, FieldCodec::new(Some(&dek)));
        assert!(engine.encrypt_all().await.is_complete());
        assert!(engine.decrypt_all().await.is_complete());

        for (txn, amount) in txns.iter().zip(["0.125", "1234.5678"]) {
            let back = store.get_transaction(user, txn.id).await.unwrap().unwrap();
            assert!(!back.is_encrypted());
            assert_eq!(back.fields.amount, amount);
        }
    }

    #[tokio::test]
    async fn test_second_encrypt_all_is_a_no_op() {
        let store = MemoryRecordStore::new();
        let user = UserId::new();
        let txns = seed(&store, user, &["10"]).await;

        let dek = DataKey::generate();
        let engine = TransitionEngine::new(&store, user, FieldCodec::new(Some(&dek)));
        engine.encrypt_all().await;
        let first = store.get_transaction(user, txns[0].id).await.unwrap().unwrap();

        let report = engine.encrypt_all().await;
        assert_eq!(report.transitioned(), 0);
        let second = store.get_transaction(user, txns[0].id).await.unwrap().unwrap();
        assert_eq!(first.fields, second.fields);
    }

    #[tokio::test]
    async fn test_failed_record_does_not_abort_pass() {
        let store = MemoryRecordStore::new();
        let user = UserId::new();
        let txns = seed(&store, user, &["1", "2", "3"]).await;
        store.fail_writes_for(*txns[1].id.as_uuid());

        let dek = DataKey::generate();
        let engine = TransitionEngine::new(&store, user, FieldCodec::new(Some(&dek)));
        let report = engine.encrypt_all().await;

        assert_eq!(report.transactions.transitioned, 2);
        assert_eq!(report.transactions.failed, 1);
        assert_eq!(report.transactions.failed_ids, vec![*txns[1].id.as_uuid()]);
        assert!(!report.is_complete());

        let stuck = store.get_transaction(user, txns[1].id).await.unwrap().unwrap();
        assert!(!stuck.is_encrypted());
        for txn in [&txns[0], &txns[2]] {
            let done = store.get_transaction(user, txn.id).await.unwrap().unwrap();
            assert!(done.is_encrypted());
        }
    }

    #[tokio::test]
    async fn test_undecryptable_record_stays_encrypted() {
        let store = MemoryRecordStore::new();
        let user = UserId::new();
        seed(&store, user, &["4"]).await;

        let foreign = DataKey::generate();
        TransitionEngine::new(&store, user, FieldCodec::new(Some(&foreign)))
            .encrypt_all()
            .await;

        let dek = DataKey::generate();
        let report = TransitionEngine::new(&store, user, FieldCodec::new(Some(&dek)))
            .decrypt_all()
            .await;
        assert_eq!(report.transactions.failed, 1);

        let remaining = store
            .select_by_encryption(user, RecordKind::Transaction, true)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn test_listing_failure_is_reported() {
        let store = MemoryRecordStore::new();
        let user = UserId::new();
        seed(&store, user, &["8"]).await;
        store.fail_listing_for(RecordKind::Recurring);

        let dek = DataKey::generate();
        let report = TransitionEngine::new(&store, user, FieldCodec::new(Some(&dek)))
            .encrypt_all()
            .await;

        assert_eq!(report.transactions.transitioned, 1);
        assert!(report.recurring.listing_failed);
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn test_other_users_are_untouched() {
        let store = MemoryRecordStore::new();
        let user = UserId::new();
        let other = UserId::new();
        seed(&store, user, &["1"]).await;
        let theirs = seed(&store, other, &["2"]).await;

        let dek = DataKey::generate();
        TransitionEngine::new(&store, user, FieldCodec::new(Some(&dek)))
            .encrypt_all()
            .await;

        let untouched = store.get_transaction(other, theirs[0].id).await.unwrap().unwrap();
        assert!(!untouched.is_encrypted());
        assert_eq!(
            FieldCodec::passthrough().read(&untouched.fields).0.amount,
            Money::parse("2").unwrap()
        );
    }
}
