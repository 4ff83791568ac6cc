//! Transaction service
//!
//! Creates, updates and lists transactions. Sensitive columns always go
//! through the vault's field codec, so they are encrypted whenever the vault
//! is unlocked.

use chrono::NaiveDate;
use tracing::debug;

use super::RecordView;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{AccountId, CategoryId, Money, Transaction, TransactionId};
use crate::vault::Vault;

/// A transaction with its amount and note decoded
pub type TransactionView = RecordView<Transaction>;

/// Service for transaction management
pub struct TransactionService<'a> {
    vault: &'a Vault,
}

/// Options for filtering transactions
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Filter by account
    pub account_id: Option<AccountId>,
    /// Filter by category
    pub category_id: Option<CategoryId>,
    /// Filter by date range start
    pub start_date: Option<NaiveDate>,
    /// Filter by date range end
    pub end_date: Option<NaiveDate>,
    /// Maximum number of transactions to return
    pub limit: Option<usize>,
}

impl TransactionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Filter by date range (inclusive)
    pub fn date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, txn: &Transaction) -> bool {
        self.account_id.map_or(true, |id| txn.account_id == id)
            && self.category_id.map_or(true, |id| txn.category_id == id)
            && self.start_date.map_or(true, |start| txn.date >= start)
            && self.end_date.map_or(true, |end| txn.date <= end)
    }
}

/// Input for creating a new transaction
#[derive(Debug, Clone)]
pub struct CreateTransactionInput {
    pub account_id: AccountId,
    pub category_id: CategoryId,
    pub date: NaiveDate,
    pub amount: Money,
    pub note: Option<String>,
}

/// Fields to change on an existing transaction; `None` leaves a field alone
#[derive(Debug, Clone, Default)]
pub struct UpdateTransactionInput {
    pub account_id: Option<AccountId>,
    pub category_id: Option<CategoryId>,
    pub date: Option<NaiveDate>,
    pub amount: Option<Money>,
    /// `Some(None)` clears the note
    pub note: Option<Option<String>>,
}

impl UpdateTransactionInput {
    fn touches_sensitive(&self) -> bool {
        self.amount.is_some() || self.note.is_some()
    }
}

impl<'a> TransactionService<'a> {
    pub fn new(vault: &'a Vault) -> Self {
        Self { vault }
    }

    /// Create a transaction, encrypting amount and note when the vault is unlocked
    pub async fn create(&self, input: CreateTransactionInput) -> LedgerResult<TransactionView> {
        let fields = self
            .vault
            .codec()
            .encrypt_field(input.amount, input.note.as_deref())?;

        let txn = Transaction::new(
            self.vault.user_id(),
            input.account_id,
            input.category_id,
            input.date,
            fields,
        );
        self.vault.records().insert_transaction(&txn).await?;

        debug!(id = %txn.id, encrypted = txn.is_encrypted(), "transaction created");
        Ok(self.view(txn))
    }

    /// Update a transaction
    ///
    /// Changing the amount or note re-encodes both. That needs the current
    /// plaintext, so it is refused for an encrypted row while the vault is locked.
    pub async fn update(
        &self,
        id: TransactionId,
        input: UpdateTransactionInput,
    ) -> LedgerResult<TransactionView> {
        let mut txn = self.get_raw(id).await?;

        if input.touches_sensitive() {
            let codec = self.vault.codec();
            if txn.is_encrypted() && !codec.is_unlocked() {
                return Err(LedgerError::InvalidState {
                    operation: "change the amount or note of an encrypted transaction",
                    state: self.vault.state().to_string(),
                });
            }

            let current = self.view(txn.clone());
            if !current.access.is_known() {
                return Err(LedgerError::Crypto(format!(
                    "transaction {} cannot be decrypted",
                    txn.id
                )));
            }

            let amount = input.amount.unwrap_or(current.amount);
            let note = input.note.clone().unwrap_or(current.note);
            txn.fields = codec.encrypt_field(amount, note.as_deref())?;
        }

        if let Some(account_id) = input.account_id {
            txn.account_id = account_id;
        }
        if let Some(category_id) = input.category_id {
            txn.category_id = category_id;
        }
        if let Some(date) = input.date {
            txn.date = date;
        }
        txn.updated_at = chrono::Utc::now();

        self.vault.records().update_transaction(&txn).await?;
        debug!(id = %txn.id, "transaction updated");
        Ok(self.view(txn))
    }

    /// Get a transaction by ID
    pub async fn get(&self, id: TransactionId) -> LedgerResult<TransactionView> {
        let txn = self.get_raw(id).await?;
        Ok(self.view(txn))
    }

    /// List transactions, newest first, decrypting where possible
    pub async fn list(&self, filter: TransactionFilter) -> LedgerResult<Vec<TransactionView>> {
        let txns = self
            .vault
            .records()
            .list_transactions(self.vault.user_id())
            .await?;

        let views = txns
            .into_iter()
            .filter(|txn| filter.matches(txn))
            .take(filter.limit.unwrap_or(usize::MAX))
            .map(|txn| self.view(txn))
            .collect();
        Ok(views)
    }

    /// Delete a transaction
    pub async fn delete(&self, id: TransactionId) -> LedgerResult<()> {
        let deleted = self
            .vault
            .records()
            .delete_transaction(self.vault.user_id(), id)
            .await?;
        if !deleted {
            return Err(LedgerError::transaction_not_found(id.to_string()));
        }
        debug!(id = %id, "transaction deleted");
        Ok(())
    }

    async fn get_raw(&self, id: TransactionId) -> LedgerResult<Transaction> {
        self.vault
            .records()
            .get_transaction(self.vault.user_id(), id)
            .await?
            .ok_or_else(|| LedgerError::transaction_not_found(id.to_string()))
    }

    fn view(&self, txn: Transaction) -> TransactionView {
        RecordView::decode(txn, &self.vault.codec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SecureString;
    use crate::storage::Storage;
    use crate::models::UserId;
    use crate::vault::FieldAccess;

    async fn setup() -> Vault {
        let storage = Storage::in_memory();
        Vault::open(&storage, UserId::new()).await.unwrap()
    }

    fn input(amount: &str, note: Option<&str>) -> CreateTransactionInput {
        CreateTransactionInput {
            account_id: AccountId::new(),
            category_id: CategoryId::new(),
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            amount: Money::parse(amount).unwrap(),
            note: note.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_create_plaintext_when_disabled() {
        let vault = setup().await;
        let service = TransactionService::new(&vault);

        let view = service.create(input("-12.34", Some("coffee"))).await.unwrap();
        assert!(!view.record.is_encrypted());
        assert_eq!(view.record.fields.amount, "-12.34");
        assert_eq!(view.access, FieldAccess::Plain);
    }

    #[tokio::test]
    async fn test_create_encrypted_when_unlocked() {
        let mut vault = setup().await;
        vault.activate(&SecureString::new("Secret123")).await.unwrap();
        let service = TransactionService::new(&vault);

        let view = service.create(input("42.50", Some("lunch"))).await.unwrap();
        assert!(view.record.is_encrypted());
        assert_ne!(view.record.fields.amount, "42.5");
        assert_eq!(view.amount, Money::parse("42.50").unwrap());
        assert_eq!(view.note.as_deref(), Some("lunch"));
    }

    #[tokio::test]
    async fn test_list_while_locked_hides_encrypted_values() {
        let mut vault = setup().await;
        vault.activate(&SecureString::new("Secret123")).await.unwrap();
        TransactionService::new(&vault)
            .create(input("42.50", Some("lunch")))
            .await
            .unwrap();
        vault.lock();

        let views = TransactionService::new(&vault)
            .list(TransactionFilter::new())
            .await
            .unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].access, FieldAccess::Locked);
        assert_eq!(views[0].amount, Money::zero());
        assert!(views[0].note.is_none());
    }

    #[tokio::test]
    async fn test_update_non_sensitive_while_locked() {
        let mut vault = setup().await;
        vault.activate(&SecureString::new("Secret123")).await.unwrap();
        let created = TransactionService::new(&vault)
            .create(input("5", None))
            .await
            .unwrap();
        vault.lock();

        let service = TransactionService::new(&vault);
        let new_date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let updated = service
            .update(
                created.record.id,
                UpdateTransactionInput {
                    date: Some(new_date),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.record.date, new_date);
        assert_eq!(updated.record.fields, created.record.fields);

        let err = service
            .update(
                created.record.id,
                UpdateTransactionInput {
                    amount: Some(Money::from_cents(100)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_update_note_keeps_amount() {
        let mut vault = setup().await;
        vault.activate(&SecureString::new("Secret123")).await.unwrap();
        let service = TransactionService::new(&vault);
        let created = service.create(input("8.25", Some("old"))).await.unwrap();

        let updated = service
            .update(
                created.record.id,
                UpdateTransactionInput {
                    note: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.record.is_encrypted());
        assert_eq!(updated.amount, Money::parse("8.25").unwrap());
        assert!(updated.note.is_none());
    }

    #[tokio::test]
    async fn test_filter_and_limit() {
        let vault = setup().await;
        let service = TransactionService::new(&vault);
        let first = service.create(input("1", None)).await.unwrap();
        service.create(input("2", None)).await.unwrap();

        let by_account = service
            .list(TransactionFilter::new().account(first.record.account_id))
            .await
            .unwrap();
        assert_eq!(by_account.len(), 1);

        let limited = service.list(TransactionFilter::new().limit(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let vault = setup().await;
        let err = TransactionService::new(&vault)
            .delete(TransactionId::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
