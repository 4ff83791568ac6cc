//! Recurring transaction service
//!
//! Monthly templates plus the generator that books the transactions they
//! owe. Generated transactions inherit the template's encryption state, so
//! an encrypted template produces encrypted transactions even while the
//! vault is locked.

use chrono::{NaiveDate, Utc};
use tracing::{debug, error, info, warn};

use super::RecordView;
use crate::error::{LedgerError, LedgerResult};
use crate::models::recurring::{clamp_day_to_month, first_of_month, next_month};
use crate::models::{
    AccountId, CategoryId, Money, RecurringId, RecurringTransaction, StoredFields, Transaction,
};
use crate::vault::{FieldCodec, Vault};

/// A recurring transaction with its amount and note decoded
pub type RecurringView = RecordView<RecurringTransaction>;

/// Input for creating a recurring transaction
#[derive(Debug, Clone)]
pub struct CreateRecurringInput {
    pub account_id: AccountId,
    pub category_id: CategoryId,
    pub amount: Money,
    pub note: Option<String>,
    /// Day of month, 1-31
    pub original_day: u32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

/// Fields to change on a recurring transaction; `None` leaves a field alone
#[derive(Debug, Clone, Default)]
pub struct UpdateRecurringInput {
    pub account_id: Option<AccountId>,
    pub category_id: Option<CategoryId>,
    pub amount: Option<Money>,
    pub note: Option<Option<String>>,
    pub original_day: Option<u32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<Option<NaiveDate>>,
}

fn validate_schedule(
    original_day: u32,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
) -> LedgerResult<()> {
    if !(1..=31).contains(&original_day) {
        return Err(LedgerError::Validation(format!(
            "Day of month must be between 1 and 31, got {}",
            original_day
        )));
    }
    if end_date.is_some_and(|end| end < start_date) {
        return Err(LedgerError::Validation(
            "End date cannot be before start date".into(),
        ));
    }
    Ok(())
}

/// The occurrence in `month`, or the next month's if that would precede the start date
fn occurrence_from(rec: &RecurringTransaction, month: NaiveDate) -> NaiveDate {
    let date = clamp_day_to_month(rec.original_day, month);
    if date < rec.start_date {
        clamp_day_to_month(rec.original_day, next_month(month))
    } else {
        date
    }
}

fn first_pending_month(rec: &RecurringTransaction) -> NaiveDate {
    match rec.last_generated {
        Some(last) => next_month(last),
        None => first_of_month(rec.start_date),
    }
}

/// Next date `rec` will generate a transaction for
///
/// `None` when inactive or when the next occurrence falls after the end date.
pub fn calculate_next_date(rec: &RecurringTransaction) -> Option<NaiveDate> {
    if !rec.is_active {
        return None;
    }

    let date = occurrence_from(rec, first_pending_month(rec));
    if rec.has_ended_by(date) {
        return None;
    }
    Some(date)
}

/// Service for recurring transaction management
pub struct RecurringService<'a> {
    vault: &'a Vault,
}

impl<'a> RecurringService<'a> {
    pub fn new(vault: &'a Vault) -> Self {
        Self { vault }
    }

    /// Create an active recurring transaction
    pub async fn create(&self, input: CreateRecurringInput) -> LedgerResult<RecurringView> {
        validate_schedule(input.original_day, input.start_date, input.end_date)?;

        let fields = self
            .vault
            .codec()
            .encrypt_field(input.amount, input.note.as_deref())?;

        let mut rec = RecurringTransaction::new(
            self.vault.user_id(),
            input.account_id,
            input.category_id,
            fields,
            input.original_day,
            input.start_date,
        );
        rec.end_date = input.end_date;

        self.vault.records().insert_recurring(&rec).await?;
        debug!(id = %rec.id, encrypted = rec.is_encrypted(), "recurring transaction created");
        Ok(self.view(rec))
    }

    /// Update a recurring transaction
    ///
    /// Changing amount or note of an encrypted template requires the vault
    /// to be unlocked.
    pub async fn update(
        &self,
        id: RecurringId,
        input: UpdateRecurringInput,
    ) -> LedgerResult<RecurringView> {
        let mut rec = self.get_raw(id).await?;

        if input.amount.is_some() || input.note.is_some() {
            let codec = self.vault.codec();
            if rec.is_encrypted() && !codec.is_unlocked() {
                return Err(LedgerError::InvalidState {
                    operation: "change the amount or note of an encrypted recurring transaction",
                    state: self.vault.state().to_string(),
                });
            }

            let current = self.view(rec.clone());
            if !current.access.is_known() {
                return Err(LedgerError::Crypto(format!(
                    "recurring transaction {} cannot be decrypted",
                    rec.id
                )));
            }

            let amount = input.amount.unwrap_or(current.amount);
            let note = input.note.clone().unwrap_or(current.note);
            rec.fields = codec.encrypt_field(amount, note.as_deref())?;
        }

        if let Some(account_id) = input.account_id {
            rec.account_id = account_id;
        }
        if let Some(category_id) = input.category_id {
            rec.category_id = category_id;
        }
        if let Some(day) = input.original_day {
            rec.original_day = day;
        }
        if let Some(start) = input.start_date {
            rec.start_date = start;
        }
        if let Some(end) = input.end_date {
            rec.end_date = end;
        }
        validate_schedule(rec.original_day, rec.start_date, rec.end_date)?;
        rec.updated_at = Utc::now();

        self.vault.records().update_recurring(&rec).await?;
        debug!(id = %rec.id, "recurring transaction updated");
        Ok(self.view(rec))
    }

    /// Flip the active flag; returns the updated record
    pub async fn toggle_active(&self, id: RecurringId) -> LedgerResult<RecurringView> {
        let mut rec = self.get_raw(id).await?;
        rec.is_active = !rec.is_active;
        rec.updated_at = Utc::now();

        self.vault.records().update_recurring(&rec).await?;
        debug!(id = %rec.id, active = rec.is_active, "recurring transaction toggled");
        Ok(self.view(rec))
    }

    /// Delete a recurring transaction, detaching the transactions it generated
    ///
    /// Returns how many transactions were detached.
    pub async fn delete(&self, id: RecurringId) -> LedgerResult<usize> {
        let user_id = self.vault.user_id();
        self.get_raw(id).await?;

        let detached = self.vault.records().detach_recurring(user_id, id).await?;
        self.vault.records().delete_recurring(user_id, id).await?;

        debug!(id = %id, detached, "recurring transaction deleted");
        Ok(detached)
    }

    pub async fn get(&self, id: RecurringId) -> LedgerResult<RecurringView> {
        let rec = self.get_raw(id).await?;
        Ok(self.view(rec))
    }

    pub async fn list(&self) -> LedgerResult<Vec<RecurringView>> {
        let recs = self
            .vault
            .records()
            .list_recurring(self.vault.user_id())
            .await?;
        Ok(recs.into_iter().map(|rec| self.view(rec)).collect())
    }

    /// Book every transaction owed up to and including `today`
    ///
    /// Walks each active template month by month from the month after its
    /// last generation (or its start month). A failure stops that template
    /// without advancing `last_generated`, so the month is retried next run.
    /// Returns how many transactions were created.
    pub async fn generate_pending(&self, today: NaiveDate) -> LedgerResult<usize> {
        let recs = self
            .vault
            .records()
            .list_recurring(self.vault.user_id())
            .await?;
        let codec = self.vault.codec();
        let mut generated = 0;

        for mut rec in recs.into_iter().filter(|rec| rec.is_active) {
            let mut month = first_pending_month(&rec);

            while month <= today {
                let date = occurrence_from(&rec, month);
                if date > today || rec.has_ended_by(date) {
                    break;
                }

                match self.generate_one(&mut rec, date, &codec).await {
                    Ok(()) => generated += 1,
                    Err(e) => {
                        warn!(id = %rec.id, %date, error = %e, "recurring generation failed");
                        break;
                    }
                }
                month = next_month(date);
            }
        }

        if generated > 0 {
            info!(generated, "pending recurring transactions generated");
        }
        Ok(generated)
    }

    async fn generate_one(
        &self,
        rec: &mut RecurringTransaction,
        date: NaiveDate,
        codec: &FieldCodec<'_>,
    ) -> LedgerResult<()> {
        let fields = inherited_fields(&rec.fields, codec)?;

        let mut txn = Transaction::new(
            rec.user_id,
            rec.account_id,
            rec.category_id,
            date,
            fields,
        );
        txn.recurring_id = Some(rec.id);
        self.vault.records().insert_transaction(&txn).await?;

        let previous = rec.last_generated.replace(date);
        rec.updated_at = Utc::now();
        if let Err(e) = self.vault.records().update_recurring(rec).await {
            // Without the new last_generated the month would be booked again
            rec.last_generated = previous;
            if let Err(undo) = self
                .vault
                .records()
                .delete_transaction(rec.user_id, txn.id)
                .await
            {
                error!(recurring_id = %rec.id, id = %txn.id, error = %undo, "failed to remove generated transaction");
            }
            return Err(e);
        }

        debug!(recurring_id = %rec.id, id = %txn.id, %date, "recurring transaction generated");
        Ok(())
    }

    async fn get_raw(&self, id: RecurringId) -> LedgerResult<RecurringTransaction> {
        self.vault
            .records()
            .get_recurring(self.vault.user_id(), id)
            .await?
            .ok_or_else(|| LedgerError::recurring_not_found(id.to_string()))
    }

    fn view(&self, rec: RecurringTransaction) -> RecurringView {
        RecordView::decode(rec, &self.vault.codec())
    }
}

/// Columns for a generated transaction
///
/// Ciphertext is copied as is; plaintext is encrypted when the codec can.
fn inherited_fields(template: &StoredFields, codec: &FieldCodec<'_>) -> LedgerResult<StoredFields> {
    if template.is_encrypted || !codec.is_unlocked() {
        return Ok(template.clone());
    }

    let plain = FieldCodec::passthrough().decrypt_field(&template.amount, template.note.as_deref());
    codec.encrypt_field(plain.amount, plain.note.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SecureString;
    use crate::models::UserId;
    use crate::services::{TransactionFilter, TransactionService};
    use crate::storage::{MemoryRecordStore, Storage};
    use crate::vault::FieldAccess;
    use std::sync::Arc;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup() -> Vault {
        Vault::open(&Storage::in_memory(), UserId::new()).await.unwrap()
    }

    fn input(amount: &str, day: u32, start: NaiveDate) -> CreateRecurringInput {
        CreateRecurringInput {
            account_id: AccountId::new(),
            category_id: CategoryId::new(),
            amount: Money::parse(amount).unwrap(),
            note: Some("rent".into()),
            original_day: day,
            start_date: start,
            end_date: None,
        }
    }

    fn template(day: u32, start: NaiveDate) -> RecurringTransaction {
        RecurringTransaction::new(
            UserId::new(),
            AccountId::new(),
            CategoryId::new(),
            StoredFields::plain("1", None),
            day,
            start,
        )
    }

    #[test]
    fn test_next_date_from_start() {
        let rec = template(15, ymd(2025, 1, 1));
        assert_eq!(calculate_next_date(&rec), Some(ymd(2025, 1, 15)));
    }

    #[test]
    fn test_next_date_skips_days_before_start() {
        let rec = template(5, ymd(2025, 1, 20));
        assert_eq!(calculate_next_date(&rec), Some(ymd(2025, 2, 5)));
    }

    #[test]
    fn test_next_date_clamps_to_month_length() {
        let mut rec = template(31, ymd(2025, 1, 1));
        rec.last_generated = Some(ymd(2025, 1, 31));
        assert_eq!(calculate_next_date(&rec), Some(ymd(2025, 2, 28)));

        rec.last_generated = Some(ymd(2025, 3, 31));
        assert_eq!(calculate_next_date(&rec), Some(ymd(2025, 4, 30)));
    }

    #[test]
    fn test_next_date_none_when_inactive_or_ended() {
        let mut rec = template(10, ymd(2025, 1, 1));
        rec.is_active = false;
        assert_eq!(calculate_next_date(&rec), None);

        rec.is_active = true;
        rec.end_date = Some(ymd(2025, 3, 1));
        rec.last_generated = Some(ymd(2025, 2, 10));
        assert_eq!(calculate_next_date(&rec), None);
    }

    #[test]
    fn test_invalid_schedule_rejected() {
        assert!(validate_schedule(0, ymd(2025, 1, 1), None).is_err());
        assert!(validate_schedule(32, ymd(2025, 1, 1), None).is_err());
        assert!(validate_schedule(1, ymd(2025, 2, 1), Some(ymd(2025, 1, 1))).is_err());
        assert!(validate_schedule(31, ymd(2025, 1, 1), Some(ymd(2025, 1, 1))).is_ok());
    }

    #[tokio::test]
    async fn test_generate_walks_months_up_to_today() {
        let vault = setup().await;
        let service = RecurringService::new(&vault);
        let rec = service.create(input("-900", 31, ymd(2025, 1, 1))).await.unwrap();

        let created = service.generate_pending(ymd(2025, 4, 15)).await.unwrap();
        assert_eq!(created, 3);

        let mut dates: Vec<_> = TransactionService::new(&vault)
            .list(TransactionFilter::new())
            .await
            .unwrap()
            .into_iter()
            .map(|v| {
                assert_eq!(v.record.recurring_id, Some(rec.record.id));
                v.record.date
            })
            .collect();
        dates.sort();
        assert_eq!(dates, vec![ymd(2025, 1, 31), ymd(2025, 2, 28), ymd(2025, 3, 31)]);

        let back = service.get(rec.record.id).await.unwrap();
        assert_eq!(back.record.last_generated, Some(ymd(2025, 3, 31)));

        // Nothing new until the next occurrence
        assert_eq!(service.generate_pending(ymd(2025, 4, 29)).await.unwrap(), 0);
        assert_eq!(service.generate_pending(ymd(2025, 4, 30)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_generate_respects_end_date_and_inactive() {
        let vault = setup().await;
        let service = RecurringService::new(&vault);

        let mut ending = input("10", 1, ymd(2025, 1, 1));
        ending.end_date = Some(ymd(2025, 2, 15));
        service.create(ending).await.unwrap();

        let paused = service.create(input("20", 1, ymd(2025, 1, 1))).await.unwrap();
        service.toggle_active(paused.record.id).await.unwrap();

        assert_eq!(service.generate_pending(ymd(2025, 6, 1)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_encrypted_template_generates_while_locked() {
        let mut vault = setup().await;
        vault.activate(&SecureString::new("Secret123")).await.unwrap();
        let rec = RecurringService::new(&vault)
            .create(input("-45.5", 3, ymd(2025, 1, 1)))
            .await
            .unwrap();
        assert!(rec.record.is_encrypted());
        vault.lock();

        let created = RecurringService::new(&vault)
            .generate_pending(ymd(2025, 1, 10))
            .await
            .unwrap();
        assert_eq!(created, 1);

        let views = TransactionService::new(&vault)
            .list(TransactionFilter::new())
            .await
            .unwrap();
        assert_eq!(views[0].record.fields, rec.record.fields);
        assert_eq!(views[0].access, FieldAccess::Locked);

        vault.unlock(&SecureString::new("Secret123")).await.unwrap();
        let views = TransactionService::new(&vault)
            .list(TransactionFilter::new())
            .await
            .unwrap();
        assert_eq!(views[0].amount, Money::parse("-45.5").unwrap());
        assert_eq!(views[0].note.as_deref(), Some("rent"));
    }

    #[tokio::test]
    async fn test_plaintext_template_encrypted_when_unlocked() {
        let mut vault = setup().await;
        let rec = RecurringService::new(&vault)
            .create(input("12", 1, ymd(2025, 1, 1)))
            .await
            .unwrap();
        assert!(!rec.record.is_encrypted());

        // Enabling encrypts the template, so bypass it with a fresh plaintext row
        vault.activate(&SecureString::new("Secret123")).await.unwrap();
        let plain = RecurringTransaction::new(
            vault.user_id(),
            AccountId::new(),
            CategoryId::new(),
            StoredFields::plain("7.5", Some("gym".into())),
            2,
            ymd(2025, 1, 1),
        );
        vault.records().insert_recurring(&plain).await.unwrap();

        RecurringService::new(&vault)
            .generate_pending(ymd(2025, 1, 31))
            .await
            .unwrap();

        let views = TransactionService::new(&vault)
            .list(TransactionFilter::new())
            .await
            .unwrap();
        let generated = views
            .iter()
            .find(|v| v.record.recurring_id == Some(plain.id))
            .unwrap();
        assert!(generated.record.is_encrypted());
        assert_eq!(generated.amount, Money::parse("7.5").unwrap());
    }

    #[tokio::test]
    async fn test_generation_failure_is_contained() {
        let records = Arc::new(MemoryRecordStore::new());
        let storage = Storage {
            settings: Arc::new(crate::storage::MemorySettingsStore::new()),
            records: records.clone(),
        };
        let vault = Vault::open(&storage, UserId::new()).await.unwrap();
        let service = RecurringService::new(&vault);

        let broken = service.create(input("1", 1, ymd(2025, 1, 1))).await.unwrap();
        service.create(input("2", 1, ymd(2025, 1, 1))).await.unwrap();
        records.fail_writes_for(*broken.record.id.as_uuid());

        // The broken template cannot record January, so it stops there
        let created = service.generate_pending(ymd(2025, 2, 1)).await.unwrap();
        assert_eq!(created, 2);

        let broken_back = service.get(broken.record.id).await.unwrap();
        assert_eq!(broken_back.record.last_generated, None);

        // Its January transaction was removed again, so a retry cannot duplicate it
        let views = TransactionService::new(&vault)
            .list(TransactionFilter::new())
            .await
            .unwrap();
        assert_eq!(views.len(), 2);
        assert!(views
            .iter()
            .all(|v| v.record.recurring_id != Some(broken.record.id)));
    }

    #[tokio::test]
    async fn test_delete_detaches_transactions() {
        let vault = setup().await;
        let service = RecurringService::new(&vault);
        let rec = service.create(input("5", 1, ymd(2025, 1, 1))).await.unwrap();
        service.generate_pending(ymd(2025, 2, 1)).await.unwrap();

        assert_eq!(service.delete(rec.record.id).await.unwrap(), 2);
        assert!(service.get(rec.record.id).await.unwrap_err().is_not_found());

        let views = TransactionService::new(&vault)
            .list(TransactionFilter::new())
            .await
            .unwrap();
        assert_eq!(views.len(), 2);
        assert!(views.iter().all(|v| v.record.recurring_id.is_none()));
    }

    #[tokio::test]
    async fn test_update_schedule_validated() {
        let vault = setup().await;
        let service = RecurringService::new(&vault);
        let rec = service.create(input("5", 1, ymd(2025, 1, 1))).await.unwrap();

        let err = service
            .update(
                rec.record.id,
                UpdateRecurringInput {
                    original_day: Some(40),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let updated = service
            .update(
                rec.record.id,
                UpdateRecurringInput {
                    amount: Some(Money::from_cents(-250)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.amount, Money::from_cents(-250));
        assert_eq!(updated.note.as_deref(), Some("rent"));
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let vault = setup().await;
        let service = RecurringService::new(&vault);
        assert!(service.toggle_active(RecurringId::new()).await.unwrap_err().is_not_found());
    }
}
