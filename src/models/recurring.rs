//! Recurring transaction model
//!
//! A monthly template that generates one transaction per month on its
//! original day, clamped to the month's length.

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::{AccountId, CategoryId, RecurringId, UserId};
use super::record::{EncryptableRecord, RecordKind, StoredFields};

/// A recurring transaction as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringTransaction {
    /// Unique identifier
    pub id: RecurringId,

    /// Owning user
    pub user_id: UserId,

    /// Account generated transactions are booked on
    pub account_id: AccountId,

    /// Category of generated transactions
    pub category_id: CategoryId,

    /// Amount and note, possibly encrypted
    #[serde(flatten)]
    pub fields: StoredFields,

    /// Day of month (1-31) transactions fall on
    pub original_day: u32,

    /// First date the recurrence may generate for
    pub start_date: NaiveDate,

    /// Last date the recurrence may generate for
    #[serde(default)]
    pub end_date: Option<NaiveDate>,

    /// Date of the most recently generated transaction
    #[serde(default)]
    pub last_generated: Option<NaiveDate>,

    /// Inactive recurrences never generate
    #[serde(default = "default_active")]
    pub is_active: bool,

    /// When the recurrence was created
    pub created_at: DateTime<Utc>,

    /// When the recurrence was last modified
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl RecurringTransaction {
    /// Create a new active recurrence from already-encoded sensitive columns
    pub fn new(
        user_id: UserId,
        account_id: AccountId,
        category_id: CategoryId,
        fields: StoredFields,
        original_day: u32,
        start_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RecurringId::new(),
            user_id,
            account_id,
            category_id,
            fields,
            original_day,
            start_date,
            end_date: None,
            last_generated: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the amount and note hold ciphertext
    pub fn is_encrypted(&self) -> bool {
        self.fields.is_encrypted
    }

    /// Whether `date` falls after the end date
    pub fn has_ended_by(&self, date: NaiveDate) -> bool {
        self.end_date.is_some_and(|end| date > end)
    }
}

impl EncryptableRecord for RecurringTransaction {
    const KIND: RecordKind = RecordKind::Recurring;

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

/// First day of the month containing `date`
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of the month after the one containing `date`
pub fn next_month(date: NaiveDate) -> NaiveDate {
    let first = first_of_month(date);
    first.checked_add_months(Months::new(1)).unwrap_or(first)
}

/// Number of days in the month containing `date`
pub fn days_in_month(date: NaiveDate) -> u32 {
    let first = first_of_month(date);
    let next = next_month(date);
    (next - first).num_days() as u32
}

/// Place `day` in the month of `date`, clamped to the month's last day
///
/// Day 31 in April gives April 30; day 30 in February gives the 28th or 29th.
pub fn clamp_day_to_month(day: u32, date: NaiveDate) -> NaiveDate {
    let day = day.clamp(1, days_in_month(date));
    date.with_day(day).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(ymd(2025, 1, 15)), 31);
        assert_eq!(days_in_month(ymd(2025, 4, 1)), 30);
        assert_eq!(days_in_month(ymd(2025, 2, 10)), 28);
        assert_eq!(days_in_month(ymd(2024, 2, 10)), 29);
        assert_eq!(days_in_month(ymd(2025, 12, 31)), 31);
    }

    #[test]
    fn test_clamp_day_to_month() {
        assert_eq!(clamp_day_to_month(31, ymd(2025, 4, 1)), ymd(2025, 4, 30));
        assert_eq!(clamp_day_to_month(30, ymd(2025, 2, 1)), ymd(2025, 2, 28));
        assert_eq!(clamp_day_to_month(30, ymd(2024, 2, 1)), ymd(2024, 2, 29));
        assert_eq!(clamp_day_to_month(15, ymd(2025, 6, 1)), ymd(2025, 6, 15));
    }

    #[test]
    fn test_next_month_wraps_year() {
        assert_eq!(next_month(ymd(2025, 12, 31)), ymd(2026, 1, 1));
        assert_eq!(next_month(ymd(2025, 1, 31)), ymd(2025, 2, 1));
    }

    #[test]
    fn test_has_ended_by() {
        let mut rec = RecurringTransaction::new(
            UserId::new(),
            AccountId::new(),
            CategoryId::new(),
            StoredFields::plain("-900", Some("rent".into())),
            1,
            ymd(2025, 1, 1),
        );
        assert!(!rec.has_ended_by(ymd(2099, 1, 1)));

        rec.end_date = Some(ymd(2025, 6, 30));
        assert!(!rec.has_ended_by(ymd(2025, 6, 30)));
        assert!(rec.has_ended_by(ymd(2025, 7, 1)));
    }

    #[test]
    fn test_is_active_defaults_true_when_missing() {
        let rec = RecurringTransaction::new(
            UserId::new(),
            AccountId::new(),
            CategoryId::new(),
            StoredFields::plain("10", None),
            5,
            ymd(2025, 1, 5),
        );
        let mut value = serde_json::to_value(&rec).unwrap();
        value.as_object_mut().unwrap().remove("is_active");
        let back: RecurringTransaction = serde_json::from_value(value).unwrap();
        assert!(back.is_active);
    }
}
