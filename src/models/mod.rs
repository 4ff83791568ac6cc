//! Core data models for ledger-vault
//!
//! This module contains the records the vault protects (transactions and
//! recurring transactions), their identifiers and the money type.

pub mod ids;
pub mod money;
pub mod record;
pub mod recurring;
pub mod transaction;

pub use ids::{AccountId, CategoryId, RecurringId, TransactionId, UserId};
pub use money::Money;
pub use record::{EncryptableRecord, RecordKind, SensitiveRecord, StoredFields};
pub use recurring::RecurringTransaction;
pub use transaction::Transaction;
