//! Service layer for ledger-vault
//!
//! Business logic on top of the record store. Every read and write of an
//! amount or note passes through the vault's field codec.

pub mod recurring;
pub mod transaction;

pub use recurring::{
    calculate_next_date, CreateRecurringInput, RecurringService, RecurringView,
    UpdateRecurringInput,
};
pub use transaction::{
    CreateTransactionInput, TransactionFilter, TransactionService, TransactionView,
    UpdateTransactionInput,
};

use crate::models::{EncryptableRecord, Money};
use crate::vault::{FieldAccess, FieldCodec};

/// A stored record alongside its decoded amount and note
///
/// When `access` is not known (locked or undecryptable) the amount reads
/// as zero and the note as `None`; treat them as unknown, not as values.
#[derive(Debug, Clone)]
pub struct RecordView<T> {
    pub record: T,
    pub amount: Money,
    pub note: Option<String>,
    pub access: FieldAccess,
}

impl<T: EncryptableRecord> RecordView<T> {
    pub fn decode(record: T, codec: &FieldCodec<'_>) -> Self {
        let (decoded, access) = codec.read(record.fields());
        Self {
            record,
            amount: decoded.amount,
            note: decoded.note,
            access,
        }
    }
}
