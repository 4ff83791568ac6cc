//! Field codec for the sensitive columns
//!
//! Borrows the data key from an unlocked vault for the length of one call.
//! With no key (vault disabled or locked) it passes values through.

use tracing::debug;

use crate::crypto::{decrypt_string, encrypt_string, DataKey};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{Money, StoredFields};

/// Decoded amount and note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFields {
    pub amount: Money,
    pub note: Option<String>,
}

impl DecodedFields {
    /// The value shown for a record that cannot be read
    pub fn fallback() -> Self {
        Self {
            amount: Money::zero(),
            note: None,
        }
    }
}

/// Outcome of decrypting one record's fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decrypted {
    Value(DecodedFields),
    /// Wrong key, corrupted ciphertext, or plaintext that is not an amount
    Undecryptable,
}

/// How a record's displayed values were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAccess {
    /// Stored as plaintext
    Plain,
    /// Stored encrypted and decrypted with the vault key
    Decrypted,
    /// Stored encrypted while the vault is locked; the amount is unknown
    Locked,
    /// Stored encrypted but failed to decrypt
    Undecryptable,
}

impl FieldAccess {
    /// Whether the displayed amount and note are the real values
    pub fn is_known(self) -> bool {
        matches!(self, Self::Plain | Self::Decrypted)
    }
}

/// Encrypts and decrypts amount and note with the vault's data key
#[derive(Clone, Copy)]
pub struct FieldCodec<'a> {
    dek: Option<&'a DataKey>,
}

/// Canonical text for a stored amount
///
/// Cent-exact amounts are normalized; any other number is kept as written so
/// precision from other clients survives a round trip.
fn amount_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    match Money::parse(trimmed) {
        Ok(amount) => Some(amount.to_decimal_string()),
        Err(_) => Money::parse_lenient(trimmed).map(|_| trimmed.to_string()),
    }
}

/// An empty note is stored as no note
fn seal_note(note: Option<&str>, dek: &DataKey) -> LedgerResult<Option<String>> {
    note.filter(|n| !n.is_empty())
        .map(|n| encrypt_string(n, dek))
        .transpose()
}

fn open_note(raw: Option<&str>, dek: &DataKey) -> LedgerResult<Option<String>> {
    raw.filter(|n| !n.is_empty())
        .map(|n| decrypt_string(n, dek))
        .transpose()
}

impl<'a> FieldCodec<'a> {
    /// A codec over the key of an unlocked vault, or a passthrough codec for `None`
    pub fn new(dek: Option<&'a DataKey>) -> Self {
        Self { dek }
    }

    /// A codec that never encrypts
    pub fn passthrough() -> Self {
        Self { dek: None }
    }

    pub fn is_unlocked(&self) -> bool {
        self.dek.is_some()
    }

    /// Encode amount and note for storage
    ///
    /// When unlocked, the canonical decimal amount and the note (if present
    /// and not empty) are each encrypted. Otherwise both are stored as given with
    /// `is_encrypted = false`.
    pub fn encrypt_field(&self, amount: Money, note: Option<&str>) -> LedgerResult<StoredFields> {
        let amount = amount.to_decimal_string();
        match self.dek {
            Some(dek) => Ok(StoredFields {
                amount: encrypt_string(&amount, dek)?,
                note: seal_note(note, dek)?,
                is_encrypted: true,
            }),
            None => Ok(StoredFields::plain(amount, note.map(str::to_string))),
        }
    }

    /// Decode raw columns, reporting records that cannot be decrypted
    ///
    /// Without a key the raw amount is parsed best-effort and the note is
    /// returned unchanged; that is only meaningful for plaintext columns.
    pub fn try_decrypt_field(&self, raw_amount: &str, raw_note: Option<&str>) -> Decrypted {
        let Some(dek) = self.dek else {
            return Decrypted::Value(DecodedFields {
                amount: Money::parse_lenient(raw_amount).unwrap_or_default(),
                note: raw_note.map(str::to_string),
            });
        };

        let amount = match decrypt_string(raw_amount, dek) {
            Ok(plain) => Money::parse_lenient(&plain),
            Err(e) => {
                debug!(error = %e, "amount did not decrypt");
                None
            }
        };
        let note = open_note(raw_note, dek);

        match (amount, note) {
            (Some(amount), Ok(note)) => Decrypted::Value(DecodedFields { amount, note }),
            _ => Decrypted::Undecryptable,
        }
    }

    /// Decode raw columns, falling back to a zero amount and no note
    pub fn decrypt_field(&self, raw_amount: &str, raw_note: Option<&str>) -> DecodedFields {
        match self.try_decrypt_field(raw_amount, raw_note) {
            Decrypted::Value(fields) => fields,
            Decrypted::Undecryptable => DecodedFields::fallback(),
        }
    }

    /// Decode a stored record for display, honouring its `is_encrypted` flag
    pub fn read(&self, fields: &StoredFields) -> (DecodedFields, FieldAccess) {
        if !fields.is_encrypted {
            let decoded = FieldCodec::passthrough()
                .decrypt_field(&fields.amount, fields.note.as_deref());
            return (decoded, FieldAccess::Plain);
        }
        if !self.is_unlocked() {
            return (DecodedFields::fallback(), FieldAccess::Locked);
        }

        match self.try_decrypt_field(&fields.amount, fields.note.as_deref()) {
            Decrypted::Value(decoded) => (decoded, FieldAccess::Decrypted),
            Decrypted::Undecryptable => (DecodedFields::fallback(), FieldAccess::Undecryptable),
        }
    }

    /// Turn plaintext columns into encrypted ones
    pub fn seal(&self, fields: &StoredFields) -> LedgerResult<StoredFields> {
        let dek = self.require_key("encrypt records")?;
        let amount = amount_text(&fields.amount).ok_or_else(|| {
            LedgerError::Validation(format!("stored amount is not a number: {:?}", fields.amount))
        })?;

        Ok(StoredFields {
            amount: encrypt_string(&amount, dek)?,
            note: seal_note(fields.note.as_deref(), dek)?,
            is_encrypted: true,
        })
    }

    /// Turn encrypted columns back into plaintext, failing on any authentication error
    pub fn open(&self, fields: &StoredFields) -> LedgerResult<StoredFields> {
        let dek = self.require_key("decrypt records")?;
        let amount = decrypt_string(&fields.amount, dek)?;
        let amount = amount_text(&amount).unwrap_or(amount);

        Ok(StoredFields {
            amount,
            note: open_note(fields.note.as_deref(), dek)?,
            is_encrypted: false,
        })
    }

    fn require_key(&self, operation: &'static str) -> LedgerResult<&'a DataKey> {
        self.dek.ok_or(LedgerError::InvalidState {
            operation,
            state: "locked".into(),
        })
    }
}
