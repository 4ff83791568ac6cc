//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the service layer.

pub mod recurring;
pub mod transaction;
pub mod vault;

pub use recurring::{handle_recurring_command, RecurringCommands};
pub use transaction::{handle_transaction_command, TransactionCommands};
pub use vault::{handle_vault_command, VaultCommands};

use chrono::NaiveDate;

use crate::config::{LedgerPaths, Settings};
use crate::crypto::SecureString;
use crate::error::{LedgerError, LedgerResult};
use crate::models::Money;
use crate::storage::Storage;
use crate::vault::{Vault, VaultState};

/// Everything a command needs: settings, the vault, and any supplied password
pub struct Session {
    pub settings: Settings,
    pub vault: Vault,
    password: Option<SecureString>,
}

impl Session {
    /// Open storage for the configured user; the vault starts locked if enabled
    pub async fn open(paths: &LedgerPaths, password: Option<SecureString>) -> LedgerResult<Self> {
        if !paths.is_initialized() {
            return Err(LedgerError::Config(
                "Not initialized. Run 'ledger init' first.".into(),
            ));
        }

        let settings = Settings::load_or_create(paths)?;
        let storage = Storage::open(paths, settings.user_id)?;
        let vault = Vault::open(&storage, settings.user_id).await?;

        Ok(Self {
            settings,
            vault,
            password,
        })
    }

    /// The password given with `--password` or the environment
    pub fn supplied_password(&self) -> Option<SecureString> {
        self.password.clone()
    }

    /// The supplied password, or a hidden prompt
    pub fn password(&self, prompt: &str) -> LedgerResult<SecureString> {
        match self.supplied_password() {
            Some(password) => Ok(password),
            None => prompt_password(prompt),
        }
    }

    /// Unlock a locked vault
    ///
    /// With `required`, prompts when no password was supplied; otherwise an
    /// unsupplied password leaves the vault locked.
    pub async fn unlock(&mut self, required: bool) -> LedgerResult<()> {
        if self.vault.state() != VaultState::Locked {
            return Ok(());
        }
        if self.password.is_none() && !required {
            return Ok(());
        }

        let password = self.password("Vault password: ")?;
        self.vault.unlock(&password).await
    }
}

/// Prompt for a password (hidden input)
pub fn prompt_password(prompt: &str) -> LedgerResult<SecureString> {
    rpassword::prompt_password(prompt)
        .map(SecureString::from)
        .map_err(|e| LedgerError::Io(format!("Failed to read password: {}", e)))
}

/// Minimum accepted length for a new master password
pub const MIN_PASSWORD_LEN: usize = 8;

/// Check a new master password
pub fn validate_new_password(password: &SecureString) -> LedgerResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(LedgerError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Prompt for a new password with confirmation
pub fn prompt_new_password() -> LedgerResult<SecureString> {
    loop {
        let first = prompt_password("Enter new password: ")?;

        if let Err(e) = validate_new_password(&first) {
            println!("{}. Please try again.", e);
            continue;
        }

        let second = prompt_password("Confirm password: ")?;

        if first.as_str() != second.as_str() {
            println!("Passwords do not match. Please try again.");
            continue;
        }

        return Ok(first);
    }
}

/// Parse a user-supplied amount such as "-12.50"
pub fn parse_amount(s: &str) -> LedgerResult<Money> {
    Money::parse(s).map_err(|e| LedgerError::Validation(format!("Invalid amount '{}': {}", s, e)))
}

/// Parse a YYYY-MM-DD date
pub fn parse_date(s: &str) -> LedgerResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| LedgerError::Validation(format!("Invalid date '{}', expected YYYY-MM-DD", s)))
}

/// Find the one id whose UUID starts with `query`
///
/// Accepts the short displayed form (`rec-1a2b3c4d`) as well as a full UUID.
fn resolve_id<T: Copy>(
    query: &str,
    prefix: &str,
    ids: impl IntoIterator<Item = (T, String)>,
    entity_type: &'static str,
) -> LedgerResult<T> {
    let needle = query.trim();
    let needle = needle.strip_prefix(prefix).unwrap_or(needle).to_lowercase();
    if needle.is_empty() {
        return Err(LedgerError::Validation(format!("Empty {} id", entity_type)));
    }

    let matches: Vec<T> = ids
        .into_iter()
        .filter(|(_, full)| full.starts_with(&needle))
        .map(|(id, _)| id)
        .collect();

    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(LedgerError::NotFound {
            entity_type,
            identifier: query.to_string(),
        }),
        _ => Err(LedgerError::Validation(format!(
            "'{}' matches more than one {}; use more characters",
            query, entity_type
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecurringId;

    #[test]
    fn test_validate_new_password() {
        assert!(validate_new_password(&SecureString::new("short")).is_err());
        assert!(validate_new_password(&SecureString::new("Secret123")).is_ok());
    }

    #[test]
    fn test_parse_amount_and_date() {
        assert_eq!(parse_amount("-12.50").unwrap(), Money::from_cents(-1250));
        assert!(parse_amount("twelve").unwrap_err().is_validation());
        assert_eq!(
            parse_date("2025-02-28").unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
        );
        assert!(parse_date("28/02/2025").is_err());
    }

    #[test]
    fn test_resolve_id_by_short_prefix() {
        let a = RecurringId::new();
        let b = RecurringId::new();
        let candidates = || [a, b].map(|id| (id, id.as_uuid().to_string()));

        let short = a.to_string();
        assert_eq!(resolve_id(&short, "rec-", candidates(), "Recurring transaction").unwrap(), a);

        let full = b.as_uuid().to_string();
        assert_eq!(resolve_id(&full, "rec-", candidates(), "Recurring transaction").unwrap(), b);

        assert!(resolve_id("zzzz", "rec-", candidates(), "Recurring transaction")
            .unwrap_err()
            .is_not_found());
    }
}
