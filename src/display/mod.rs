//! Display formatting for terminal output
//!
//! Plain-text rendering of records, recurring schedules and vault state.

pub mod recurring;
pub mod transaction;
pub mod vault;

pub use recurring::{format_recurring_details, format_recurring_list};
pub use transaction::{format_transaction_details, format_transaction_register};
pub use vault::{format_transition_report, format_vault_status};

use crate::config::Settings;
use crate::models::Money;
use crate::vault::FieldAccess;

fn amount_cell(amount: Money, access: FieldAccess, settings: &Settings) -> String {
    match access {
        FieldAccess::Plain | FieldAccess::Decrypted => {
            amount.format_with_symbol(&settings.currency_symbol)
        }
        FieldAccess::Locked => "(locked)".to_string(),
        FieldAccess::Undecryptable => "(unreadable)".to_string(),
    }
}

fn note_cell(note: Option<&str>, access: FieldAccess) -> String {
    match access {
        FieldAccess::Locked | FieldAccess::Undecryptable => "-".to_string(),
        _ => note.unwrap_or("").to_string(),
    }
}

/// Pad or cut a string to exactly `max_len` characters
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_handles_multibyte() {
        assert_eq!(truncate("café au lait du matin", 10), "café au...");
        assert_eq!(truncate("tea", 5), "tea  ");
    }
}
