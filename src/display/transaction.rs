//! Transaction display formatting
//!
//! Register rows for the terminal. Amounts that cannot be shown (vault
//! locked, or ciphertext that failed to decrypt) are rendered as markers,
//! never as zero.

use super::{amount_cell, note_cell, truncate};
use crate::config::Settings;
use crate::services::TransactionView;

/// Format a single transaction for display (register row)
pub fn format_transaction_row(view: &TransactionView, settings: &Settings) -> String {
    let txn = &view.record;
    let lock_icon = if txn.is_encrypted() { "🔒" } else { "  " };
    let recurring_indicator = if txn.is_generated() { "↻" } else { " " };

    format!(
        "{} {} {} {:>12} {:20} {}",
        lock_icon,
        recurring_indicator,
        txn.date.format(&settings.date_format),
        amount_cell(view.amount, view.access, settings),
        truncate(&note_cell(view.note.as_deref(), view.access), 20),
        txn.id
    )
}

/// Format a list of transactions as a register
pub fn format_transaction_register(views: &[TransactionView], settings: &Settings) -> String {
    if views.is_empty() {
        return "No transactions found.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:2} {:1} {:10} {:>12} {:20} {}\n",
        "", "", "Date", "Amount", "Note", "ID"
    ));
    output.push_str(&"-".repeat(64));
    output.push('\n');

    for view in views {
        output.push_str(&format_transaction_row(view, settings));
        output.push('\n');
    }

    let hidden = views.iter().filter(|v| !v.access.is_known()).count();
    if hidden > 0 {
        output.push_str(&format!(
            "\n{} encrypted transaction(s) hidden. Unlock the vault to see amounts.\n",
            hidden
        ));
    }

    output
}

/// Format transaction details for display
pub fn format_transaction_details(view: &TransactionView, settings: &Settings) -> String {
    let txn = &view.record;
    let mut output = String::new();

    output.push_str(&format!("Transaction: {}\n", txn.id));
    output.push_str(&format!(
        "Date:        {}\n",
        txn.date.format(&settings.date_format)
    ));
    output.push_str(&format!(
        "Amount:      {}\n",
        amount_cell(view.amount, view.access, settings)
    ));
    output.push_str(&format!(
        "Note:        {}\n",
        note_cell(view.note.as_deref(), view.access)
    ));
    output.push_str(&format!("Account:     {}\n", txn.account_id));
    output.push_str(&format!("Category:    {}\n", txn.category_id));
    output.push_str(&format!(
        "Encrypted:   {}\n",
        if txn.is_encrypted() { "yes" } else { "no" }
    ));

    if let Some(recurring_id) = txn.recurring_id {
        output.push_str(&format!("Recurring:   {}\n", recurring_id));
    }

    output
}
