//! Vault status and transition report formatting

use uuid::Uuid;

use crate::crypto::PBKDF2_ITERATIONS;
use crate::models::{RecordKind, RecurringId, TransactionId};
use crate::vault::{TransitionReport, VaultState, VaultStatus};

/// Format the vault status block
pub fn format_vault_status(status: VaultStatus) -> String {
    let mut output = String::new();
    output.push_str("Vault Status\n");
    output.push_str("============\n\n");

    if !status.enabled {
        output.push_str("Status: DISABLED\n\n");
        output.push_str("Amounts and notes are stored unencrypted.\n");
        output.push_str("Run 'ledger vault enable' to turn on end-to-end encryption.\n");
        return output;
    }

    let state = if status.locked {
        VaultState::Locked
    } else {
        VaultState::Unlocked
    };
    output.push_str(&format!("Status: ENABLED ({})\n\n", state));
    output.push_str("Key Derivation:\n");
    output.push_str("  Algorithm:  PBKDF2-HMAC-SHA256\n");
    output.push_str(&format!("  Iterations: {}\n", PBKDF2_ITERATIONS));
    output.push_str("Cipher:       AES-256-GCM\n");

    output
}

fn short_id(kind: RecordKind, id: Uuid) -> String {
    match kind {
        RecordKind::Transaction => TransactionId::from(id).to_string(),
        RecordKind::Recurring => RecurringId::from(id).to_string(),
    }
}

/// Format the outcome of a bulk encrypt or decrypt pass
pub fn format_transition_report(report: &TransitionReport) -> String {
    let mut output = String::new();

    for kind in RecordKind::ALL {
        let tally = report.tally(kind);
        if tally.listing_failed {
            output.push_str(&format!("  {}s: could not be listed\n", kind));
            continue;
        }
        output.push_str(&format!(
            "  {}s: {} {}ed",
            kind, tally.transitioned, report.direction
        ));
        if tally.failed > 0 {
            output.push_str(&format!(", {} failed", tally.failed));
        }
        output.push('\n');
        for id in &tally.failed_ids {
            output.push_str(&format!("    not {}ed: {}\n", report.direction, short_id(kind, *id)));
        }
    }

    if !report.is_complete() {
        output.push_str("\nSome records were not processed. Re-run the command to retry them.\n");
    }

    output
}
