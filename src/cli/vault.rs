//! Vault CLI commands
//!
//! Enable, disable and inspect end-to-end encryption of amounts and notes.

use clap::Subcommand;

use super::{prompt_new_password, validate_new_password, Session};
use crate::crypto::SecureString;
use crate::display::{format_transition_report, format_vault_status};
use crate::error::{LedgerError, LedgerResult};

/// Vault management commands
#[derive(Subcommand)]
pub enum VaultCommands {
    /// Show vault status
    Status,

    /// Enable the vault and encrypt every existing record
    Enable,

    /// Decrypt every record and disable the vault (requires the password)
    Disable,

    /// Change the master password
    #[command(alias = "change")]
    ChangePassword {
        /// New password (prompted when omitted)
        #[arg(long, env = "LEDGER_VAULT_NEW_PASSWORD", hide_env_values = true)]
        new_password: Option<String>,
    },

    /// Check that a password unlocks the vault
    Verify,
}

/// Handle vault commands
pub async fn handle_vault_command(session: &mut Session, cmd: VaultCommands) -> LedgerResult<()> {
    match cmd {
        VaultCommands::Status => {
            print!("{}", format_vault_status(session.vault.status()));
            Ok(())
        }
        VaultCommands::Enable => enable_vault(session).await,
        VaultCommands::Disable => disable_vault(session).await,
        VaultCommands::ChangePassword { new_password } => {
            change_password(session, new_password.map(SecureString::from)).await
        }
        VaultCommands::Verify => verify_password(session).await,
    }
}

async fn enable_vault(session: &mut Session) -> LedgerResult<()> {
    if session.vault.status().enabled {
        println!("The vault is already enabled.");
        println!("Use 'ledger vault change-password' to change your password.");
        return Ok(());
    }

    println!("Enable Vault");
    println!("============");
    println!();
    println!("Amounts and notes will be encrypted with AES-256-GCM.");
    println!("IMPORTANT: If you forget your password, your data cannot be recovered!");
    println!();

    let password = match session.supplied_password() {
        Some(supplied) => supplied,
        None => prompt_new_password()?,
    };
    validate_new_password(&password)?;

    println!("Deriving encryption key...");
    let report = session.vault.activate(&password).await?;

    println!();
    println!("Vault enabled.");
    print!("{}", format_transition_report(&report));
    Ok(())
}

async fn disable_vault(session: &mut Session) -> LedgerResult<()> {
    if !session.vault.status().enabled {
        println!("The vault is not enabled.");
        return Ok(());
    }

    let password = session.password("Current password: ")?;
    let report = session.vault.deactivate(&password).await?;

    println!("Vault disabled.");
    print!("{}", format_transition_report(&report));
    println!("Your data is now stored unencrypted.");
    Ok(())
}

async fn change_password(
    session: &mut Session,
    new_password: Option<SecureString>,
) -> LedgerResult<()> {
    if !session.vault.status().enabled {
        println!("The vault is not enabled.");
        println!("Use 'ledger vault enable' to enable it first.");
        return Ok(());
    }

    let current = session.password("Current password: ")?;
    let new_password = match new_password {
        Some(password) => password,
        None => prompt_new_password()?,
    };
    validate_new_password(&new_password)?;

    println!("Deriving new key...");
    session
        .vault
        .change_master_password(&current, &new_password)
        .await?;

    println!("Password changed.");
    Ok(())
}

async fn verify_password(session: &mut Session) -> LedgerResult<()> {
    if !session.vault.status().enabled {
        println!("The vault is not enabled.");
        return Ok(());
    }

    match session.unlock(true).await {
        Ok(()) => {
            println!("Password is correct!");
            Ok(())
        }
        Err(e) if e.is_password_rejected() => {
            println!("Password is incorrect.");
            Err(LedgerError::IncorrectPassword)
        }
        Err(e) => Err(e),
    }
}
