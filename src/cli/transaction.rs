//! Transaction CLI commands

use chrono::Local;
use clap::Subcommand;

use super::{parse_amount, parse_date, Session};
use crate::display::{format_transaction_details, format_transaction_register};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{AccountId, CategoryId};
use crate::services::{CreateTransactionInput, TransactionFilter, TransactionService};

/// Transaction management commands
#[derive(Subcommand)]
pub enum TransactionCommands {
    /// Add a new transaction
    Add {
        /// Amount (negative for outflow), e.g. -12.50
        #[arg(allow_hyphen_values = true)]
        amount: String,
        /// Note
        #[arg(short, long)]
        note: Option<String>,
        /// Transaction date (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<String>,
        /// Account UUID, defaults to the configured account
        #[arg(short, long)]
        account: Option<String>,
        /// Category UUID, defaults to the configured category
        #[arg(short, long)]
        category: Option<String>,
    },
    /// List transactions
    List {
        /// Only transactions on or after this date
        #[arg(long)]
        from: Option<String>,
        /// Only transactions on or before this date
        #[arg(long)]
        to: Option<String>,
        /// Number of transactions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

fn parse_uuid_arg<T: std::str::FromStr>(value: &str, what: &str) -> LedgerResult<T> {
    value
        .parse()
        .map_err(|_| LedgerError::Validation(format!("Invalid {} id '{}'", what, value)))
}

/// Handle transaction commands
pub async fn handle_transaction_command(
    session: &mut Session,
    cmd: TransactionCommands,
) -> LedgerResult<()> {
    match cmd {
        TransactionCommands::Add {
            amount,
            note,
            date,
            account,
            category,
        } => {
            let amount = parse_amount(&amount)?;
            let date = match date {
                Some(d) => parse_date(&d)?,
                None => Local::now().date_naive(),
            };
            let account_id: AccountId = match account {
                Some(a) => parse_uuid_arg(&a, "account")?,
                None => session.settings.default_account_id,
            };
            let category_id: CategoryId = match category {
                Some(c) => parse_uuid_arg(&c, "category")?,
                None => session.settings.default_category_id,
            };

            // Writing while locked would store plaintext in an encrypted ledger
            session.unlock(true).await?;

            let view = TransactionService::new(&session.vault)
                .create(CreateTransactionInput {
                    account_id,
                    category_id,
                    date,
                    amount,
                    note,
                })
                .await?;

            println!("Added transaction:");
            print!("{}", format_transaction_details(&view, &session.settings));
        }
        TransactionCommands::List { from, to, limit } => {
            session.unlock(false).await?;

            let mut filter = TransactionFilter::new().limit(limit);
            filter.start_date = from.as_deref().map(parse_date).transpose()?;
            filter.end_date = to.as_deref().map(parse_date).transpose()?;

            let views = TransactionService::new(&session.vault).list(filter).await?;
            print!("{}", format_transaction_register(&views, &session.settings));
        }
    }

    Ok(())
}
