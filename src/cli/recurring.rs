//! Recurring transaction CLI commands

use chrono::{Datelike, Local};
use clap::Subcommand;

use super::{parse_amount, parse_date, resolve_id, Session};
use crate::display::{format_recurring_details, format_recurring_list};
use crate::error::LedgerResult;
use crate::models::RecurringId;
use crate::services::{calculate_next_date, CreateRecurringInput, RecurringService};

/// Recurring transaction commands
#[derive(Subcommand)]
pub enum RecurringCommands {
    /// Add a monthly recurring transaction
    Add {
        /// Amount (negative for outflow)
        #[arg(allow_hyphen_values = true)]
        amount: String,
        /// Note
        #[arg(short, long)]
        note: Option<String>,
        /// Day of month (1-31), defaults to the start date's day
        #[arg(long)]
        day: Option<u32>,
        /// First date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        start: Option<String>,
        /// Last date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
    },
    /// List recurring transactions
    List,
    /// Show the next generation date of a recurring transaction
    Next {
        /// Recurring transaction ID (short form accepted)
        id: String,
    },
    /// Book every transaction owed up to today
    Generate {
        /// Generate as if today were this date (YYYY-MM-DD)
        #[arg(long)]
        today: Option<String>,
    },
    /// Pause or resume a recurring transaction
    Toggle {
        /// Recurring transaction ID (short form accepted)
        id: String,
    },
    /// Delete a recurring transaction; generated transactions are kept
    Delete {
        /// Recurring transaction ID (short form accepted)
        id: String,
    },
}

async fn resolve(service: &RecurringService<'_>, query: &str) -> LedgerResult<RecurringId> {
    let candidates = service
        .list()
        .await?
        .into_iter()
        .map(|view| (view.record.id, view.record.id.as_uuid().to_string()));
    resolve_id(query, "rec-", candidates, "Recurring transaction")
}

/// Handle recurring transaction commands
pub async fn handle_recurring_command(
    session: &mut Session,
    cmd: RecurringCommands,
) -> LedgerResult<()> {
    match cmd {
        RecurringCommands::Add {
            amount,
            note,
            day,
            start,
            end,
        } => {
            let amount = parse_amount(&amount)?;
            let start_date = match start {
                Some(s) => parse_date(&s)?,
                None => Local::now().date_naive(),
            };
            let end_date = end.as_deref().map(parse_date).transpose()?;

            session.unlock(true).await?;

            let view = RecurringService::new(&session.vault)
                .create(CreateRecurringInput {
                    account_id: session.settings.default_account_id,
                    category_id: session.settings.default_category_id,
                    amount,
                    note,
                    original_day: day.unwrap_or_else(|| start_date.day()),
                    start_date,
                    end_date,
                })
                .await?;

            println!("Added recurring transaction:");
            print!("{}", format_recurring_details(&view, &session.settings));
        }
        RecurringCommands::List => {
            session.unlock(false).await?;
            let views = RecurringService::new(&session.vault).list().await?;
            print!("{}", format_recurring_list(&views, &session.settings));
        }
        RecurringCommands::Next { id } => {
            let service = RecurringService::new(&session.vault);
            let view = service.get(resolve(&service, &id).await?).await?;
            match calculate_next_date(&view.record) {
                Some(date) => println!("{}", date.format(&session.settings.date_format)),
                None => println!("No upcoming occurrence."),
            }
        }
        RecurringCommands::Generate { today } => {
            let today = match today {
                Some(t) => parse_date(&t)?,
                None => Local::now().date_naive(),
            };
            session.unlock(false).await?;

            let created = RecurringService::new(&session.vault)
                .generate_pending(today)
                .await?;
            println!("Generated {} transaction(s).", created);
        }
        RecurringCommands::Toggle { id } => {
            let service = RecurringService::new(&session.vault);
            let view = service.toggle_active(resolve(&service, &id).await?).await?;
            let state = if view.record.is_active { "resumed" } else { "paused" };
            println!("Recurring transaction {} {}.", view.record.id, state);
        }
        RecurringCommands::Delete { id } => {
            let service = RecurringService::new(&session.vault);
            let id = resolve(&service, &id).await?;
            let detached = service.delete(id).await?;
            println!(
                "Deleted recurring transaction {} ({} transaction(s) kept).",
                id, detached
            );
        }
    }

    Ok(())
}
