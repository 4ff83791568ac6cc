use anyhow::Result;
use clap::{Parser, Subcommand};

use ledger_vault::cli::{
    handle_recurring_command, handle_transaction_command, handle_vault_command, RecurringCommands,
    Session, TransactionCommands, VaultCommands,
};
use ledger_vault::config::{LedgerPaths, Settings};
use ledger_vault::crypto::SecureString;

#[derive(Parser)]
#[command(
    name = "ledger",
    version,
    about = "Personal finance ledger with an end-to-end encrypted vault",
    long_about = "ledger records transactions and monthly recurring transactions. \
                  With the vault enabled, amounts and notes are encrypted with a key \
                  that only your master password can unwrap."
)]
struct Cli {
    /// Master password (prompted when needed and omitted)
    #[arg(long, global = true, env = "LEDGER_VAULT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new ledger
    Init,

    /// Show current configuration and paths
    Config,

    /// Vault (end-to-end encryption) commands
    #[command(subcommand)]
    Vault(VaultCommands),

    /// Transaction management commands
    #[command(subcommand, alias = "txn")]
    Transaction(TransactionCommands),

    /// Recurring transaction commands
    #[command(subcommand)]
    Recurring(RecurringCommands),
}

/// Initializes the tracing subscriber; logs go to stderr so command output stays clean.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ledger_vault={level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let paths = LedgerPaths::new()?;
    let password = cli.password.map(SecureString::from);

    match cli.command {
        Some(Commands::Init) => {
            if paths.is_initialized() {
                println!("Already initialized at: {}", paths.base_dir().display());
                return Ok(());
            }
            println!("Initializing ledger at: {}", paths.base_dir().display());
            let settings = Settings::load_or_create(&paths)?;
            settings.save(&paths)?;
            paths.ensure_directories()?;
            println!("Initialization complete!");
            println!();
            println!("Run 'ledger transaction add <AMOUNT>' to record a transaction.");
            println!("Run 'ledger vault enable' to encrypt amounts and notes.");
        }
        Some(Commands::Config) => {
            let settings = Settings::load_or_create(&paths)?;
            println!("Ledger Configuration");
            println!("====================");
            println!("Base directory:   {}", paths.base_dir().display());
            println!("Data directory:   {}", paths.data_dir().display());
            println!();
            println!("Settings:");
            println!("  User:             {}", settings.user_id);
            println!("  Default account:  {}", settings.default_account_id);
            println!("  Default category: {}", settings.default_category_id);
            println!("  Currency symbol:  {}", settings.currency_symbol);
            println!("  Date format:      {}", settings.date_format);
        }
        Some(Commands::Vault(cmd)) => {
            let mut session = Session::open(&paths, password).await?;
            handle_vault_command(&mut session, cmd).await?;
        }
        Some(Commands::Transaction(cmd)) => {
            let mut session = Session::open(&paths, password).await?;
            handle_transaction_command(&mut session, cmd).await?;
        }
        Some(Commands::Recurring(cmd)) => {
            let mut session = Session::open(&paths, password).await?;
            handle_recurring_command(&mut session, cmd).await?;
        }
        None => {
            println!("ledger - personal finance with an end-to-end encrypted vault");
            println!();
            println!("Run 'ledger --help' for usage information.");
        }
    }

    Ok(())
}
