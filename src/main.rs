use canteen_ledger::application::Ledger;
use canteen_ledger::application::history::TransactionFilter;
use canteen_ledger::config::LedgerConfig;
use canteen_ledger::domain::actor::UserId;
use canteen_ledger::domain::money::Money;
use canteen_ledger::domain::ports::LedgerStoreRef;
use canteen_ledger::infrastructure::in_memory::InMemoryLedgerStore;
use canteen_ledger::infrastructure::sandbox_gateway::SandboxGateway;
use canteen_ledger::interfaces::csv::balance_writer::BalanceWriter;
use canteen_ledger::interfaces::csv::command_reader::CommandReader;
use canteen_ledger::interfaces::csv::history_writer::HistoryWriter;
use canteen_ledger::interfaces::replay::CommandReplay;
use canteen_ledger::logging;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Ledger commands CSV file (op,user,order,amount,at,session,event)
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Secret the sandbox gateway signs webhook bodies with
    #[arg(long, default_value = "whsec_sandbox")]
    webhook_secret: String,

    /// Currency passed to the gateway for top-ups
    #[arg(long, default_value = "usd")]
    currency: String,

    /// Minutes before the menu window after which customers can no longer cancel
    #[arg(long, default_value_t = 15)]
    cancel_cutoff_minutes: i64,

    /// Largest single deposit or top-up
    #[arg(long, default_value = "10000.00")]
    max_deposit: Decimal,

    /// Rows per history page
    #[arg(long, default_value_t = 20)]
    page_size: usize,

    /// Print this user's transaction history instead of the balance report
    #[arg(long)]
    history: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn config(&self) -> Result<LedgerConfig> {
        let config = LedgerConfig {
            currency: self.currency.clone(),
            cancellation_cutoff_minutes: self.cancel_cutoff_minutes,
            max_deposit: Money::new(self.max_deposit),
            page_size: self.page_size,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<&PathBuf>) -> Result<LedgerStoreRef> {
    use canteen_ledger::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => Ok(Arc::new(RocksDBStore::open(path)?)),
        None => Ok(Arc::new(InMemoryLedgerStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<&PathBuf>) -> Result<LedgerStoreRef> {
    if db_path.is_some() {
        warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemoryLedgerStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let config = cli.config()?;

    let store = open_store(cli.db_path.as_ref())?;
    let gateway = Arc::new(SandboxGateway::new(cli.webhook_secret.clone()));
    let ledger = Ledger::new(store, gateway.clone(), config);
    let mut replay = CommandReplay::new(ledger, gateway);

    let file = File::open(&cli.input).into_diagnostic()?;
    let mut applied = 0usize;
    let mut rejected = 0usize;
    for (line, command) in CommandReader::new(file).commands().enumerate() {
        let result = match command {
            Ok(command) => replay.apply(&command).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => applied += 1,
            Err(err) => {
                rejected += 1;
                warn!(row = line + 1, code = err.code(), error = %err, "command rejected");
            }
        }
    }
    info!(applied, rejected, "replay finished");

    let stdout = io::stdout();
    match cli.history {
        Some(user) => {
            let history = &replay.ledger().history;
            let mut rows = Vec::new();
            let mut page = 1;
            loop {
                let current = history
                    .transactions(UserId(user), &TransactionFilter::default(), page)
                    .await?;
                let has_next = current.has_next();
                rows.extend(current.items);
                if !has_next {
                    break;
                }
                page += 1;
            }
            HistoryWriter::new(stdout.lock()).write_transactions(&rows)?;
        }
        None => {
            let balances = replay.balances().await?;
            BalanceWriter::new(stdout.lock()).write_balances(balances)?;
        }
    }

    Ok(())
}
