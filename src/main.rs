use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use studio_credits::application::service::ApprovalService;
use studio_credits::config::{ApprovalConfig, DEFAULT_APPROVAL_WINDOW_HOURS, DEFAULT_VALIDITY_DAYS};
use studio_credits::domain::ports::PackageStoreBox;
use studio_credits::infrastructure::clock::ManualClock;
use studio_credits::infrastructure::in_memory::InMemoryPackageStore;
use studio_credits::interfaces::csv::command_reader::CommandReader;
use studio_credits::interfaces::csv::package_writer::PackageWriter;
use studio_credits::interfaces::csv::runner::CommandRunner;
use studio_credits::telemetry;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "STUDIO_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Hours an admin has to confirm a payment; 0 disables the deadline.
    #[arg(long, env = "STUDIO_APPROVAL_WINDOW_HOURS", default_value_t = DEFAULT_APPROVAL_WINDOW_HOURS)]
    approval_window_hours: u32,

    /// Days a package stays usable after purchase.
    #[arg(long, env = "STUDIO_VALIDITY_DAYS", default_value_t = DEFAULT_VALIDITY_DAYS)]
    validity_days: u32,
}

fn open_store(db_path: Option<PathBuf>) -> Result<PackageStoreBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = studio_credits::infrastructure::rocksdb::RocksDBStore::open(path)
                .into_diagnostic()?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            tracing::warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Box::new(InMemoryPackageStore::new()))
        }
        None => Ok(Box::new(InMemoryPackageStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init("info");
    let cli = Cli::parse();

    let config = ApprovalConfig::from_units(cli.approval_window_hours, cli.validity_days);
    let store = open_store(cli.db_path)?;
    let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
    let runner = CommandRunner::new(ApprovalService::new(store, clock.clone(), config), clock);

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for (row, command) in reader.commands().enumerate() {
        match command {
            Ok(command) => {
                let kind = command.r#type;
                if let Err(e) = runner.run(command).await {
                    tracing::warn!(row = row + 1, command = ?kind, error = %e, "Error processing command");
                }
            }
            Err(e) => {
                tracing::warn!(row = row + 1, error = %e, "Error reading command");
            }
        }
    }

    let packages = runner.into_results().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = PackageWriter::new(stdout.lock());
    writer.write_packages(packages).into_diagnostic()?;

    Ok(())
}
